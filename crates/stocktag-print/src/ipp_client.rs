// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async IPP client for the label printer queue.
//
// Uses the `ipp` crate's async API for the two operations a label action
// needs:
//   - Get-Printer-Attributes  (RFC 8011 §4.2.5), for the deep probe
//   - Print-Job               (RFC 8011 §4.2.1)

use std::collections::HashMap;
use std::io::Cursor;

use ipp::prelude::*;
use tracing::{debug, error, info, instrument};

use stocktag_core::error::{Result, StocktagError};

/// Flattened Get-Printer-Attributes response: attribute name to display value.
pub type PrinterAttributes = HashMap<String, String>;

/// MIME type of the documents Stocktag submits.
pub const PDF_MIME: &str = "application/pdf";

/// Async IPP client bound to a single printer URI.
pub struct IppClient {
    uri: Uri,
}

impl IppClient {
    /// Create a client for an `ipp://` or `ipps://` printer URI.
    pub fn new(uri: &str) -> Result<Self> {
        let parsed: Uri = uri
            .parse()
            .map_err(|e| StocktagError::IppRequest(format!("invalid URI '{uri}': {e}")))?;
        Ok(Self { uri: parsed })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Query the printer's current state.
    #[instrument(skip(self), fields(uri = %self.uri))]
    pub async fn get_printer_attributes(&self) -> Result<PrinterAttributes> {
        let operation = IppOperationBuilder::get_printer_attributes(self.uri.clone()).build();
        let client = AsyncIppClient::new(self.uri.clone());

        debug!("sending Get-Printer-Attributes");
        let response = client
            .send(operation)
            .await
            .map_err(|e| StocktagError::IppRequest(format!("Get-Printer-Attributes: {e}")))?;

        if !response.header().status_code().is_success() {
            let code = response.header().status_code();
            error!(status = ?code, "Get-Printer-Attributes failed");
            return Err(StocktagError::IppRequest(format!(
                "Get-Printer-Attributes returned status {code:?}"
            )));
        }

        let attrs = flatten_attributes(response.attributes());
        debug!(count = attrs.len(), "received printer attributes");
        Ok(attrs)
    }

    /// Submit one document as a Print-Job with extra job attributes.
    ///
    /// Returns the job-id assigned by the printer.
    #[instrument(
        skip(self, document_bytes, attributes),
        fields(uri = %self.uri, job_name = %job_name, bytes = document_bytes.len())
    )]
    pub async fn print_job(
        &self,
        document_bytes: Vec<u8>,
        mime: &str,
        job_name: &str,
        attributes: Vec<IppAttribute>,
    ) -> Result<i32> {
        let payload = IppPayload::new(Cursor::new(document_bytes));

        let operation = attributes
            .into_iter()
            .fold(
                IppOperationBuilder::print_job(self.uri.clone(), payload)
                    .job_title(job_name)
                    .document_format(mime),
                |builder, attr| builder.attribute(attr),
            )
            .build();

        let client = AsyncIppClient::new(self.uri.clone());

        info!(mime, "sending Print-Job");
        let response = client
            .send(operation)
            .await
            .map_err(|e| StocktagError::PrintSubmission(format!("Print-Job: {e}")))?;

        if !response.header().status_code().is_success() {
            let code = response.header().status_code();
            error!(status = ?code, "Print-Job failed");
            return Err(StocktagError::PrintSubmission(format!(
                "Print-Job returned status {code:?}"
            )));
        }

        let job_id = extract_job_id(response.attributes()).ok_or_else(|| {
            StocktagError::PrintSubmission("Print-Job response missing job-id attribute".into())
        })?;

        info!(job_id, "print job accepted by printer");
        Ok(job_id)
    }
}

/// Flatten all attribute groups into a single map. Multi-valued attributes
/// keep their `Display` form.
fn flatten_attributes(attrs: &IppAttributes) -> PrinterAttributes {
    let mut map = HashMap::new();
    for group in attrs.groups() {
        for (name, attr) in group.attributes() {
            map.insert(name.clone(), format!("{}", attr.value()));
        }
    }
    map
}

fn extract_job_id(attrs: &IppAttributes) -> Option<i32> {
    for group in attrs.groups_of(DelimiterTag::JobAttributes) {
        if let Some(attr) = group.attributes().get("job-id")
            && let IppValue::Integer(id) = attr.value()
        {
            return Some(*id);
        }
    }
    None
}

/// Whether the printer currently takes new jobs. Printers that omit the
/// attribute are assumed to.
pub fn accepting_jobs(attrs: &PrinterAttributes) -> bool {
    attrs
        .get("printer-is-accepting-jobs")
        .is_none_or(|value| value.trim() != "false")
}
