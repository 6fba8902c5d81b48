// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer connectivity probe.
//
// Answers one question before a print action: is it worth submitting? The
// whole check runs under a single deadline and every failure, including the
// deadline itself, reads as "unreachable".

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

use stocktag_core::types::PrinterConfig;

use crate::ipp_client::{IppClient, accepting_jobs};

/// Reachability check used by the dispatcher.
#[async_trait]
pub trait PrinterProbe: Send + Sync {
    /// `true` only when the printer answered within `timeout`.
    async fn probe(&self, printer: &PrinterConfig, timeout: Duration) -> bool;
}

/// Probe over the network: a TCP connect and, when `deep`, an IPP
/// Get-Printer-Attributes that must not report the queue as rejecting jobs.
#[derive(Debug, Clone, Copy)]
pub struct NetworkProbe {
    deep: bool,
}

impl NetworkProbe {
    pub fn new(deep: bool) -> Self {
        Self { deep }
    }

    /// TCP connect only.
    pub fn shallow() -> Self {
        Self::new(false)
    }

    async fn check(&self, printer: &PrinterConfig) -> Result<(), String> {
        let stream = TcpStream::connect((printer.host.as_str(), printer.port))
            .await
            .map_err(|e| format!("connect {}: {e}", printer.address()))?;
        drop(stream);
        debug!(address = %printer.address(), "TCP connect succeeded");

        if !self.deep {
            return Ok(());
        }

        let client = IppClient::new(&printer.uri()).map_err(|e| e.to_string())?;
        let attrs = client
            .get_printer_attributes()
            .await
            .map_err(|e| e.to_string())?;
        if !accepting_jobs(&attrs) {
            return Err(format!("queue '{}' is not accepting jobs", printer.queue));
        }
        Ok(())
    }
}

impl Default for NetworkProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl PrinterProbe for NetworkProbe {
    #[instrument(skip(self), fields(uri = %printer.uri(), deep = self.deep))]
    async fn probe(&self, printer: &PrinterConfig, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.check(printer)).await {
            Ok(Ok(())) => true,
            Ok(Err(reason)) => {
                warn!(%reason, "printer unreachable");
                false
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "printer probe timed out");
                false
            }
        }
    }
}

/// Printer state for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterStatus {
    NotConfigured,
    Reachable,
    Unreachable,
}

impl PrinterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not configured",
            Self::Reachable => "reachable",
            Self::Unreachable => "unreachable",
        }
    }
}

pub async fn printer_status(
    printer: Option<&PrinterConfig>,
    probe: &dyn PrinterProbe,
    timeout: Duration,
) -> PrinterStatus {
    match printer {
        None => PrinterStatus::NotConfigured,
        Some(printer) if probe.probe(printer, timeout).await => PrinterStatus::Reachable,
        Some(_) => PrinterStatus::Unreachable,
    }
}
