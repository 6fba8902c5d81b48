// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print dispatcher — decides between printing and previewing a label.
//
//   no printer ──────────────────────────────► Preview(NotConfigured)
//   printer ──► Probing ──unreachable────────► Preview(PrinterUnreachable)
//                       └─reachable──► Submitting ──ok──► Submitted
//                                                 └─err─► Failed
//
// One print action produces at most one Print-Job. Multiple copies are pages
// of that one document. Nothing is retried or queued between calls.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ipp::prelude::IppAttribute;
use tracing::{error, info, instrument, warn};

use stocktag_core::error::{Result, StocktagError};
use stocktag_core::types::{CopyCount, JobId, PrintJob, PrinterConfig, PrinterSide};
use stocktag_label::{LabelDocument, LabelImage};

use crate::ipp_client::{IppClient, PDF_MIME};
use crate::options::JobOptions;
use crate::probe::PrinterProbe;

/// Upper bound for one Print-Job exchange.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// States a print action moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Preview,
    Probing,
    Submitting,
    Submitted,
    Failed,
}

/// Why a print action ended in a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewReason {
    /// No printer host or queue configured.
    NotConfigured,
    /// The probe failed or timed out.
    PrinterUnreachable,
    /// Printer settings present but unusable.
    Misconfigured,
}

impl PreviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "printer not configured",
            Self::PrinterUnreachable => "printer unreachable",
            Self::Misconfigured => "printer settings invalid",
        }
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Preview {
        png: Vec<u8>,
        reason: PreviewReason,
    },
    Submitted {
        job: PrintJob,
        printer_job_id: i32,
    },
    Failed {
        error: StocktagError,
    },
}

/// Result of one dispatch: the states visited and where it ended.
#[derive(Debug)]
pub struct DispatchReport {
    pub trail: Vec<DispatchState>,
    pub outcome: DispatchOutcome,
}

impl DispatchReport {
    pub fn final_state(&self) -> Option<DispatchState> {
        self.trail.last().copied()
    }
}

/// Sends a finished document to a printer.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Submit `document` as a single job; returns the printer's job id.
    async fn submit(
        &self,
        printer: &PrinterConfig,
        document: Vec<u8>,
        attributes: Vec<IppAttribute>,
        job_name: &str,
    ) -> Result<i32>;
}

/// Submits over IPP, bounded by [`SUBMIT_TIMEOUT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct IppSubmitter;

#[async_trait]
impl JobSubmitter for IppSubmitter {
    async fn submit(
        &self,
        printer: &PrinterConfig,
        document: Vec<u8>,
        attributes: Vec<IppAttribute>,
        job_name: &str,
    ) -> Result<i32> {
        let client = IppClient::new(&printer.uri())?;
        tokio::time::timeout(
            SUBMIT_TIMEOUT,
            client.print_job(document, PDF_MIME, job_name, attributes),
        )
        .await
        .map_err(|_| {
            StocktagError::PrintSubmission(format!(
                "no answer from {} within {}s",
                printer.address(),
                SUBMIT_TIMEOUT.as_secs()
            ))
        })?
    }
}

/// Routes composed labels to the printer or back as previews.
pub struct Dispatcher<P, S> {
    probe: P,
    submitter: S,
    probe_timeout: Duration,
}

impl<P: PrinterProbe, S: JobSubmitter> Dispatcher<P, S> {
    pub fn new(probe: P, submitter: S, probe_timeout: Duration) -> Self {
        Self {
            probe,
            submitter,
            probe_timeout,
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Print `copies` of `label`, or fall back to a PNG preview.
    #[instrument(
        skip(self, label, printer),
        fields(stock = ?label.stock(), copies = copies.get(), configured = printer.is_some())
    )]
    pub async fn dispatch(
        &self,
        label: &LabelImage,
        copies: CopyCount,
        printer: Option<&PrinterConfig>,
        side: PrinterSide,
    ) -> DispatchReport {
        let mut trail = Vec::with_capacity(3);

        let Some(printer) = printer else {
            info!("no printer configured; returning preview");
            return preview(label, PreviewReason::NotConfigured, trail);
        };

        trail.push(DispatchState::Probing);
        if !self.probe.probe(printer, self.probe_timeout).await {
            warn!(uri = %printer.uri(), "printer unreachable; returning preview instead of printing");
            return preview(label, PreviewReason::PrinterUnreachable, trail);
        }

        trail.push(DispatchState::Submitting);
        match self.submit(label, copies, printer, side).await {
            Ok((job, printer_job_id)) => {
                trail.push(DispatchState::Submitted);
                info!(
                    job_id = %job.id,
                    printer_job_id,
                    pages = job.page_count,
                    media = %job.media,
                    "label submitted"
                );
                DispatchReport {
                    trail,
                    outcome: DispatchOutcome::Submitted {
                        job,
                        printer_job_id,
                    },
                }
            }
            Err(err) => {
                trail.push(DispatchState::Failed);
                error!(%err, "label print failed");
                DispatchReport {
                    trail,
                    outcome: DispatchOutcome::Failed { error: err },
                }
            }
        }
    }

    async fn submit(
        &self,
        label: &LabelImage,
        copies: CopyCount,
        printer: &PrinterConfig,
        side: PrinterSide,
    ) -> Result<(PrintJob, i32)> {
        let options = JobOptions::for_stock(label.stock(), side);
        let document = LabelDocument::build(label, copies)?;
        let attributes = options.ipp_attributes()?;

        let job = PrintJob {
            id: JobId::new(),
            printer: printer.clone(),
            page_count: document.pages(),
            side,
            input_slot: options.input_slot,
            media: options.media.to_string(),
            document_hash: document.sha256().to_string(),
            created_at: Utc::now(),
        };
        let job_name = format!("stocktag-{}", job.id);

        let printer_job_id = self
            .submitter
            .submit(printer, document.into_bytes(), attributes, &job_name)
            .await
            .map_err(|err| match err {
                StocktagError::IppRequest(msg) => StocktagError::PrintSubmission(msg),
                other => other,
            })?;
        Ok((job, printer_job_id))
    }
}

fn preview(label: &LabelImage, reason: PreviewReason, mut trail: Vec<DispatchState>) -> DispatchReport {
    match label.to_png_bytes() {
        Ok(png) => {
            trail.push(DispatchState::Preview);
            DispatchReport {
                trail,
                outcome: DispatchOutcome::Preview { png, reason },
            }
        }
        Err(error) => {
            trail.push(DispatchState::Failed);
            DispatchReport {
                trail,
                outcome: DispatchOutcome::Failed { error },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use stocktag_core::types::{InputSlot, LabelStock};
    use stocktag_label::document::count_pages;

    use crate::probe::NetworkProbe;

    struct FixedProbe(bool);

    #[async_trait]
    impl PrinterProbe for FixedProbe {
        async fn probe(&self, _printer: &PrinterConfig, _timeout: Duration) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct Submission {
        pages: u32,
        attribute_names: Vec<String>,
        job_name: String,
    }

    #[derive(Default)]
    struct RecordingSubmitter {
        calls: AtomicUsize,
        last: Mutex<Option<Submission>>,
        fail: bool,
    }

    #[async_trait]
    impl JobSubmitter for RecordingSubmitter {
        async fn submit(
            &self,
            _printer: &PrinterConfig,
            document: Vec<u8>,
            attributes: Vec<IppAttribute>,
            job_name: &str,
        ) -> Result<i32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(Submission {
                pages: count_pages(&document)?,
                attribute_names: attributes.iter().map(|a| a.name().to_string()).collect(),
                job_name: job_name.to_string(),
            });
            if self.fail {
                Err(StocktagError::IppRequest("client-error-document-format-not-supported".into()))
            } else {
                Ok(17)
            }
        }
    }

    fn printer() -> PrinterConfig {
        PrinterConfig {
            host: "127.0.0.1".into(),
            port: 631,
            queue: "labels".into(),
        }
    }

    fn label() -> LabelImage {
        LabelImage::blank(LabelStock::Address)
    }

    #[tokio::test]
    async fn unconfigured_printer_previews() {
        let dispatcher =
            Dispatcher::new(FixedProbe(true), RecordingSubmitter::default(), Duration::from_secs(2));
        let report = dispatcher
            .dispatch(&label(), CopyCount::single(), None, PrinterSide::Auto)
            .await;

        assert_eq!(report.trail, vec![DispatchState::Preview]);
        match report.outcome {
            DispatchOutcome::Preview { png, reason } => {
                assert_eq!(reason, PreviewReason::NotConfigured);
                assert!(png.starts_with(b"\x89PNG"));
            }
            other => panic!("expected preview, got {other:?}"),
        }
        assert_eq!(dispatcher.submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_printer_previews_without_submitting() {
        let dispatcher =
            Dispatcher::new(FixedProbe(false), RecordingSubmitter::default(), Duration::from_secs(2));
        let report = dispatcher
            .dispatch(&label(), CopyCount::single(), Some(&printer()), PrinterSide::Auto)
            .await;

        assert_eq!(report.trail, vec![DispatchState::Probing, DispatchState::Preview]);
        assert!(matches!(
            report.outcome,
            DispatchOutcome::Preview { reason: PreviewReason::PrinterUnreachable, .. }
        ));
        assert_eq!(dispatcher.submitter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn five_copies_make_one_job_of_five_pages() {
        let dispatcher =
            Dispatcher::new(FixedProbe(true), RecordingSubmitter::default(), Duration::from_secs(2));
        let report = dispatcher
            .dispatch(&label(), CopyCount::clamped(5, 25), Some(&printer()), PrinterSide::Auto)
            .await;

        assert_eq!(
            report.trail,
            vec![
                DispatchState::Probing,
                DispatchState::Submitting,
                DispatchState::Submitted
            ]
        );
        let DispatchOutcome::Submitted { job, printer_job_id } = report.outcome else {
            panic!("expected submission");
        };
        assert_eq!(printer_job_id, 17);
        assert_eq!(job.page_count, 5);
        assert_eq!(job.media, "w79h252");
        assert_eq!(job.input_slot, Some(InputSlot::Left));

        assert_eq!(dispatcher.submitter.calls.load(Ordering::SeqCst), 1);
        let last = dispatcher.submitter.last.lock().unwrap();
        let sent = last.as_ref().unwrap();
        assert_eq!(sent.pages, 5);
        assert!(sent.attribute_names.contains(&"InputSlot".to_string()));
        assert!(sent.job_name.starts_with("stocktag-"));
    }

    #[tokio::test]
    async fn excess_copies_are_clamped_before_dispatch() {
        let dispatcher =
            Dispatcher::new(FixedProbe(true), RecordingSubmitter::default(), Duration::from_secs(2));
        let report = dispatcher
            .dispatch(&label(), CopyCount::clamped(100, 25), Some(&printer()), PrinterSide::Right)
            .await;

        let DispatchOutcome::Submitted { job, .. } = report.outcome else {
            panic!("expected submission");
        };
        assert_eq!(job.page_count, 25);
        assert_eq!(job.input_slot, Some(InputSlot::Right));
    }

    #[tokio::test]
    async fn submission_failure_is_not_a_preview() {
        let submitter = RecordingSubmitter {
            fail: true,
            ..RecordingSubmitter::default()
        };
        let dispatcher = Dispatcher::new(FixedProbe(true), submitter, Duration::from_secs(2));
        let report = dispatcher
            .dispatch(&label(), CopyCount::single(), Some(&printer()), PrinterSide::Auto)
            .await;

        assert_eq!(report.final_state(), Some(DispatchState::Failed));
        assert!(matches!(
            report.outcome,
            DispatchOutcome::Failed { error: StocktagError::PrintSubmission(_) }
        ));
        // No retry.
        assert_eq!(dispatcher.submitter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn silent_printer_falls_back_to_preview_within_bound() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(200);
        let dispatcher =
            Dispatcher::new(NetworkProbe::default(), RecordingSubmitter::default(), timeout);
        let silent = PrinterConfig {
            host: "127.0.0.1".into(),
            port,
            queue: "labels".into(),
        };

        let started = Instant::now();
        let report = dispatcher
            .dispatch(&label(), CopyCount::single(), Some(&silent), PrinterSide::Auto)
            .await;
        let elapsed = started.elapsed();

        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(800));
        assert!(matches!(
            report.outcome,
            DispatchOutcome::Preview { reason: PreviewReason::PrinterUnreachable, .. }
        ));
        assert_eq!(dispatcher.submitter.calls.load(Ordering::SeqCst), 0);
    }
}
