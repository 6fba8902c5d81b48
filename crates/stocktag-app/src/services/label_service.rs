// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label service — the one place a label action enters the pipeline.
//
// item snapshot + request context ─► resolve ─► encode ─► compose ─► dispatch
//
// Every outcome, including failures, leaves as a `LabelResponse`; nothing in
// here panics or propagates an error to the caller.

use stocktag_core::LabelConfig;
use stocktag_core::error::Result;
use stocktag_core::human_errors::{HumanError, humanize_error};
use stocktag_core::types::{
    CopyCount, ItemSnapshot, JobId, LabelRequest, PrinterConfig, PrinterSide,
};
use stocktag_label::{
    LabelComposer, LabelFonts, LabelImage, QrEncoder, RequestContext, compose_quick, resolve,
};
use stocktag_print::{
    DispatchOutcome, Dispatcher, IppSubmitter, JobSubmitter, NetworkProbe, PreviewReason,
    PrinterProbe, PrinterStatus, printer_status,
};
use tracing::{info, instrument, warn};

pub const PNG_CONTENT_TYPE: &str = "image/png";

/// What a label action hands back to the caller.
#[derive(Debug)]
pub enum LabelResponse {
    /// A PNG preview. `reason` is set when a print was asked for but not made.
    Png {
        bytes: Vec<u8>,
        reason: Option<PreviewReason>,
    },
    Printed {
        job_id: JobId,
        printer_job_id: i32,
        pages: u32,
    },
    Error(HumanError),
}

impl LabelResponse {
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Png { .. } => Some(PNG_CONTENT_TYPE),
            _ => None,
        }
    }

    fn from_error(err: &stocktag_core::StocktagError) -> Self {
        warn!(%err, "label action failed");
        Self::Error(humanize_error(err))
    }
}

/// Printer settings as far as a print action is concerned.
enum PrinterTarget {
    Configured(Option<PrinterConfig>),
    Misconfigured,
}

pub struct LabelService<P = NetworkProbe, S = IppSubmitter> {
    config: LabelConfig,
    fonts: LabelFonts,
    encoder: QrEncoder,
    dispatcher: Dispatcher<P, S>,
}

impl LabelService {
    /// Service wired to the real network probe and IPP submitter.
    pub fn new(config: LabelConfig) -> Self {
        let fonts = LabelFonts::load(config.font_dir.as_deref());
        let dispatcher = Dispatcher::new(
            NetworkProbe::new(config.probe_ipp),
            IppSubmitter,
            config.probe_timeout(),
        );
        Self::with_dispatcher(config, fonts, dispatcher)
    }
}

impl<P: PrinterProbe, S: JobSubmitter> LabelService<P, S> {
    pub fn with_dispatcher(config: LabelConfig, fonts: LabelFonts, dispatcher: Dispatcher<P, S>) -> Self {
        let encoder = QrEncoder::new(config.qr_level);
        Self {
            config,
            fonts,
            encoder,
            dispatcher,
        }
    }

    /// Render an item label as PNG without touching the printer.
    #[instrument(skip(self, item, ctx), fields(item_id = item.id))]
    pub fn preview(&self, item: ItemSnapshot, ctx: &RequestContext) -> LabelResponse {
        let request = LabelRequest::preview(item);
        match self.render(&request, ctx).and_then(|label| label.to_png_bytes()) {
            Ok(bytes) => LabelResponse::Png {
                bytes,
                reason: None,
            },
            Err(err) => LabelResponse::from_error(&err),
        }
    }

    /// Print `copies` of an item label on `side`, falling back to a preview.
    #[instrument(skip(self, item, ctx), fields(item_id = item.id))]
    pub async fn print(
        &self,
        item: ItemSnapshot,
        ctx: &RequestContext,
        copies: i64,
        side: PrinterSide,
    ) -> LabelResponse {
        let copies = CopyCount::clamped(copies, self.config.max_copies());
        let request = LabelRequest::new(item, copies, side);
        let label = match self.render(&request, ctx) {
            Ok(label) => label,
            Err(err) => return LabelResponse::from_error(&err),
        };
        self.send(&label, copies, side).await
    }

    /// Render a quick label (free text, no QR) as PNG.
    pub fn quick_preview(&self, title: &str, description: &str) -> LabelResponse {
        let label = compose_quick(self.config.label_stock, &self.fonts, title, description);
        match label.to_png_bytes() {
            Ok(bytes) => LabelResponse::Png {
                bytes,
                reason: None,
            },
            Err(err) => LabelResponse::from_error(&err),
        }
    }

    /// Print one quick label, falling back to a preview.
    pub async fn quick_print(&self, title: &str, description: &str) -> LabelResponse {
        let label = compose_quick(self.config.label_stock, &self.fonts, title, description);
        self.send(&label, CopyCount::single(), PrinterSide::Auto).await
    }

    pub async fn printer_status(&self) -> PrinterStatus {
        match self.printer_target() {
            PrinterTarget::Configured(printer) => {
                printer_status(
                    printer.as_ref(),
                    self.dispatcher.probe(),
                    self.dispatcher.probe_timeout(),
                )
                .await
            }
            PrinterTarget::Misconfigured => PrinterStatus::Unreachable,
        }
    }

    fn render(&self, request: &LabelRequest, ctx: &RequestContext) -> Result<LabelImage> {
        let composer = LabelComposer::new(self.config.label_stock, &self.config.layout, &self.fonts);
        let qr = if self.config.layout.include_qr {
            let url = resolve(request.item.id, ctx, self.config.base_url())?;
            info!(item_id = request.item.id, url = %url, "item link resolved");
            Some(self.encoder.encode(url.as_str(), composer.qr_size())?)
        } else {
            None
        };
        Ok(composer.render(request, qr.as_ref()))
    }

    fn printer_target(&self) -> PrinterTarget {
        match self.config.printer() {
            Ok(printer) => PrinterTarget::Configured(printer),
            Err(err) => {
                warn!(%err, "printer settings are invalid; printing disabled");
                PrinterTarget::Misconfigured
            }
        }
    }

    async fn send(&self, label: &LabelImage, copies: CopyCount, side: PrinterSide) -> LabelResponse {
        let printer = match self.printer_target() {
            PrinterTarget::Configured(printer) => printer,
            PrinterTarget::Misconfigured => {
                return match label.to_png_bytes() {
                    Ok(bytes) => LabelResponse::Png {
                        bytes,
                        reason: Some(PreviewReason::Misconfigured),
                    },
                    Err(err) => LabelResponse::from_error(&err),
                };
            }
        };

        let report = self
            .dispatcher
            .dispatch(label, copies, printer.as_ref(), side)
            .await;
        match report.outcome {
            DispatchOutcome::Preview { png, reason } => LabelResponse::Png {
                bytes: png,
                reason: Some(reason),
            },
            DispatchOutcome::Submitted {
                job,
                printer_job_id,
            } => LabelResponse::Printed {
                job_id: job.id,
                printer_job_id,
                pages: job.page_count,
            },
            DispatchOutcome::Failed { error } => LabelResponse::from_error(&error),
        }
    }
}
