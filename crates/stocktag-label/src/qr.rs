// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR encoding of item links.
//
// Output depends only on the URL, the target size and the error-correction
// level, so an unchanged item reprints pixel-for-pixel.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use tracing::{debug, instrument};

use stocktag_core::config::QrLevel;
use stocktag_core::error::{Result, StocktagError};

/// Quiet zone added by the renderer on each side, in modules.
const QUIET_ZONE_MODULES: u32 = 4;

/// QR code encoder with a fixed error-correction level.
#[derive(Debug, Clone, Copy)]
pub struct QrEncoder {
    level: EcLevel,
}

impl QrEncoder {
    pub fn new(level: QrLevel) -> Self {
        let level = match level {
            QrLevel::L => EcLevel::L,
            QrLevel::M => EcLevel::M,
            QrLevel::Q => EcLevel::Q,
            QrLevel::H => EcLevel::H,
        };
        Self { level }
    }

    /// Encode `url` into a `target` x `target` grayscale image, quiet zone
    /// included.
    ///
    /// Data beyond the symbol capacity for the level is rejected rather than
    /// truncated.
    #[instrument(skip(self), fields(len = url.len()))]
    pub fn encode(&self, url: &str, target: u32) -> Result<GrayImage> {
        if target == 0 {
            return Err(StocktagError::Encoding("QR target size must be positive".into()));
        }

        let code = QrCode::with_error_correction_level(url.as_bytes(), self.level).map_err(
            |err| match err {
                QrError::DataTooLong => StocktagError::Encoding(format!(
                    "{} bytes exceed QR capacity at level {:?}",
                    url.len(),
                    self.level
                )),
                other => StocktagError::Encoding(other.to_string()),
            },
        )?;

        let modules = code.width() as u32 + 2 * QUIET_ZONE_MODULES;
        let module_px = (target / modules).max(1);
        let rendered = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .module_dimensions(module_px, module_px)
            .build();

        debug!(
            version = ?code.version(),
            modules,
            module_px,
            rendered = rendered.width(),
            target,
            "QR rendered"
        );

        if rendered.dimensions() == (target, target) {
            return Ok(rendered);
        }
        Ok(imageops::resize(&rendered, target, target, FilterType::Nearest))
    }
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self::new(QrLevel::M)
    }
}
