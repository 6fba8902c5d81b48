// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print document — one PDF per print action, one page per copy.
//
// printpdf 0.8 builds pages from `Vec<Op>`; the label raster is registered
// once as an XObject and referenced from every page.

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use stocktag_core::error::{Result, StocktagError};
use stocktag_core::types::{CopyCount, LABEL_DPI};

use crate::compose::LabelImage;

/// A finished print document ready for submission.
#[derive(Debug, Clone)]
pub struct LabelDocument {
    bytes: Vec<u8>,
    pages: u32,
    sha256: String,
}

impl LabelDocument {
    /// Build a PDF with `copies` identical pages sized to the label's media.
    ///
    /// The page count is read back from the serialised bytes; a mismatch is
    /// an error so a short document is never sent to the printer.
    #[instrument(skip(label), fields(stock = ?label.stock(), copies = copies.get()))]
    pub fn build(label: &LabelImage, copies: CopyCount) -> Result<Self> {
        let stock = label.stock();
        let (w_mm, h_mm) = stock.media_dimensions_mm();
        let oriented = label.print_oriented();
        let (px_w, px_h) = oriented.dimensions();

        let rgb = image::DynamicImage::ImageLuma8(oriented).to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: px_w as usize,
            height: px_h as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new("Stocktag label");
        let xobject_id = doc.add_image(&raw);

        let pages: Vec<PdfPage> = (0..copies.get())
            .map(|_| {
                let ops = vec![Op::UseXobject {
                    id: xobject_id.clone(),
                    transform: XObjectTransform {
                        translate_x: Some(Pt(0.0)),
                        translate_y: Some(Pt(0.0)),
                        scale_x: Some(1.0),
                        scale_y: Some(1.0),
                        dpi: Some(LABEL_DPI),
                        rotate: None,
                    },
                }];
                PdfPage::new(Mm(w_mm), Mm(h_mm), ops)
            })
            .collect();
        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings");
        }

        let pages = count_pages(&bytes)?;
        if pages != copies.get() {
            return Err(StocktagError::Document(format!(
                "document has {pages} pages, expected {}",
                copies.get()
            )));
        }

        let sha256 = hex::encode(Sha256::digest(&bytes));
        debug!(px_w, px_h, w_mm, h_mm, "label placed on page");
        info!(pages, bytes = bytes.len(), sha256 = %sha256, "print document built");

        Ok(Self {
            bytes,
            pages,
            sha256,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Hex SHA-256 of the PDF bytes.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// Page count of a serialised PDF.
pub fn count_pages(bytes: &[u8]) -> Result<u32> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|err| StocktagError::Document(format!("failed to parse PDF: {err}")))?;
    Ok(document.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktag_core::types::LabelStock;

    #[test]
    fn one_page_per_copy() {
        let label = LabelImage::blank(LabelStock::Address);
        for n in [1, 3, 25] {
            let doc = LabelDocument::build(&label, CopyCount::clamped(n, 25)).unwrap();
            assert_eq!(doc.pages(), n as u32);
            assert_eq!(count_pages(doc.bytes()).unwrap(), n as u32);
        }
    }

    #[test]
    fn every_stock_builds() {
        for stock in LabelStock::ALL {
            let doc = LabelDocument::build(&LabelImage::blank(stock), CopyCount::single()).unwrap();
            assert!(doc.bytes().starts_with(b"%PDF"));
        }
    }

    #[test]
    fn hash_matches_bytes() {
        let doc =
            LabelDocument::build(&LabelImage::blank(LabelStock::Shipping), CopyCount::single())
                .unwrap();
        assert_eq!(doc.sha256().len(), 64);
        assert_eq!(doc.sha256(), hex::encode(Sha256::digest(doc.bytes())));
    }

    #[test]
    fn garbage_is_not_a_pdf() {
        assert!(count_pages(b"hello").is_err());
    }
}
