// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quick labels: free text, no item and no QR code.

use tracing::debug;

use stocktag_core::types::{LabelStock, non_blank};

use crate::compose::{LabelImage, MARGIN};
use crate::text::{FontRole, LabelFonts, line_height, wrap_text};

const QUICK_TITLE_PX: f32 = 40.0;
const QUICK_BODY_PX: f32 = 24.0;
const QUICK_TOP: u32 = 6;

/// Lines of a quick label with their top offsets.
pub fn quick_lines(
    stock: LabelStock,
    fonts: &LabelFonts,
    title: &str,
    description: &str,
) -> Vec<(FontRole, u32, String)> {
    let (w, h) = stock.canvas_size();
    let title = non_blank(Some(title)).unwrap_or("Label");

    let mut lines = vec![(FontRole::Title, QUICK_TOP, title.to_string())];
    let mut y = QUICK_TOP + line_height(QUICK_TITLE_PX) + 4;

    let body = wrap_text(fonts, FontRole::Body, QUICK_BODY_PX, description, w - 2 * MARGIN);
    let step = line_height(QUICK_BODY_PX);
    for line in body {
        if y + step > h - MARGIN {
            debug!("quick label full; remaining text dropped");
            break;
        }
        lines.push((FontRole::Body, y, line));
        y += step;
    }
    lines
}

/// Render a quick label on `stock`. An empty title prints as "Label".
pub fn compose_quick(
    stock: LabelStock,
    fonts: &LabelFonts,
    title: &str,
    description: &str,
) -> LabelImage {
    let mut label = LabelImage::blank(stock);
    for (role, y, text) in quick_lines(stock, fonts, title, description) {
        let px = match role {
            FontRole::Title => QUICK_TITLE_PX,
            _ => QUICK_BODY_PX,
        };
        fonts.draw(label.pixels_mut(), role, px, MARGIN as i32, y as i32, &text);
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_title_defaults_to_label() {
        let lines = quick_lines(LabelStock::Address, &LabelFonts::none(), "  ", "");
        assert_eq!(lines, vec![(FontRole::Title, QUICK_TOP, "Label".to_string())]);
    }

    #[test]
    fn body_wraps_and_stays_on_canvas() {
        let text = "Spare fuses, assorted sizes, keep away from the damp corner of the shed ".repeat(6);
        let lines = quick_lines(LabelStock::Address, &LabelFonts::none(), "Fuses", &text);
        assert!(lines.len() > 2);
        let (_, h) = LabelStock::Address.canvas_size();
        for (role, y, _) in &lines[1..] {
            assert_eq!(*role, FontRole::Body);
            assert!(y + line_height(QUICK_BODY_PX) <= h - MARGIN);
        }
    }

    #[test]
    fn quick_label_has_stock_canvas() {
        let label = compose_quick(LabelStock::Multipurpose, &LabelFonts::none(), "Hi", "there");
        assert_eq!((label.width(), label.height()), (637, 259));
    }
}
