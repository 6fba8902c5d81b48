// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label compositor — lays out an item label on the fixed canvas of a label
// stock and draws it.
//
// Layout is computed first as a `LabelPlan` (pure geometry, no pixels), then
// drawn. Canvas layout, left to right:
//
//   +--------+-----------------------------+---------+
//   |        | Name (bold, up to 3 lines)  |         |
//   |   QR   | Cat / Loc / Bin / Qty / ... |  photo  |
//   |        |                             |         |
//   | serial |                             |         |
//   +--------+-----------------------------+---------+

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use tracing::{debug, info, instrument, warn};

use stocktag_core::error::{Result, StocktagError};
use stocktag_core::types::{
    ItemSnapshot, LabelLayout, LabelRequest, LabelStock, display_date, non_blank,
};

use crate::text::{FontRole, LabelFonts, fit_line, line_height, truncate_lines, wrap_text};

/// Outer margin and gutter between columns.
pub const MARGIN: u32 = 10;
/// Band reserved for the serial under the QR code.
pub const FOOTER_HEIGHT: u32 = 28;

const TITLE_PX: f32 = 48.0;
const BODY_PX: f32 = 28.0;
const MONO_PX: f32 = 20.0;
const MAX_TITLE_LINES: usize = 3;
const PAPER: Luma<u8> = Luma([255u8]);

/// Detail rows in the order they are stacked under the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelField {
    Category,
    Location,
    Bin,
    Quantity,
    Condition,
    CookDate,
    UseBy,
    UseWithin,
}

pub const FIELD_PRIORITY: [LabelField; 8] = [
    LabelField::Category,
    LabelField::Location,
    LabelField::Bin,
    LabelField::Quantity,
    LabelField::Condition,
    LabelField::CookDate,
    LabelField::UseBy,
    LabelField::UseWithin,
];

impl LabelField {
    fn enabled(&self, layout: &LabelLayout) -> bool {
        match self {
            Self::Category => layout.include_category,
            Self::Location => layout.include_location,
            Self::Bin => layout.include_bin,
            Self::Quantity => layout.include_qty_unit,
            Self::Condition => layout.include_condition,
            Self::CookDate => layout.include_cook_date,
            Self::UseBy => layout.include_use_by,
            Self::UseWithin => layout.include_use_within,
        }
    }

    /// Row text, or `None` when the item has no value for it.
    fn text(&self, item: &ItemSnapshot) -> Option<String> {
        let field = |prefix: &str, value: Option<&String>| {
            non_blank(value.map(String::as_str)).map(|v| format!("{prefix}: {v}"))
        };
        match self {
            Self::Category => field("Cat", item.category.as_ref()),
            Self::Location => field("Loc", item.location.as_ref()),
            Self::Bin => field("Bin", item.bin_number.as_ref()),
            Self::Quantity => item.quantity.map(|qty| {
                match non_blank(item.unit.as_deref()) {
                    Some(unit) => format!("Qty: {} {unit}", format_quantity(qty)),
                    None => format!("Qty: {}", format_quantity(qty)),
                }
            }),
            Self::Condition => field("Cond", item.condition.as_ref()),
            Self::CookDate => non_blank(item.cook_date.as_deref())
                .map(|d| format!("Cook: {}", display_date(d))),
            Self::UseBy => non_blank(item.use_by_date.as_deref())
                .map(|d| format!("Use-by: {}", display_date(d))),
            Self::UseWithin => field("Use within", item.use_within.as_ref()),
        }
    }
}

fn format_quantity(qty: f64) -> String {
    if qty.fract() == 0.0 && qty.abs() < 1e15 {
        format!("{}", qty as i64)
    } else {
        let s = format!("{qty:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Axis-aligned box on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A line of text positioned on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub role: FontRole,
    pub px: f32,
    pub x: u32,
    pub y: u32,
    pub text: String,
}

/// Geometry of one label, before any pixels are touched.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlan {
    pub canvas: (u32, u32),
    pub qr: Option<Rect>,
    pub photo: Option<Rect>,
    pub title: Vec<TextLine>,
    pub rows: Vec<(LabelField, TextLine)>,
    pub footer: Option<TextLine>,
}

/// A rendered label. Owned by the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelImage {
    stock: LabelStock,
    pixels: GrayImage,
}

impl LabelImage {
    /// Blank (white) canvas for `stock`.
    pub fn blank(stock: LabelStock) -> Self {
        let (w, h) = stock.canvas_size();
        Self {
            stock,
            pixels: GrayImage::from_pixel(w, h, PAPER),
        }
    }

    pub fn stock(&self) -> LabelStock {
        self.stock
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut GrayImage {
        &mut self.pixels
    }

    /// The label turned to match how the media is fed to the printer.
    pub fn print_oriented(&self) -> GrayImage {
        if self.stock.needs_rotation() {
            imageops::rotate90(&self.pixels)
        } else {
            self.pixels.clone()
        }
    }

    /// Encode as PNG (preview response body).
    ///
    /// The `image` PNG encoder writes no pHYs chunk, so the file carries no
    /// DPI. Every stock is 300 dpi; the print path sends the PDF, which does
    /// carry the physical page size.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        DynamicImage::ImageLuma8(self.pixels.clone())
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| StocktagError::Image(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

/// Load a photo for the thumbnail.
///
/// A dangling reference or an undecodable file yields `None`: the label is
/// then drawn exactly as if no photo had been referenced.
pub fn load_photo(path: Option<&Path>) -> Option<DynamicImage> {
    let path = path?;
    if !path.is_file() {
        warn!(path = %path.display(), "photo reference points at a missing file; omitting thumbnail");
        return None;
    }
    match image::open(path) {
        Ok(img) => Some(img),
        Err(err) => {
            warn!(path = %path.display(), %err, "photo could not be decoded; omitting thumbnail");
            None
        }
    }
}

/// Lays out and draws item labels for one stock and layout.
pub struct LabelComposer<'a> {
    stock: LabelStock,
    layout: &'a LabelLayout,
    fonts: &'a LabelFonts,
}

impl<'a> LabelComposer<'a> {
    pub fn new(stock: LabelStock, layout: &'a LabelLayout, fonts: &'a LabelFonts) -> Self {
        Self {
            stock,
            layout,
            fonts,
        }
    }

    /// Side length of the QR square for this stock.
    pub fn qr_size(&self) -> u32 {
        let (w, h) = self.stock.canvas_size();
        (h.saturating_sub(2 * MARGIN + FOOTER_HEIGHT)).min(w * 2 / 5)
    }

    /// Compute the layout for `item`.
    pub fn plan(&self, item: &ItemSnapshot, has_photo: bool) -> LabelPlan {
        let (w, h) = self.stock.canvas_size();
        let scale = self.layout.effective_font_scale();
        let title_px = TITLE_PX * scale;
        let body_px = BODY_PX * scale;

        let qr = self.layout.include_qr.then(|| {
            let side = self.qr_size();
            Rect {
                x: MARGIN,
                y: MARGIN,
                width: side,
                height: side,
            }
        });
        let text_left = match qr {
            Some(r) => r.x + r.width + MARGIN,
            None => 2 * MARGIN,
        };

        let photo = (has_photo && self.layout.include_photo).then(|| {
            let side = (h - 2 * MARGIN).min(w.saturating_sub(text_left + MARGIN) / 3);
            Rect {
                x: w - MARGIN - side,
                y: MARGIN,
                width: side,
                height: side,
            }
        });
        let text_right = match photo {
            Some(r) => r.x.saturating_sub(MARGIN),
            None => w - MARGIN,
        };
        let text_width = text_right.saturating_sub(text_left);

        // Without a QR column the serial sits under the text instead.
        let footer_text = item.footer_code();
        let bottom = if qr.is_none() && footer_text.is_some() {
            h - MARGIN - FOOTER_HEIGHT
        } else {
            h - MARGIN
        };

        let place = |role: FontRole, px: f32, y: u32, text: String| {
            let x = if self.layout.align_center {
                let used = self.fonts.measure(role, px, &text).min(text_width);
                text_left + (text_width - used) / 2
            } else {
                text_left
            };
            TextLine {
                role,
                px,
                x,
                y,
                text,
            }
        };

        // Name is mandatory.
        let name = non_blank(Some(item.name.as_str())).unwrap_or("Item");
        let wrapped = wrap_text(self.fonts, FontRole::Title, title_px, name, text_width);
        let wrapped = truncate_lines(
            self.fonts,
            FontRole::Title,
            title_px,
            wrapped,
            MAX_TITLE_LINES,
            text_width,
        );

        let mut y = MARGIN;
        let mut title = Vec::with_capacity(wrapped.len());
        for line in wrapped {
            title.push(place(FontRole::Title, title_px, y, line));
            y += line_height(title_px);
        }
        y += 2;

        let mut rows = Vec::new();
        let row_height = line_height(body_px);
        for field in FIELD_PRIORITY {
            if !field.enabled(self.layout) {
                continue;
            }
            let Some(text) = field.text(item) else {
                continue;
            };
            if y + row_height > bottom {
                debug!(?field, "label full; dropping remaining rows");
                break;
            }
            rows.push((field, place(FontRole::Body, body_px, y, text)));
            y += row_height;
        }

        // The serial stays inside the QR column.
        let footer_width = qr.map_or(w - 2 * MARGIN, |r| r.width);
        let footer = footer_text.map(|code| TextLine {
            role: FontRole::Mono,
            px: MONO_PX,
            x: MARGIN,
            y: h - MARGIN - FOOTER_HEIGHT + (FOOTER_HEIGHT - line_height(MONO_PX)) / 2,
            text: fit_line(self.fonts, FontRole::Mono, MONO_PX, code, footer_width),
        });

        LabelPlan {
            canvas: (w, h),
            qr,
            photo,
            title,
            rows,
            footer,
        }
    }

    /// Draw a label from an already encoded QR image and an optional photo.
    ///
    /// The printer side selector plays no part here: the same pixels go to
    /// either roll.
    #[instrument(skip_all, fields(item_id = request.item.id, stock = ?self.stock))]
    pub fn compose(
        &self,
        request: &LabelRequest,
        qr: Option<&GrayImage>,
        photo: Option<&DynamicImage>,
    ) -> LabelImage {
        let plan = self.plan(&request.item, photo.is_some());
        let mut label = LabelImage::blank(self.stock);
        let canvas = label.pixels_mut();

        if let (Some(rect), Some(qr)) = (plan.qr, qr) {
            paste_fitted(canvas, qr, rect);
        }

        if let (Some(rect), Some(photo)) = (plan.photo, photo) {
            let thumb = photo
                .resize(rect.width, rect.height, FilterType::Triangle)
                .to_luma8();
            let x = rect.x + (rect.width - thumb.width()) / 2;
            let y = rect.y + (rect.height - thumb.height()) / 2;
            imageops::overlay(canvas, &thumb, i64::from(x), i64::from(y));
        }

        for line in plan
            .title
            .iter()
            .chain(plan.rows.iter().map(|(_, line)| line))
            .chain(plan.footer.iter())
        {
            self.fonts.draw(
                canvas,
                line.role,
                line.px,
                line.x as i32,
                line.y as i32,
                &line.text,
            );
        }

        debug!(
            title_lines = plan.title.len(),
            rows = plan.rows.len(),
            photo = plan.photo.is_some(),
            "label composed"
        );
        label
    }

    /// Load the request's photo (if any) and compose. A photo that cannot be
    /// found degrades to the photo-less label.
    pub fn render(&self, request: &LabelRequest, qr: Option<&GrayImage>) -> LabelImage {
        let photo = if self.layout.include_photo {
            load_photo(request.item.photo.as_deref())
        } else {
            None
        };
        let label = self.compose(request, qr, photo.as_ref());
        info!(
            item_id = request.item.id,
            width = label.width(),
            height = label.height(),
            "label rendered"
        );
        label
    }
}

/// Copy `src` into `rect`, scaling with nearest-neighbour when the sizes
/// differ so QR modules stay sharp.
fn paste_fitted(canvas: &mut GrayImage, src: &GrayImage, rect: Rect) {
    if src.dimensions() == (rect.width, rect.height) {
        imageops::replace(canvas, src, i64::from(rect.x), i64::from(rect.y));
    } else {
        let scaled = imageops::resize(src, rect.width, rect.height, FilterType::Nearest);
        imageops::replace(canvas, &scaled, i64::from(rect.x), i64::from(rect.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::QrEncoder;
    use image::RgbImage;
    use stocktag_core::types::{CopyCount, PrinterSide};

    fn full_item() -> ItemSnapshot {
        ItemSnapshot {
            id: 42,
            name: "Chicken stock".into(),
            serial_number: Some("INV-0042".into()),
            category: Some("Freezer".into()),
            location: Some("Garage".into()),
            bin_number: Some("B3".into()),
            quantity: Some(2.0),
            unit: Some("jars".into()),
            cook_date: Some("2026-01-10".into()),
            use_by_date: Some("2026-04-10".into()),
            ..ItemSnapshot::default()
        }
    }

    fn request(item: ItemSnapshot) -> LabelRequest {
        LabelRequest::new(item, CopyCount::single(), PrinterSide::Auto)
    }

    fn qr_for(composer: &LabelComposer<'_>, id: i64) -> GrayImage {
        QrEncoder::default()
            .encode(&format!("http://inv.local/item/{id}"), composer.qr_size())
            .unwrap()
    }

    fn write_photo(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("photo.png");
        RgbImage::from_pixel(64, 48, image::Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn canvas_size_is_fixed_per_stock() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let sparse = ItemSnapshot::new(1, "");
        for stock in LabelStock::ALL {
            let composer = LabelComposer::new(stock, &layout, &fonts);
            let qr = qr_for(&composer, 1);
            for item in [full_item(), sparse.clone()] {
                let label = composer.compose(&request(item), Some(&qr), None);
                assert_eq!((label.width(), label.height()), stock.canvas_size());
            }
        }
    }

    #[test]
    fn qr_lands_at_top_left_margin() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);
        let qr = qr_for(&composer, 42);
        assert_eq!(composer.qr_size(), 282);

        let label = composer.compose(&request(full_item()), Some(&qr), None);
        let region = imageops::crop_imm(label.as_gray(), MARGIN, MARGIN, 282, 282).to_image();
        assert_eq!(region.as_raw(), qr.as_raw());
    }

    #[test]
    fn disabled_qr_leaves_the_corner_blank() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout {
            include_qr: false,
            ..LabelLayout::default()
        };
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);
        let plan = composer.plan(&full_item(), false);
        assert!(plan.qr.is_none());
        assert_eq!(plan.title[0].x, 2 * MARGIN);

        let label = composer.compose(&request(full_item()), None, None);
        assert!(label.as_gray().pixels().all(|p| p.0 == [255]));
    }

    #[test]
    fn rows_follow_priority_order() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Shipping, &layout, &fonts);
        let plan = composer.plan(&full_item(), false);
        let fields: Vec<LabelField> = plan.rows.iter().map(|(f, _)| *f).collect();
        assert_eq!(
            fields,
            vec![
                LabelField::Category,
                LabelField::Location,
                LabelField::Bin,
                LabelField::CookDate,
                LabelField::UseBy,
            ]
        );
        assert!(plan.rows.windows(2).all(|w| w[0].1.y < w[1].1.y));
    }

    #[test]
    fn absent_fields_collapse() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);

        let full = composer.plan(&full_item(), false);
        let mut sparse_item = ItemSnapshot::new(42, "Chicken stock");
        sparse_item.use_by_date = Some("2026-04-10".into());
        let sparse = composer.plan(&sparse_item, false);

        assert_eq!(sparse.rows.len(), 1);
        let (field, line) = &sparse.rows[0];
        assert_eq!(*field, LabelField::UseBy);
        // Use-by moves up into the first detail row.
        assert_eq!(line.y, full.rows[0].1.y);
        assert_eq!(line.text, "Use-by: 2026-04-10");
    }

    #[test]
    fn name_is_always_rendered() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);
        let plan = composer.plan(&ItemSnapshot::new(5, "   "), false);
        assert_eq!(plan.title.len(), 1);
        assert_eq!(plan.title[0].text, "Item");
        assert!(plan.rows.is_empty());
    }

    #[test]
    fn long_names_are_capped_at_three_lines() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Multipurpose, &layout, &fonts);
        let item = ItemSnapshot::new(
            5,
            "Extraordinarily long name for a jar of homemade tomato and basil pasta sauce",
        );
        let plan = composer.plan(&item, false);
        assert_eq!(plan.title.len(), MAX_TITLE_LINES);
        assert!(plan.title[2].text.ends_with('…'));
    }

    #[test]
    fn rows_never_overflow_the_canvas() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout {
            include_qty_unit: true,
            include_condition: true,
            include_use_within: true,
            ..LabelLayout::default()
        };
        let mut item = full_item();
        item.condition = Some("Sealed".into());
        item.use_within = Some("3 months".into());

        for stock in LabelStock::ALL {
            let composer = LabelComposer::new(stock, &layout, &fonts);
            let plan = composer.plan(&item, false);
            let (_, h) = plan.canvas;
            for (_, row) in &plan.rows {
                assert!(row.y + line_height(row.px) <= h - MARGIN);
            }
        }
    }

    #[test]
    fn serial_goes_in_the_footer() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);
        let plan = composer.plan(&full_item(), false);
        let footer = plan.footer.expect("footer");
        assert_eq!(footer.text, "INV-0042");
        assert_eq!(footer.x, MARGIN);
        assert!(footer.y > MARGIN + composer.qr_size());
    }

    #[test]
    fn long_serial_is_cut_to_the_qr_column() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);
        let item = ItemSnapshot {
            serial_number: Some("SER-".repeat(20)),
            ..full_item()
        };
        let plan = composer.plan(&item, false);
        let footer = plan.footer.expect("footer");
        assert!(footer.text.ends_with('…'));
        assert!(fonts.measure(FontRole::Mono, MONO_PX, &footer.text) <= composer.qr_size());
    }

    #[test]
    fn missing_photo_matches_photo_less_label() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);
        let qr = qr_for(&composer, 42);

        let mut dangling = full_item();
        dangling.photo = Some(dir.path().join("deleted.jpg"));
        let without = full_item();

        let a = composer.render(&request(dangling), Some(&qr));
        let b = composer.render(&request(without), Some(&qr));
        assert_eq!(a, b);
    }

    #[test]
    fn undecodable_photo_matches_photo_less_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);

        let mut broken = full_item();
        broken.photo = Some(path);
        let a = composer.render(&request(broken), None);
        let b = composer.render(&request(full_item()), None);
        assert_eq!(a, b);
    }

    #[test]
    fn present_photo_is_drawn_in_the_right_column() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);

        let mut item = full_item();
        item.photo = Some(write_photo(dir.path()));
        let label = composer.render(&request(item.clone()), None);
        let plan = composer.plan(&item, true);
        let rect = plan.photo.expect("photo box");

        assert_eq!(rect.x + rect.width, label.width() - MARGIN);
        let centre = label
            .as_gray()
            .get_pixel(rect.x + rect.width / 2, rect.y + rect.height / 2);
        assert_eq!(centre.0, [0]);
        assert!(plan.title.iter().all(|t| t.x < rect.x));
    }

    #[test]
    fn photo_toggle_off_ignores_photo() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = LabelFonts::none();
        let layout = LabelLayout {
            include_photo: false,
            ..LabelLayout::default()
        };
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);

        let mut item = full_item();
        item.photo = Some(write_photo(dir.path()));
        let with = composer.render(&request(item), None);
        let without = composer.render(&request(full_item()), None);
        assert_eq!(with, without);
    }

    #[test]
    fn composition_is_side_agnostic() {
        let fonts = LabelFonts::none();
        let layout = LabelLayout::default();
        let composer = LabelComposer::new(LabelStock::Address, &layout, &fonts);
        let qr = qr_for(&composer, 42);

        let left = LabelRequest::new(full_item(), CopyCount::single(), PrinterSide::Left);
        let right = LabelRequest::new(full_item(), CopyCount::single(), PrinterSide::Right);
        assert_eq!(
            composer.compose(&left, Some(&qr), None),
            composer.compose(&right, Some(&qr), None)
        );
    }

    #[test]
    fn print_orientation_follows_media() {
        let address = LabelImage::blank(LabelStock::Address).print_oriented();
        assert_eq!(address.dimensions(), (330, 1051));
        let multi = LabelImage::blank(LabelStock::Multipurpose).print_oriented();
        assert_eq!(multi.dimensions(), (637, 259));
    }

    #[test]
    fn png_round_trips_dimensions() {
        let label = LabelImage::blank(LabelStock::Shipping);
        let png = label.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (826, 637));
    }

    #[test]
    fn quantities_print_without_trailing_zeros() {
        assert_eq!(format_quantity(2.0), "2");
        assert_eq!(format_quantity(1.5), "1.5");
        assert_eq!(format_quantity(0.25), "0.25");
    }
}
