// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fonts, measurement and wrapping for label text.
//
// The add-on image ships DejaVu; a development machine may not. Without a
// font the layout still runs on estimated metrics and nothing is drawn, so
// the label keeps its size and QR placement.

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_text_mut;
use tracing::{debug, warn};

/// Ink colour on the grayscale canvas.
pub const INK: Luma<u8> = Luma([0u8]);

/// Typeface role on a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    /// Bold, used for the item name.
    Title,
    /// Regular, used for detail rows.
    Body,
    /// Monospace, used for serials.
    Mono,
}

impl FontRole {
    fn file_name(&self) -> &'static str {
        match self {
            Self::Title => "DejaVuSans-Bold.ttf",
            Self::Body => "DejaVuSans.ttf",
            Self::Mono => "DejaVuSansMono.ttf",
        }
    }

    /// Average advance as a fraction of the pixel size, used without a font.
    fn estimated_advance(&self) -> f32 {
        match self {
            Self::Title => 0.62,
            Self::Body => 0.55,
            Self::Mono => 0.60,
        }
    }
}

const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
];

/// The three label typefaces, each optional.
#[derive(Default)]
pub struct LabelFonts {
    title: Option<FontVec>,
    body: Option<FontVec>,
    mono: Option<FontVec>,
}

impl LabelFonts {
    /// Search `font_dir` first, then the usual system locations.
    pub fn load(font_dir: Option<&Path>) -> Self {
        let mut dirs: Vec<PathBuf> = font_dir.map(Path::to_path_buf).into_iter().collect();
        dirs.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));

        let fonts = Self {
            title: find_font(&dirs, FontRole::Title),
            body: find_font(&dirs, FontRole::Body),
            mono: find_font(&dirs, FontRole::Mono),
        };
        if fonts.is_empty() {
            warn!("no label fonts found; labels will be rendered without text");
        }
        fonts
    }

    /// No fonts: layout on estimated metrics, no text drawn.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.mono.is_none()
    }

    fn font(&self, role: FontRole) -> Option<&FontVec> {
        let preferred = match role {
            FontRole::Title => self.title.as_ref(),
            FontRole::Body => self.body.as_ref(),
            FontRole::Mono => self.mono.as_ref(),
        };
        preferred.or(self.body.as_ref())
    }

    /// Pixel width of `text` at size `px`.
    pub fn measure(&self, role: FontRole, px: f32, text: &str) -> u32 {
        match self.font(role) {
            Some(font) => measure_with(font, px, text),
            None => (text.chars().count() as f32 * px * role.estimated_advance()).ceil() as u32,
        }
    }

    /// Draw `text` with its top-left corner at (`x`, `y`).
    pub fn draw(&self, canvas: &mut GrayImage, role: FontRole, px: f32, x: i32, y: i32, text: &str) {
        if let Some(font) = self.font(role) {
            draw_text_mut(canvas, INK, x, y, PxScale::from(px), font, text);
        }
    }
}

fn find_font(dirs: &[PathBuf], role: FontRole) -> Option<FontVec> {
    for dir in dirs {
        let path = dir.join(role.file_name());
        let Ok(data) = std::fs::read(&path) else {
            continue;
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                debug!(path = %path.display(), ?role, "label font loaded");
                return Some(font);
            }
            Err(err) => warn!(path = %path.display(), %err, "unreadable font file"),
        }
    }
    None
}

fn measure_with(font: &FontVec, px: f32, text: &str) -> u32 {
    let scaled = font.as_scaled(PxScale::from(px));
    let mut width = 0.0f32;
    let mut prev: Option<ab_glyph::GlyphId> = None;

    for ch in text.chars() {
        let glyph = scaled.glyph_id(ch);
        if let Some(prev) = prev {
            width += scaled.kern(prev, glyph);
        }
        width += scaled.h_advance(glyph);
        prev = Some(glyph);
    }

    width.ceil() as u32
}

/// Fixed line advance for a size. Independent of the loaded font so the
/// layout plan is identical with and without fonts.
pub fn line_height(px: f32) -> u32 {
    px.ceil() as u32 + 2
}

/// Word-wrap `text` to `max_width` pixels. Words wider than a line are
/// broken by character.
pub fn wrap_text(
    fonts: &LabelFonts,
    role: FontRole,
    px: f32,
    text: &str,
    max_width: u32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fonts.measure(role, px, &candidate) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if fonts.measure(role, px, word) <= max_width {
            current = word.to_string();
            continue;
        }

        for ch in word.chars() {
            let mut widened = current.clone();
            widened.push(ch);
            if !current.is_empty() && fonts.measure(role, px, &widened) > max_width {
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            } else {
                current = widened;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Keep at most `max_lines`, ending the last kept line with an ellipsis that
/// still fits `max_width`.
pub fn truncate_lines(
    fonts: &LabelFonts,
    role: FontRole,
    px: f32,
    mut lines: Vec<String>,
    max_lines: usize,
    max_width: u32,
) -> Vec<String> {
    if lines.len() <= max_lines {
        return lines;
    }
    lines.truncate(max_lines);
    let Some(last) = lines.last_mut() else {
        return lines;
    };

    *last = ellipsize(fonts, role, px, last, max_width);
    lines
}

/// Single line cut to `max_width`, ending in `…` when anything was dropped.
pub fn fit_line(fonts: &LabelFonts, role: FontRole, px: f32, text: &str, max_width: u32) -> String {
    if fonts.measure(role, px, text) <= max_width {
        return text.to_string();
    }
    ellipsize(fonts, role, px, text, max_width)
}

fn ellipsize(fonts: &LabelFonts, role: FontRole, px: f32, text: &str, max_width: u32) -> String {
    let mut kept = text.to_string();
    while !kept.is_empty() && fonts.measure(role, px, &format!("{kept}…")) > max_width {
        kept.pop();
    }
    format!("{}…", kept.trim_end())
}
