// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Stocktag label pipeline.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StocktagError};

/// Label rendering resolution. All stock canvases are laid out at this DPI.
pub const LABEL_DPI: f32 = 300.0;

/// Default IPP port when the printer host carries none.
pub const DEFAULT_IPP_PORT: u16 = 631;

/// Unique identifier for a print job (log correlation only, never persisted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable copy of an inventory item, taken from the data store before the
/// label pipeline runs. Nothing in here refers back to a live session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSnapshot {
    pub id: i64,
    pub name: String,
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub bin_number: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub condition: Option<String>,
    /// ISO date (or datetime) as stored.
    pub cook_date: Option<String>,
    /// ISO date (or datetime) as stored.
    pub use_by_date: Option<String>,
    pub use_within: Option<String>,
    /// Photo file reference. May point at a file that no longer exists.
    pub photo: Option<PathBuf>,
}

impl ItemSnapshot {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Text printed in the label footer: the serial, else the barcode.
    pub fn footer_code(&self) -> Option<&str> {
        non_blank(self.serial_number.as_deref()).or_else(|| non_blank(self.barcode.as_deref()))
    }
}

/// Return `Some(trimmed)` when the value carries visible text.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Normalise a stored date for display (`YYYY-MM-DD`).
///
/// Accepts plain dates, naive datetimes and RFC 3339 timestamps. Anything else
/// is shown as stored.
pub fn display_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.date().format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

/// Roll on a twin-roll label printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSlot {
    Left,
    Right,
}

impl InputSlot {
    /// Value sent as the CUPS `InputSlot` job option.
    pub fn ipp_keyword(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }
}

/// Which roll the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterSide {
    /// Let the label stock decide.
    #[default]
    Auto,
    Left,
    Right,
}

impl PrinterSide {
    /// Lenient parse: unknown values fall back to `Auto`.
    pub fn from_keyword(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::Auto,
        }
    }

    /// Resolve to a concrete roll, consulting the stock for `Auto`.
    pub fn input_slot(&self, stock: LabelStock) -> Option<InputSlot> {
        match self {
            Self::Left => Some(InputSlot::Left),
            Self::Right => Some(InputSlot::Right),
            Self::Auto => stock.default_roll(),
        }
    }
}

/// Supported physical label sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStock {
    /// 89 x 28 mm address label (DYMO 30252 style).
    #[default]
    Address,
    /// 70 x 54 mm shipping label.
    Shipping,
    /// 54 x 22 mm multipurpose label.
    Multipurpose,
}

impl LabelStock {
    pub const ALL: [LabelStock; 3] = [Self::Address, Self::Shipping, Self::Multipurpose];

    /// CUPS `media` keyword (width/height in points).
    pub fn media_keyword(&self) -> &'static str {
        match self {
            Self::Address => "w79h252",
            Self::Shipping => "w154h198",
            Self::Multipurpose => "w154h64",
        }
    }

    /// Media size in millimetres (width, height) as the printer feeds it.
    pub fn media_dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::Address => (28.0, 89.0),
            Self::Shipping => (54.0, 70.0),
            Self::Multipurpose => (54.0, 22.0),
        }
    }

    /// Label canvas in pixels (width, height). The long edge is always the
    /// width; [`needs_rotation`](Self::needs_rotation) tells the printer path
    /// whether to turn it to match the media.
    pub fn canvas_size(&self) -> (u32, u32) {
        let (w_mm, h_mm) = self.media_dimensions_mm();
        let long = w_mm.max(h_mm);
        let short = w_mm.min(h_mm);
        (mm_to_px(long), mm_to_px(short))
    }

    /// Whether the media is fed portrait (taller than wide).
    pub fn needs_rotation(&self) -> bool {
        let (w, h) = self.media_dimensions_mm();
        h > w
    }

    /// Roll used when the side selector is `Auto`.
    pub fn default_roll(&self) -> Option<InputSlot> {
        match self {
            Self::Address => Some(InputSlot::Left),
            Self::Shipping | Self::Multipurpose => Some(InputSlot::Right),
        }
    }
}

impl FromStr for LabelStock {
    type Err = StocktagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "address" | "w79h252" => Ok(Self::Address),
            "shipping" | "w154h198" => Ok(Self::Shipping),
            "multipurpose" | "w154h64" => Ok(Self::Multipurpose),
            other => Err(StocktagError::Configuration(format!(
                "unknown label stock '{other}'"
            ))),
        }
    }
}

fn mm_to_px(mm: f32) -> u32 {
    (mm / 25.4 * LABEL_DPI) as u32
}

/// Requested number of copies, clamped into `[1, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CopyCount(u32);

impl CopyCount {
    pub fn clamped(requested: i64, max: u32) -> Self {
        let max = max.max(1);
        Self(requested.clamp(1, i64::from(max)) as u32)
    }

    pub fn single() -> Self {
        Self(1)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Which fields end up on an item label. Mirrors the add-on's label presets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelLayout {
    pub include_qr: bool,
    pub include_category: bool,
    pub include_location: bool,
    pub include_bin: bool,
    pub include_qty_unit: bool,
    pub include_condition: bool,
    pub include_cook_date: bool,
    pub include_use_by: bool,
    pub include_use_within: bool,
    pub include_photo: bool,
    pub align_center: bool,
    pub font_scale: f32,
}

impl LabelLayout {
    /// Font scale clamped to the range the canvas can hold.
    pub fn effective_font_scale(&self) -> f32 {
        if self.font_scale.is_finite() {
            self.font_scale.clamp(0.6, 1.4)
        } else {
            1.0
        }
    }
}

impl Default for LabelLayout {
    fn default() -> Self {
        Self {
            include_qr: true,
            include_category: true,
            include_location: true,
            include_bin: true,
            include_qty_unit: false,
            include_condition: false,
            include_cook_date: true,
            include_use_by: true,
            include_use_within: false,
            include_photo: true,
            align_center: false,
            font_scale: 1.0,
        }
    }
}

/// One preview or print action for one item.
#[derive(Debug, Clone)]
pub struct LabelRequest {
    pub item: ItemSnapshot,
    pub copies: CopyCount,
    pub side: PrinterSide,
}

impl LabelRequest {
    pub fn new(item: ItemSnapshot, copies: CopyCount, side: PrinterSide) -> Self {
        Self { item, copies, side }
    }

    /// Single-copy request, as used by previews.
    pub fn preview(item: ItemSnapshot) -> Self {
        Self::new(item, CopyCount::single(), PrinterSide::Auto)
    }
}

/// Network printer endpoint and queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub host: String,
    pub port: u16,
    pub queue: String,
}

impl PrinterConfig {
    /// Build from the add-on's `ipp_host` / `ipp_printer` settings.
    ///
    /// Returns `Ok(None)` when either value is missing (preview-only mode) and
    /// an error when the host carries an unusable port.
    pub fn from_settings(host: Option<&str>, queue: Option<&str>) -> Result<Option<Self>> {
        let (Some(host), Some(queue)) = (non_blank(host), non_blank(queue)) else {
            return Ok(None);
        };
        let (host, port) = split_host_port(host)?;
        Ok(Some(Self {
            host,
            port,
            queue: queue.to_string(),
        }))
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// CUPS-style printer URI for the queue.
    pub fn uri(&self) -> String {
        format!("ipp://{}/printers/{}", self.address(), self.queue)
    }
}

fn split_host_port(raw: &str) -> Result<(String, u16)> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                StocktagError::Configuration(format!("invalid printer port '{port}' in '{raw}'"))
            })
    };

    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            StocktagError::Configuration(format!("unterminated IPv6 literal in '{raw}'"))
        })?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), parse_port(port)?)),
            None if tail.is_empty() => Ok((host.to_string(), DEFAULT_IPP_PORT)),
            None => Err(StocktagError::Configuration(format!(
                "unexpected text after IPv6 literal in '{raw}'"
            ))),
        };
    }

    match raw.rsplit_once(':') {
        // A bare IPv6 address without brackets: no port.
        Some((host, _)) if host.contains(':') => Ok((raw.to_string(), DEFAULT_IPP_PORT)),
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port)?)),
        Some(_) => Err(StocktagError::Configuration(format!(
            "printer host missing in '{raw}'"
        ))),
        None => Ok((raw.to_string(), DEFAULT_IPP_PORT)),
    }
}

/// The one queue entry produced by a print action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub printer: PrinterConfig,
    /// Pages in the submitted document; always equal to the copy count.
    pub page_count: u32,
    pub side: PrinterSide,
    pub input_slot: Option<InputSlot>,
    pub media: String,
    /// SHA-256 of the submitted document bytes.
    pub document_hash: String,
    pub created_at: DateTime<Utc>,
}
