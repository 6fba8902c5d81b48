// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// stocktag-label — everything between an item snapshot and printable bytes.
//
// Resolves the public item link, encodes it as a QR code, lays out the label
// canvas for the configured stock, and wraps a finished label into the
// multi-page document sent to the printer.

pub mod compose;
pub mod document;
pub mod link;
pub mod qr;
pub mod quick;
pub mod text;

pub use compose::{LabelComposer, LabelImage, load_photo};
pub use document::LabelDocument;
pub use link::{RequestContext, ResolvedUrl, resolve};
pub use qr::QrEncoder;
pub use quick::compose_quick;
pub use text::LabelFonts;
