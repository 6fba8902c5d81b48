// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the label and print actions.
//
// "Fix your printer" and "no printer set up" must read differently, so print
// submission failures get their own wording; the preview fallback is not an
// error at all and never reaches this module.

use crate::error::StocktagError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip, busy printer — the user may simply press print again.
    Transient,
    /// User must change something (settings, printer, paper).
    ActionRequired,
    /// Cannot be fixed by retrying — bad data for this item.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether pressing the button again may help. Nothing retries on its own.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `StocktagError` into a `HumanError`.
pub fn humanize_error(err: &StocktagError) -> HumanError {
    match err {
        StocktagError::Configuration(_) => HumanError {
            message: "We can't make a QR code for this item.".into(),
            suggestion: "Check the base URL setting in the add-on configuration.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        StocktagError::Encoding(detail) => HumanError {
            message: "This item's link is too long for a QR code.".into(),
            suggestion: format!("Use a shorter base URL, then try again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        StocktagError::Image(_) | StocktagError::Document(_) => HumanError {
            message: "The label could not be drawn.".into(),
            suggestion: "Try again. If it keeps happening, check the item's photo and text.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        StocktagError::IppRequest(detail) | StocktagError::PrintSubmission(detail) => {
            humanize_print_error(detail)
        }

        StocktagError::Io(_) | StocktagError::Serialization(_) => HumanError {
            message: "Something went wrong while preparing the label.".into(),
            suggestion: "Try again in a moment.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

/// Pick wording based on what the printer said.
fn humanize_print_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("not-accepting") || lower.contains("paused") || lower.contains("stopped") {
        return HumanError {
            message: "The printer is not accepting labels right now.".into(),
            suggestion: "Check that the printer is resumed in CUPS and has labels loaded.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        };
    }

    if lower.contains("not-found") || lower.contains("not found") || lower.contains("404") {
        return HumanError {
            message: "The printer queue could not be found.".into(),
            suggestion: "Check the printer name in the add-on configuration.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        };
    }

    if lower.contains("document-format") || lower.contains("unsupported") {
        return HumanError {
            message: "The printer refused the label format.".into(),
            suggestion: "Make sure the CUPS queue has a driver that accepts PDF.".into(),
            retriable: false,
            severity: Severity::Permanent,
        };
    }

    HumanError {
        message: "The label was not printed.".into(),
        suggestion: format!("Check the printer, then press print again. ({detail})"),
        retriable: true,
        severity: Severity::Transient,
    }
}
