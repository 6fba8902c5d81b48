// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Stocktag.
//
// A missing photo and an unreachable printer are deliberately absent: both
// degrade to a state (photo-less label, preview) rather than an error.

use thiserror::Error;

/// Top-level error type for all Stocktag operations.
#[derive(Debug, Error)]
pub enum StocktagError {
    // -- Link / QR --
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("QR encoding failed: {0}")]
    Encoding(String),

    // -- Rendering --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("print document failed: {0}")]
    Document(String),

    // -- Printing --
    #[error("IPP request failed: {0}")]
    IppRequest(String),

    #[error("print submission failed: {0}")]
    PrintSubmission(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StocktagError>;
