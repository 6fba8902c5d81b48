// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job template attributes sent with every label Print-Job.

use ipp::prelude::*;

use stocktag_core::error::{Result, StocktagError};
use stocktag_core::types::{InputSlot, LabelStock, PrinterSide};

/// `orientation-requested` value for portrait (RFC 8011 §5.2.10).
pub const ORIENTATION_PORTRAIT: i32 = 3;

const ZERO_MARGINS: [&str; 4] = ["page-left", "page-right", "page-top", "page-bottom"];

/// Media, roll and orientation for one print action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    pub media: &'static str,
    pub input_slot: Option<InputSlot>,
    pub orientation: i32,
}

impl JobOptions {
    /// Options for printing on `stock`. An explicit side picks the roll;
    /// `Auto` uses the stock's usual roll.
    pub fn for_stock(stock: LabelStock, side: PrinterSide) -> Self {
        Self {
            media: stock.media_keyword(),
            input_slot: side.input_slot(stock),
            orientation: ORIENTATION_PORTRAIT,
        }
    }

    /// The options as IPP job attributes, margins zeroed.
    pub fn ipp_attributes(&self) -> Result<Vec<IppAttribute>> {
        let mut attrs = vec![
            IppAttribute::new("media", parse_value("media", self.media)?),
            IppAttribute::new("orientation-requested", IppValue::Enum(self.orientation)),
        ];
        for name in ZERO_MARGINS {
            attrs.push(IppAttribute::new(name, IppValue::Integer(0)));
        }
        if let Some(slot) = self.input_slot {
            attrs.push(IppAttribute::new(
                "InputSlot",
                parse_value("InputSlot", slot.ipp_keyword())?,
            ));
        }
        Ok(attrs)
    }
}

fn parse_value(name: &str, value: &str) -> Result<IppValue> {
    value
        .parse::<IppValue>()
        .map_err(|e| StocktagError::IppRequest(format!("bad value '{value}' for {name}: {e}")))
}
