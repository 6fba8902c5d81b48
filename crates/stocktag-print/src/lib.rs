// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// stocktag-print — printer reachability and label print dispatch over IPP.

pub mod dispatch;
pub mod ipp_client;
pub mod options;
pub mod probe;

pub use ipp::prelude::IppAttribute;

pub use dispatch::{
    DispatchOutcome, DispatchReport, DispatchState, Dispatcher, IppSubmitter, JobSubmitter,
    PreviewReason,
};
pub use ipp_client::IppClient;
pub use options::JobOptions;
pub use probe::{NetworkProbe, PrinterProbe, PrinterStatus, printer_status};
