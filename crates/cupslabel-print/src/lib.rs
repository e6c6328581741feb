// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cupslabel Print: CUPS client, connection cache, printer enumeration and
// the label print dispatcher. This crate bridges the domain types defined in
// `cupslabel-core` and a CUPS server spoken to over IPP.

pub mod cache;
pub mod cups_client;
pub mod dispatch;
pub mod driver;
pub mod printers;
pub mod render;
pub mod status;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use cache::{ConnectionCache, ReusePolicy};
pub use cups_client::{CupsBackend, CupsConnection, CupsError, IppCupsBackend, SecretProvider};
pub use driver::{LabelDriver, LabelRequest};
pub use render::{LabelRenderer, NoRenderer};
pub use status::StatusTracker;
