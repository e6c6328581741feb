// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cupslabel: Core types, settings and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod settings;
pub mod types;

pub use config::AppConfig;
pub use error::CupsLabelError;
pub use settings::{ConnectionSettings, SettingKey, SettingsSource};
pub use types::*;
