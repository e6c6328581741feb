// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the cupslabel print relay.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CupsLabelError, Result};

/// Upper bound on copies per request, guarding against runaway host input.
pub const MAX_COPIES: u32 = 100;

/// Display text of the single entry returned when printers cannot be listed.
pub const PRINTER_SCAN_ERROR: &str = "error scanning for printers";

/// Unique identifier for one dispatch (one `print_label` call).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(pub Uuid);

impl DispatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A printer queue offered to the user as a setting choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterChoice {
    /// CUPS queue name (`printer-name`).
    pub id: String,
    /// Human-readable name (`printer-info`, or the id if none is advertised).
    pub display_name: String,
}

impl PrinterChoice {
    pub fn new(id: impl Into<String>, display_name: Option<String>) -> Self {
        let id = id.into();
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        Self { id, display_name }
    }

    /// The entry shown in place of a printer list when the server is unreachable.
    pub fn scan_error() -> Self {
        Self {
            id: String::new(),
            display_name: PRINTER_SCAN_ERROR.into(),
        }
    }

    pub fn is_scan_error(&self) -> bool {
        self.id.is_empty() && self.display_name == PRINTER_SCAN_ERROR
    }
}

/// Status of the logical label-printing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// No connection attempt has resolved yet.
    Unknown,
    /// Last connect/submit succeeded.
    Ready,
    /// Last connect or submit failed. The next print attempt starts over.
    Disconnected,
}

/// Point-in-time view of the device status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: DeviceStatus,
    /// When `status` last changed.
    pub since: DateTime<Utc>,
    /// Message of the failure that caused `Disconnected`, if any.
    pub last_error: Option<String>,
}

/// Per-request print options, usually supplied by the host as a loose map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintOptions {
    pub copies: u32,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self { copies: 1 }
    }
}

impl PrintOptions {
    /// Build options with an explicit copy count, validating it.
    pub fn with_copies(copies: i64) -> Result<Self> {
        if copies < 1 {
            return Err(CupsLabelError::InvalidOption {
                name: "copies".into(),
                reason: format!("must be at least 1, got {copies}"),
            });
        }
        if copies > i64::from(MAX_COPIES) {
            return Err(CupsLabelError::InvalidOption {
                name: "copies".into(),
                reason: format!("must be at most {MAX_COPIES}, got {copies}"),
            });
        }
        Ok(Self {
            copies: copies as u32,
        })
    }

    /// Read options from a host-provided map. A missing `copies` means one copy.
    pub fn from_map(options: &HashMap<String, serde_json::Value>) -> Result<Self> {
        match options.get("copies") {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => {
                let copies = value.as_i64().ok_or_else(|| CupsLabelError::InvalidOption {
                    name: "copies".into(),
                    reason: format!("expected an integer, got {value}"),
                })?;
                Self::with_copies(copies)
            }
        }
    }
}

/// A rendered document ready to be sent to one printer.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub document: Vec<u8>,
    pub printer: String,
    /// Base name for the job titles; each copy appends its index.
    pub filename: String,
    pub copies: u32,
}

impl PrintJob {
    /// Job title for a single copy, e.g. `part-label-0`.
    pub fn copy_title(&self, copy: u32) -> String {
        format!("{}-{}", self.filename, copy)
    }
}

/// A reference to something the host renders into a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelItem {
    /// Identifier of the item being labelled (e.g. a stock item primary key).
    pub reference: String,
    /// Free-form fields made available to the template.
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

/// Where the bytes of a label come from.
#[derive(Debug, Clone)]
pub enum LabelSource {
    /// Already-rendered PDF bytes.
    Rendered(Vec<u8>),
    /// Render `item` with `template` through the configured renderer.
    Template { template: String, item: LabelItem },
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub dispatch_id: DispatchId,
    pub printer: String,
    /// Number of copies the server accepted.
    pub copies_submitted: u32,
    /// Job id the server assigned to each copy, in submission order.
    pub remote_job_ids: Vec<i32>,
}
