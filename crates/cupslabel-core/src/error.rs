// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for cupslabel.

use thiserror::Error;

/// Top-level error type for all cupslabel operations.
///
/// Each failure class a host needs to react to differently has its own
/// variant, so callers match on the kind instead of parsing messages.
#[derive(Debug, Error)]
pub enum CupsLabelError {
    // -- Print errors --
    /// The CUPS server could not be reached, rejected our credentials, or
    /// failed at the protocol level while the connection was being opened.
    #[error("cannot connect to CUPS server {server}: {reason}")]
    Connect { server: String, reason: String },

    /// A single copy submission failed. Copies before `copy` were already
    /// accepted by the server and are not retracted.
    #[error("submitting copy {copy} to printer '{printer}' failed after {submitted} accepted: {reason}")]
    Submit {
        printer: String,
        copy: u32,
        submitted: u32,
        reason: String,
    },

    #[error("no printer selected")]
    NoPrinterSelected,

    // -- Document errors --
    #[error("label rendering failed: {0}")]
    Render(String),

    // -- Settings / options --
    #[error("invalid value for setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("invalid print option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CupsLabelError {
    /// Whether this error means the device should be reported as disconnected.
    pub fn is_device_failure(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Submit { .. })
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CupsLabelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_and_submit_are_device_failures() {
        let connect = CupsLabelError::Connect {
            server: "cups.local:631".into(),
            reason: "connection refused".into(),
        };
        let submit = CupsLabelError::Submit {
            printer: "zebra".into(),
            copy: 1,
            submitted: 1,
            reason: "server-error-busy".into(),
        };
        assert!(connect.is_device_failure());
        assert!(submit.is_device_failure());
        assert!(!CupsLabelError::NoPrinterSelected.is_device_failure());
        assert!(!CupsLabelError::Render("bad template".into()).is_device_failure());
    }

    #[test]
    fn submit_message_names_copy_and_printer() {
        let err = CupsLabelError::Submit {
            printer: "zebra".into(),
            copy: 2,
            submitted: 2,
            reason: "timed out".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("copy 2"));
        assert!(msg.contains("'zebra'"));
    }
}
