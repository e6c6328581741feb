// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-visible error messages for the host's label printing screen.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Nothing here retries anything: `retriable` only tells the user whether
// pressing "print" again is worth it.

use serde::Serialize;

use crate::error::CupsLabelError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Network blip, busy server; trying again may work.
    Transient,
    /// User must do something (fix a setting, load labels, pick a printer).
    ActionRequired,
    /// Cannot be fixed by retrying: wrong format, broken template.
    Permanent,
    /// Consumables need replacing (labels, ribbon).
    BuyRequired,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether printing again, unchanged, may succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `CupsLabelError` into a `HumanError` for display.
pub fn humanize_error(err: &CupsLabelError) -> HumanError {
    match err {
        CupsLabelError::Connect { server, reason } => humanize_connect_error(server, reason),

        CupsLabelError::Submit { reason, .. } => humanize_submit_error(reason),

        CupsLabelError::NoPrinterSelected => HumanError {
            message: "No printer selected.".into(),
            suggestion: "Choose a printer in the plugin settings, then try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        CupsLabelError::Render(detail) => HumanError {
            message: "The label could not be created.".into(),
            suggestion: format!("Check the label template and try again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        CupsLabelError::InvalidSetting { key, reason } => HumanError {
            message: format!("The {} setting is not valid.", key.to_ascii_lowercase()),
            suggestion: format!("Correct the setting and save it again. ({reason})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        CupsLabelError::InvalidOption { name, reason } => HumanError {
            message: format!("The print option '{name}' is not valid."),
            suggestion: format!("Change the option and print again. ({reason})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        CupsLabelError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Check the path and try again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Permission denied while preparing the label.".into(),
                    suggestion: "Check that the temporary directory is writable by the print relay.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        CupsLabelError::Serialization(_) => HumanError {
            message: "The relay had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

fn humanize_connect_error(server: &str, reason: &str) -> HumanError {
    let lower = reason.to_ascii_lowercase();

    if lower.contains("authentication") || lower.contains("not-authorized") || lower.contains("not-authenticated") {
        HumanError {
            message: "The print server rejected our login.".into(),
            suggestion: format!("Check the user and password settings for {server}."),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("timed out") {
        HumanError {
            message: "Cannot get connection to printer: the print server didn't respond in time.".into(),
            suggestion: format!("Check that {server} is switched on and reachable, then try again."),
            retriable: true,
            severity: Severity::Transient,
        }
    } else {
        HumanError {
            message: "Cannot get connection to printer.".into(),
            suggestion: format!("Check the server and port settings ({server}) and that CUPS is running."),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}

/// Parse IPP-specific submission failures into human-readable messages.
fn humanize_submit_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("authentication") || lower.contains("not-authorized") || lower.contains("not-authenticated") {
        HumanError {
            message: "The print server rejected our login.".into(),
            suggestion: "Check the user and password settings, then print again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("timed out") {
        HumanError {
            message: "The print server didn't respond in time.".into(),
            suggestion: "The server might be busy. Check the printer queue before printing again, as some copies may already be queued.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("client-error-not-found") {
        HumanError {
            message: "The selected printer doesn't exist on the print server.".into(),
            suggestion: "Pick the printer again in the plugin settings; it may have been renamed or removed.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("client-error-document-format") {
        HumanError {
            message: "The printer doesn't understand this file type.".into(),
            suggestion: "Make sure the label template produces a PDF.".into(),
            retriable: false,
            severity: Severity::Permanent,
        }
    } else if lower.contains("media-empty") || lower.contains("out of paper") {
        HumanError {
            message: "The printer is out of labels.".into(),
            suggestion: "Load a new label roll, then print again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("marker-supply") || lower.contains("ribbon") {
        HumanError {
            message: "The printer needs a new ribbon.".into(),
            suggestion: "Replace the ribbon cartridge, then print again.".into(),
            retriable: false,
            severity: Severity::BuyRequired,
        }
    } else if lower.contains("server-error") {
        HumanError {
            message: "The print server reported an internal error.".into(),
            suggestion: "Check the CUPS error log, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else {
        HumanError {
            message: "The label could not be sent to the printer.".into(),
            suggestion: format!("Try again. If this keeps happening, check the printer in CUPS. (Detail: {detail})"),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}
