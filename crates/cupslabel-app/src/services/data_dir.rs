// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "cupslabel";

/// Directory holding the relay's persisted files. Not created here; the
/// config store creates it on first save.
pub fn data_dir() -> PathBuf {
    app_dir_in(&base_dir())
}

fn app_dir_in(base: &Path) -> PathBuf {
    base.join(APP_DIR)
}

fn base_dir() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}
