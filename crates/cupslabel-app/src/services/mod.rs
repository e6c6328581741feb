// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: configuration storage and the HTTP relay in front of the
// label driver.

pub mod config_store;
pub mod data_dir;
pub mod relay;
