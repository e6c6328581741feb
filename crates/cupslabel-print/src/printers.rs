// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer enumeration for the PRINTER setting's choice list.
//
// Never fails: when the server cannot be reached or queried, the list is a
// single sentinel entry so the host's settings screen still has something to
// show.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use cupslabel_core::settings::ConnectionSettings;
use cupslabel_core::types::PrinterChoice;

use crate::cache::ConnectionCache;
use crate::cups_client::SecretProvider;

/// List the printer queues on the configured server.
#[instrument(skip_all, fields(address = %settings.address()))]
pub async fn list_printers(
    cache: &ConnectionCache,
    settings: &ConnectionSettings,
    secret: Arc<dyn SecretProvider>,
) -> Vec<PrinterChoice> {
    let connection = match cache.acquire(settings, secret).await {
        Ok(connection) => connection,
        Err(e) => {
            warn!(error = %e, "cannot enumerate printers, server unavailable");
            return vec![PrinterChoice::scan_error()];
        }
    };

    match connection.list_printers().await {
        Ok(printers) => {
            info!(count = printers.len(), "printers enumerated");
            printers
        }
        Err(e) => {
            warn!(error = %e, "printer query failed, dropping cached connection");
            cache.invalidate().await;
            vec![PrinterChoice::scan_error()]
        }
    }
}
