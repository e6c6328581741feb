// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print dispatcher: scoped temp file, then one Print-Job per copy.
//
// Copies are submitted sequentially. The first failed copy aborts the rest;
// copies the server already accepted stay queued. The temp file is removed
// when `dispatch` returns, whichever way it returns.

use std::io::Write;

use tracing::{debug, info, instrument, warn};

use cupslabel_core::error::{CupsLabelError, Result};
use cupslabel_core::types::{DispatchId, DispatchReceipt, MAX_COPIES, PrintJob};

use crate::cups_client::CupsConnection;

const TEMP_PREFIX: &str = "cupslabel-";
const TEMP_SUFFIX: &str = ".pdf";

/// Write `job.document` to a temp file and submit it `job.copies` times.
#[instrument(
    skip(connection, job),
    fields(printer = %job.printer, copies = job.copies, bytes = job.document.len())
)]
pub async fn dispatch(
    connection: &dyn CupsConnection,
    job: &PrintJob,
    dispatch_id: DispatchId,
) -> Result<DispatchReceipt> {
    if !(1..=MAX_COPIES).contains(&job.copies) {
        return Err(CupsLabelError::InvalidOption {
            name: "copies".into(),
            reason: format!("must be between 1 and {MAX_COPIES}, got {}", job.copies),
        });
    }

    // Dropping `file` deletes it.
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile()?;
    file.write_all(&job.document)?;
    file.flush()?;
    debug!(path = %file.path().display(), "label written to temp file");

    let mut remote_job_ids = Vec::with_capacity(job.copies as usize);
    for copy in 0..job.copies {
        let title = job.copy_title(copy);
        match connection.print_file(&job.printer, file.path(), &title).await {
            Ok(job_id) => {
                debug!(copy, job_id, "copy accepted");
                remote_job_ids.push(job_id);
            }
            Err(e) => {
                let submitted = remote_job_ids.len() as u32;
                warn!(
                    copy,
                    submitted,
                    error = %e,
                    "copy rejected, aborting remaining copies"
                );
                return Err(CupsLabelError::Submit {
                    printer: job.printer.clone(),
                    copy,
                    submitted,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(%dispatch_id, "all copies submitted");
    Ok(DispatchReceipt {
        dispatch_id,
        printer: job.printer.clone(),
        copies_submitted: job.copies,
        remote_job_ids,
    })
}
