// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory CUPS backend for tests.
//
// Counts connects, records every submission (including whether the temp file
// existed at submission time and what it held), and fails on demand.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cupslabel_core::settings::ConnectionSettings;
use cupslabel_core::types::PrinterChoice;

use crate::cups_client::{CupsBackend, CupsConnection, CupsError, SecretProvider};

/// One recorded `print_file` call.
#[derive(Debug, Clone)]
pub struct Submission {
    pub printer: String,
    pub path: PathBuf,
    pub title: String,
    /// Whether `path` existed when the submission was made.
    pub file_existed: bool,
    pub contents: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    connects: AtomicUsize,
    connect_failures_left: AtomicUsize,
    list_failures_left: AtomicUsize,
    secret_requests: AtomicUsize,
    printers: Mutex<Vec<PrinterChoice>>,
    submissions: Mutex<Vec<Submission>>,
    /// Zero-based index (across all submissions) that fails.
    failing_submission: Mutex<Option<usize>>,
    submission_attempts: AtomicUsize,
    required_password: Mutex<Option<String>>,
}

/// Scriptable `CupsBackend`.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Printers every connection will report.
    pub fn with_printers(self, printers: Vec<PrinterChoice>) -> Self {
        if let Ok(mut slot) = self.state.printers.lock() {
            *slot = printers;
        }
        self
    }

    /// Fail the next `n` connects.
    pub fn fail_connects(&self, n: usize) {
        self.state.connect_failures_left.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` printer listings with a connection-level error.
    pub fn fail_listings(&self, n: usize) {
        self.state.list_failures_left.store(n, Ordering::SeqCst);
    }

    /// Fail the submission with this zero-based index (counted across calls).
    pub fn fail_submission(&self, index: usize) {
        if let Ok(mut slot) = self.state.failing_submission.lock() {
            *slot = Some(index);
        }
    }

    /// Challenge every request until `password` is supplied.
    pub fn require_password(&self, password: &str) {
        if let Ok(mut slot) = self.state.required_password.lock() {
            *slot = Some(password.to_string());
        }
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn secret_requests(&self) -> usize {
        self.state.secret_requests.load(Ordering::SeqCst)
    }

    pub fn submission_attempts(&self) -> usize {
        self.state.submission_attempts.load(Ordering::SeqCst)
    }

    /// Successful submissions, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state
            .submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl CupsBackend for MockBackend {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        secret: Arc<dyn SecretProvider>,
    ) -> Result<Arc<dyn CupsConnection>, CupsError> {
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        if take_one(&self.state.connect_failures_left) {
            return Err(CupsError::Unreachable {
                address: settings.address(),
                reason: "connection refused".into(),
            });
        }

        Ok(Arc::new(MockConnection {
            state: Arc::clone(&self.state),
            user: settings.user.clone(),
            secret,
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    user: String,
    secret: Arc<dyn SecretProvider>,
}

impl MockConnection {
    fn authenticate(&self) -> Result<(), CupsError> {
        let required = self
            .state
            .required_password
            .lock()
            .ok()
            .and_then(|p| p.clone());
        let Some(required) = required else {
            return Ok(());
        };
        self.state.secret_requests.fetch_add(1, Ordering::SeqCst);
        match self.secret.secret() {
            Some(given) if given == required => Ok(()),
            _ => Err(CupsError::AuthenticationRejected {
                user: self.user.clone(),
            }),
        }
    }
}

#[async_trait]
impl CupsConnection for MockConnection {
    async fn list_printers(&self) -> Result<Vec<PrinterChoice>, CupsError> {
        self.authenticate()?;
        if take_one(&self.state.list_failures_left) {
            return Err(CupsError::Unreachable {
                address: "mock".into(),
                reason: "connection reset by peer".into(),
            });
        }
        Ok(self
            .state
            .printers
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default())
    }

    async fn print_file(&self, printer: &str, path: &Path, title: &str) -> Result<i32, CupsError> {
        self.authenticate()?;
        let index = self.state.submission_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .state
            .failing_submission
            .lock()
            .ok()
            .and_then(|f| *f);
        if failing == Some(index) {
            return Err(CupsError::Protocol(
                "Print-Job returned status server-error-busy".into(),
            ));
        }

        let contents = std::fs::read(path).unwrap_or_default();
        let submission = Submission {
            printer: printer.to_string(),
            path: path.to_path_buf(),
            title: title.to_string(),
            file_existed: path.exists(),
            contents,
        };
        if let Ok(mut submissions) = self.state.submissions.lock() {
            submissions.push(submission);
        }
        Ok(100 + index as i32)
    }
}
