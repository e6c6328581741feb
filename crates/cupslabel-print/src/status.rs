// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device status tracking for the label printer driven by a driver instance.
//
//   Unknown --connect ok--> Ready --submit ok--> Ready
//      any  --connect/submit failure--> Disconnected
//   Disconnected --next print attempt--> Unknown
//
// The tracker only reports; it never blocks a request. Recovery always
// starts from scratch on the caller's next attempt.

use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, warn};

use cupslabel_core::types::{DeviceStatus, StatusSnapshot};

/// Status of one logical label-printing device.
pub struct StatusTracker {
    state: Mutex<TrackerState>,
}

struct TrackerState {
    snapshot: StatusSnapshot,
    consecutive_failures: u32,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                snapshot: StatusSnapshot {
                    status: DeviceStatus::Unknown,
                    since: Utc::now(),
                    last_error: None,
                },
                consecutive_failures: 0,
            }),
        }
    }

    /// A print attempt is starting. A disconnected device goes back to
    /// `Unknown` so the attempt reconnects from scratch.
    pub fn begin_attempt(&self) {
        if let Ok(mut state) = self.state.lock()
            && state.snapshot.status == DeviceStatus::Disconnected
        {
            debug!("device was disconnected, retrying from unknown");
            transition(&mut state, DeviceStatus::Unknown);
        }
    }

    /// A connect or submit succeeded.
    pub fn record_ready(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.snapshot.status != DeviceStatus::Ready {
                info!(
                    prev = ?state.snapshot.status,
                    "label printer ready"
                );
            }
            state.consecutive_failures = 0;
            state.snapshot.last_error = None;
            transition(&mut state, DeviceStatus::Ready);
        }
    }

    /// A connect or submit failed.
    pub fn record_failure(&self, error: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.consecutive_failures += 1;
            state.snapshot.last_error = Some(error.to_string());
            warn!(
                failures = state.consecutive_failures,
                error,
                "label printer disconnected"
            );
            transition(&mut state, DeviceStatus::Disconnected);
        }
    }

    /// Current status.
    pub fn status(&self) -> DeviceStatus {
        self.state
            .lock()
            .map(|s| s.snapshot.status)
            .unwrap_or(DeviceStatus::Unknown)
    }

    /// Full snapshot, including when the status last changed.
    pub fn snapshot(&self) -> StatusSnapshot {
        match self.state.lock() {
            Ok(state) => state.snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().snapshot.clone(),
        }
    }

    /// User-facing status line, if there is anything worth saying.
    pub fn status_message(&self) -> Option<String> {
        let state = self.state.lock().ok()?;
        match state.snapshot.status {
            DeviceStatus::Ready | DeviceStatus::Unknown => None,
            DeviceStatus::Disconnected => Some(format!(
                "The label printer is not reachable ({} failed attempt{}). The next print will reconnect.",
                state.consecutive_failures,
                if state.consecutive_failures == 1 { "" } else { "s" },
            )),
        }
    }
}

fn transition(state: &mut TrackerState, next: DeviceStatus) {
    if state.snapshot.status != next {
        state.snapshot.status = next;
        state.snapshot.since = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let tracker = StatusTracker::new();
        assert_eq!(tracker.status(), DeviceStatus::Unknown);
        assert!(tracker.status_message().is_none());
    }

    #[test]
    fn success_makes_ready() {
        let tracker = StatusTracker::new();
        tracker.record_ready();
        assert_eq!(tracker.status(), DeviceStatus::Ready);
        tracker.record_ready();
        assert_eq!(tracker.status(), DeviceStatus::Ready);
    }

    #[test]
    fn failure_disconnects_and_keeps_error() {
        let tracker = StatusTracker::new();
        tracker.record_ready();
        tracker.record_failure("connection refused");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status, DeviceStatus::Disconnected);
        assert_eq!(snapshot.last_error.as_deref(), Some("connection refused"));
        assert!(tracker.status_message().unwrap().contains("1 failed attempt)"));
    }

    #[test]
    fn next_attempt_recovers_to_unknown() {
        let tracker = StatusTracker::new();
        tracker.record_failure("timed out");
        tracker.begin_attempt();
        assert_eq!(tracker.status(), DeviceStatus::Unknown);
    }

    #[test]
    fn begin_attempt_leaves_ready_alone() {
        let tracker = StatusTracker::new();
        tracker.record_ready();
        tracker.begin_attempt();
        assert_eq!(tracker.status(), DeviceStatus::Ready);
    }

    #[test]
    fn ready_clears_failure_count() {
        let tracker = StatusTracker::new();
        tracker.record_failure("a");
        tracker.record_failure("b");
        assert!(tracker.status_message().unwrap().contains("2 failed attempts"));

        tracker.record_ready();
        assert!(tracker.snapshot().last_error.is_none());
        tracker.record_failure("c");
        assert!(tracker.status_message().unwrap().contains("1 failed attempt)"));
    }
}
