// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-slot CUPS connection cache.
//
// Holds at most one connection, tagged with the fingerprint of the settings
// that built it and the instant it was created. A request reuses it only if
// the fingerprint still matches and the reuse policy still considers it
// fresh; otherwise the slot is rebuilt. A failed connect empties the slot.
//
// The whole check-and-replace sequence runs under one async mutex so that
// concurrent callers never race to build two connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use cupslabel_core::settings::ConnectionSettings;

use crate::cups_client::{CupsBackend, CupsConnection, CupsError, SecretProvider};

/// Default freshness window of a cached connection.
pub const DEFAULT_REUSE_WINDOW: Duration = Duration::from_secs(60);

/// When a cached connection may be handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReusePolicy {
    /// Reuse a connection built from the same settings for this long.
    Window(Duration),
    /// Build a new connection for every call.
    AlwaysReconnect,
}

impl Default for ReusePolicy {
    fn default() -> Self {
        Self::Window(DEFAULT_REUSE_WINDOW)
    }
}

impl ReusePolicy {
    /// Policy from a configured number of seconds; `0` disables reuse.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::AlwaysReconnect
        } else {
            Self::Window(Duration::from_secs(secs))
        }
    }

    fn is_fresh(&self, created_at: Instant, now: Instant) -> bool {
        match self {
            Self::Window(window) => now.saturating_duration_since(created_at) < *window,
            Self::AlwaysReconnect => false,
        }
    }
}

/// The one cached connection.
struct CachedConnection {
    fingerprint: String,
    created_at: Instant,
    handle: Arc<dyn CupsConnection>,
}

/// Single-slot connection cache owned by one driver.
pub struct ConnectionCache {
    backend: Arc<dyn CupsBackend>,
    policy: ReusePolicy,
    slot: Mutex<Option<CachedConnection>>,
}

impl ConnectionCache {
    pub fn new(backend: Arc<dyn CupsBackend>, policy: ReusePolicy) -> Self {
        Self {
            backend,
            policy,
            slot: Mutex::new(None),
        }
    }

    /// Return a live connection for `settings`, reusing the cached one when
    /// it is fresh and was built from identical settings.
    ///
    /// On a connect failure the slot is cleared and the error returned; no
    /// retry happens here.
    pub async fn acquire(
        &self,
        settings: &ConnectionSettings,
        secret: Arc<dyn SecretProvider>,
    ) -> Result<Arc<dyn CupsConnection>, CupsError> {
        let fingerprint = settings.fingerprint();
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            let same_settings = cached.fingerprint == fingerprint;
            if same_settings && self.policy.is_fresh(cached.created_at, Instant::now()) {
                debug!(address = %settings.address(), "reusing cached CUPS connection");
                return Ok(Arc::clone(&cached.handle));
            }
            debug!(
                address = %settings.address(),
                same_settings,
                "cached CUPS connection not reusable, reconnecting"
            );
        }

        match self.backend.connect(settings, secret).await {
            Ok(handle) => {
                *slot = Some(CachedConnection {
                    fingerprint,
                    created_at: Instant::now(),
                    handle: Arc::clone(&handle),
                });
                info!(address = %settings.address(), "cached new CUPS connection");
                Ok(handle)
            }
            Err(e) => {
                *slot = None;
                warn!(address = %settings.address(), error = %e, "CUPS connect failed");
                Err(e)
            }
        }
    }

    /// Drop the cached connection so the next `acquire` builds a new one.
    ///
    /// Called when a request on a cached handle failed in a way that suggests
    /// the handle went stale.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            debug!("cached CUPS connection invalidated");
        }
    }

    /// Whether a connection is currently cached (fresh or not).
    pub async fn is_populated(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}
