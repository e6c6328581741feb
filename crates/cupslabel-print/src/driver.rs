// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label driver: the entry points a host calls.
//
// One driver owns one connection cache and one status tracker; nothing is
// global. Settings are read from the host's source on every call so that a
// changed setting takes effect (and invalidates the cached connection via
// its fingerprint) without restarting anything.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span};

use cupslabel_core::error::{CupsLabelError, Result};
use cupslabel_core::settings::{
    ConnectionSettings, SettingDefinition, SettingKey, SettingsSource, setting_definitions,
};
use cupslabel_core::types::{
    DispatchId, DispatchReceipt, LabelItem, LabelSource, PrintJob, PrintOptions, PrinterChoice,
    StatusSnapshot,
};

use crate::cache::{ConnectionCache, ReusePolicy};
use crate::cups_client::{CupsBackend, SecretProvider};
use crate::dispatch::dispatch;
use crate::printers::list_printers;
use crate::render::{LabelRenderer, NoRenderer, materialise};
use crate::status::StatusTracker;

/// One "print label" call from the host.
#[derive(Debug, Clone)]
pub struct LabelRequest {
    /// Target queue; `None` falls back to the configured PRINTER.
    pub printer: Option<String>,
    /// Base of the job titles, usually the label's file name.
    pub filename: String,
    pub options: PrintOptions,
    pub source: LabelSource,
}

/// CUPS label printing driver.
pub struct LabelDriver {
    settings: Arc<dyn SettingsSource>,
    cache: ConnectionCache,
    status: StatusTracker,
    renderer: Arc<dyn LabelRenderer>,
}

impl LabelDriver {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        backend: Arc<dyn CupsBackend>,
        policy: ReusePolicy,
    ) -> Self {
        Self {
            settings,
            cache: ConnectionCache::new(backend, policy),
            status: StatusTracker::new(),
            renderer: Arc::new(NoRenderer),
        }
    }

    /// Use `renderer` for template-based labels.
    pub fn with_renderer(mut self, renderer: Arc<dyn LabelRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// The settings schema to register with the host.
    pub fn settings_schema(&self) -> Vec<SettingDefinition> {
        setting_definitions()
    }

    /// Printer queues offered for the PRINTER setting. Never fails; see
    /// [`list_printers`].
    pub async fn printer_choices(&self) -> Vec<PrinterChoice> {
        let settings = match ConnectionSettings::from_source(self.settings.as_ref()) {
            Ok(settings) => settings,
            Err(e) => {
                debug!(error = %e, "settings unusable, cannot enumerate printers");
                return vec![PrinterChoice::scan_error()];
            }
        };
        list_printers(&self.cache, &settings, self.secret_provider()).await
    }

    /// Dynamic choices for a setting, if it has any.
    pub async fn setting_choices(&self, key: SettingKey) -> Option<Vec<PrinterChoice>> {
        match key {
            SettingKey::Printer => Some(self.printer_choices().await),
            _ => None,
        }
    }

    /// Print one label, `request.options.copies` times.
    pub async fn print_label(&self, request: LabelRequest) -> Result<DispatchReceipt> {
        let dispatch_id = DispatchId::new();
        let span = info_span!(
            "print_label",
            %dispatch_id,
            filename = %request.filename,
            copies = request.options.copies
        );
        self.print_label_inner(request, dispatch_id)
            .instrument(span)
            .await
    }

    /// Render each item with `template` and print it. Stops at the first
    /// failure; labels printed before it stay printed.
    pub async fn print_labels(
        &self,
        printer: Option<String>,
        template: &str,
        items: &[LabelItem],
        options: PrintOptions,
    ) -> Result<Vec<DispatchReceipt>> {
        let mut receipts = Vec::with_capacity(items.len());
        for item in items {
            let receipt = self
                .print_label(LabelRequest {
                    printer: printer.clone(),
                    filename: item.reference.clone(),
                    options,
                    source: LabelSource::Template {
                        template: template.to_string(),
                        item: item.clone(),
                    },
                })
                .await?;
            receipts.push(receipt);
        }
        Ok(receipts)
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn status_message(&self) -> Option<String> {
        self.status.status_message()
    }

    async fn print_label_inner(
        &self,
        request: LabelRequest,
        dispatch_id: DispatchId,
    ) -> Result<DispatchReceipt> {
        let printer = self.resolve_printer(request.printer.as_deref())?;
        let settings = ConnectionSettings::from_source(self.settings.as_ref())?;

        self.status.begin_attempt();
        let connection = match self.cache.acquire(&settings, self.secret_provider()).await {
            Ok(connection) => connection,
            Err(e) => {
                self.status.record_failure(&e.to_string());
                return Err(CupsLabelError::Connect {
                    server: settings.address(),
                    reason: e.to_string(),
                });
            }
        };
        self.status.record_ready();

        let document = materialise(self.renderer.as_ref(), request.source)?;
        let job = PrintJob {
            document,
            printer,
            filename: request.filename,
            copies: request.options.copies,
        };

        match dispatch(connection.as_ref(), &job, dispatch_id).await {
            Ok(receipt) => {
                self.status.record_ready();
                info!(printer = %receipt.printer, copies = receipt.copies_submitted, "label printed");
                Ok(receipt)
            }
            Err(e) => {
                if e.is_device_failure() {
                    self.status.record_failure(&e.to_string());
                    self.cache.invalidate().await;
                }
                Err(e)
            }
        }
    }

    fn resolve_printer(&self, requested: Option<&str>) -> Result<String> {
        requested
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.settings
                    .get(SettingKey::Printer)
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
            })
            .ok_or(CupsLabelError::NoPrinterSelected)
    }

    /// Reads PASSWORD from the host only when the server asks for it.
    fn secret_provider(&self) -> Arc<dyn SecretProvider> {
        let source = Arc::clone(&self.settings);
        Arc::new(move || source.get(SettingKey::Password).filter(|p| !p.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cupslabel_core::settings::MapSettings;
    use cupslabel_core::types::DeviceStatus;

    use crate::mock::MockBackend;

    const PDF: &[u8] = b"%PDF-1.7 label";

    fn settings() -> MapSettings {
        MapSettings::new()
            .with(SettingKey::Server, "cups.local")
            .with(SettingKey::Port, "631")
            .with(SettingKey::User, "labels")
            .with(SettingKey::Printer, "zebra")
    }

    fn driver(settings: MapSettings, backend: &MockBackend) -> LabelDriver {
        LabelDriver::new(
            Arc::new(settings),
            Arc::new(backend.clone()),
            ReusePolicy::default(),
        )
    }

    fn request(copies: u32) -> LabelRequest {
        LabelRequest {
            printer: None,
            filename: "part-42".into(),
            options: PrintOptions { copies },
            source: LabelSource::Rendered(PDF.to_vec()),
        }
    }

    #[tokio::test]
    async fn prints_to_configured_printer() {
        let backend = MockBackend::new();
        let driver = driver(settings(), &backend);

        let receipt = driver.print_label(request(3)).await.unwrap();

        assert_eq!(receipt.printer, "zebra");
        assert_eq!(receipt.copies_submitted, 3);
        let titles: Vec<_> = backend.submissions().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, ["part-42-0", "part-42-1", "part-42-2"]);
        assert_eq!(driver.status().status, DeviceStatus::Ready);
    }

    #[tokio::test]
    async fn request_printer_overrides_setting() {
        let backend = MockBackend::new();
        let driver = driver(settings(), &backend);

        let mut req = request(1);
        req.printer = Some("brother".into());
        driver.print_label(req).await.unwrap();

        assert_eq!(backend.submissions()[0].printer, "brother");
    }

    #[tokio::test]
    async fn missing_printer_rejected_before_connecting() {
        let backend = MockBackend::new();
        let driver = driver(settings().with(SettingKey::Printer, ""), &backend);

        let err = driver.print_label(request(1)).await.unwrap_err();
        assert!(matches!(err, CupsLabelError::NoPrinterSelected));
        assert_eq!(backend.connect_count(), 0);
    }

    #[tokio::test]
    async fn connect_failure_disconnects_and_submits_nothing() {
        let backend = MockBackend::new();
        backend.fail_connects(1);
        let driver = driver(settings(), &backend);

        let err = driver.print_label(request(2)).await.unwrap_err();

        assert!(matches!(err, CupsLabelError::Connect { ref server, .. } if server == "cups.local:631"));
        assert_eq!(backend.submission_attempts(), 0);
        assert_eq!(driver.status().status, DeviceStatus::Disconnected);
        assert!(driver.status_message().is_some());
    }

    #[tokio::test]
    async fn recovers_on_next_attempt() {
        let backend = MockBackend::new();
        backend.fail_connects(1);
        let driver = driver(settings(), &backend);

        assert!(driver.print_label(request(1)).await.is_err());
        driver.print_label(request(1)).await.unwrap();

        assert_eq!(driver.status().status, DeviceStatus::Ready);
        assert_eq!(backend.connect_count(), 2);
    }

    #[tokio::test]
    async fn rejected_request_leaves_disconnected_status() {
        let backend = MockBackend::new();
        backend.fail_connects(1);
        let driver = driver(settings().with(SettingKey::Printer, ""), &backend);

        let mut req = request(1);
        req.printer = Some("zebra".into());
        assert!(driver.print_label(req).await.is_err());
        assert_eq!(driver.status().status, DeviceStatus::Disconnected);

        // No printer resolves, so nothing is attempted and nothing recovers.
        let err = driver.print_label(request(1)).await.unwrap_err();
        assert!(matches!(err, CupsLabelError::NoPrinterSelected));
        assert_eq!(driver.status().status, DeviceStatus::Disconnected);
        assert_eq!(backend.connect_count(), 1);
    }

    #[tokio::test]
    async fn submit_failure_invalidates_connection() {
        let backend = MockBackend::new();
        backend.fail_submission(1);
        let driver = driver(settings(), &backend);

        let err = driver.print_label(request(3)).await.unwrap_err();
        assert!(matches!(err, CupsLabelError::Submit { copy: 1, submitted: 1, .. }));
        assert_eq!(driver.status().status, DeviceStatus::Disconnected);
        assert_eq!(backend.submission_attempts(), 2);

        // The cached connection was dropped, so the next print reconnects.
        driver.print_label(request(1)).await.unwrap();
        assert_eq!(backend.connect_count(), 2);
    }

    #[tokio::test]
    async fn temp_files_removed_on_both_outcomes() {
        let backend = MockBackend::new();
        let driver = driver(settings(), &backend);
        driver.print_label(request(1)).await.unwrap();

        backend.fail_submission(2);
        assert!(driver.print_label(request(2)).await.is_err());

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 2);
        for submission in submissions {
            assert!(submission.file_existed);
            assert!(!submission.path.exists());
        }
    }

    #[tokio::test]
    async fn connection_reused_across_prints() {
        let backend = MockBackend::new();
        let driver = driver(settings(), &backend);

        driver.print_label(request(1)).await.unwrap();
        driver.print_label(request(1)).await.unwrap();
        assert_eq!(backend.connect_count(), 1);
    }

    #[tokio::test]
    async fn password_only_read_when_challenged() {
        let backend = MockBackend::new();
        let driver = driver(settings().with(SettingKey::Password, "hunter2"), &backend);

        driver.print_label(request(1)).await.unwrap();
        assert_eq!(backend.secret_requests(), 0);

        backend.require_password("hunter2");
        driver.print_label(request(1)).await.unwrap();
        assert_eq!(backend.secret_requests(), 1);
    }

    #[tokio::test]
    async fn wrong_password_fails_enumeration_with_sentinel() {
        let backend = MockBackend::new();
        backend.require_password("hunter2");
        let driver = driver(settings().with(SettingKey::Password, "wrong"), &backend);

        assert_eq!(driver.printer_choices().await, vec![PrinterChoice::scan_error()]);
    }

    #[tokio::test]
    async fn invalid_port_yields_sentinel_choices() {
        let backend = MockBackend::new();
        let driver = driver(settings().with(SettingKey::Port, "not-a-port"), &backend);

        assert_eq!(driver.printer_choices().await, vec![PrinterChoice::scan_error()]);
        assert_eq!(backend.connect_count(), 0);
    }

    #[tokio::test]
    async fn only_printer_setting_has_choices() {
        let backend = MockBackend::new().with_printers(vec![PrinterChoice::new("zebra", None)]);
        let driver = driver(settings(), &backend);

        assert_eq!(
            driver.setting_choices(SettingKey::Printer).await,
            Some(vec![PrinterChoice::new("zebra", None)])
        );
        assert_eq!(driver.setting_choices(SettingKey::Server).await, None);
        assert_eq!(driver.settings_schema().len(), SettingKey::ALL.len());
    }

    #[tokio::test]
    async fn render_failure_is_not_a_device_failure() {
        let backend = MockBackend::new();
        let driver = driver(settings(), &backend);

        let mut req = request(1);
        req.source = LabelSource::Template {
            template: "small".into(),
            item: LabelItem {
                reference: "stock-17".into(),
                fields: Default::default(),
            },
        };
        let err = driver.print_label(req).await.unwrap_err();

        assert!(matches!(err, CupsLabelError::Render(_)));
        assert_eq!(driver.status().status, DeviceStatus::Ready);
        assert_eq!(backend.submission_attempts(), 0);
    }

    #[tokio::test]
    async fn print_labels_stops_at_first_failure() {
        let backend = MockBackend::new();
        let renderer = |_: &str, item: &LabelItem| -> Result<Vec<u8>> {
            if item.reference == "bad" {
                Err(CupsLabelError::Render("missing field".into()))
            } else {
                Ok(format!("%PDF {}", item.reference).into_bytes())
            }
        };
        let driver = driver(settings(), &backend).with_renderer(Arc::new(renderer));

        let items: Vec<_> = ["a", "bad", "c"]
            .into_iter()
            .map(|r| LabelItem {
                reference: r.into(),
                fields: Default::default(),
            })
            .collect();
        let err = driver
            .print_labels(None, "small", &items, PrintOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CupsLabelError::Render(_)));
        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].title, "a-0");
        assert_eq!(submissions[0].contents, b"%PDF a");
    }
}
