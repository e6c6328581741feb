// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use cupslabel_core::config::AppConfig;
use cupslabel_core::error::{CupsLabelError, Result};
use cupslabel_core::settings::{SettingKey, SettingsSource, setting_definitions};
use cupslabel_core::types::{LabelSource, PrintOptions};
use cupslabel_print::{IppCupsBackend, LabelDriver, LabelRequest, ReusePolicy};

use crate::services::config_store::ConfigStore;
use crate::services::relay::{self, RelayState};

/// Driver backed by the real IPP client, configured from `config`.
fn build_driver(config: AppConfig) -> (LabelDriver, Arc<dyn SettingsSource>) {
    let backend = IppCupsBackend::new(Duration::from_secs(config.request_timeout_secs.max(1)));
    let policy = ReusePolicy::from_secs(config.connection_reuse_secs);
    let settings: Arc<dyn SettingsSource> = Arc::new(config);
    let driver = LabelDriver::new(Arc::clone(&settings), Arc::new(backend), policy);
    (driver, settings)
}

pub async fn printers(store: &ConfigStore) -> Result<()> {
    let (driver, _) = build_driver(store.load_effective()?);
    for choice in driver.printer_choices().await {
        if choice.is_scan_error() {
            println!("{}", choice.display_name);
        } else {
            println!("{}\t{}", choice.id, choice.display_name);
        }
    }
    Ok(())
}

pub async fn print(
    store: &ConfigStore,
    file: &Path,
    printer: Option<String>,
    copies: i64,
    title: Option<String>,
) -> Result<()> {
    let options = PrintOptions::with_copies(copies)?;
    let document = std::fs::read(file)?;
    let filename = title.unwrap_or_else(|| default_title(file));

    let (driver, _) = build_driver(store.load_effective()?);
    let receipt = driver
        .print_label(LabelRequest {
            printer,
            filename,
            options,
            source: LabelSource::Rendered(document),
        })
        .await?;

    println!(
        "Sent {} cop{} to {} (jobs: {})",
        receipt.copies_submitted,
        if receipt.copies_submitted == 1 { "y" } else { "ies" },
        receipt.printer,
        receipt
            .remote_job_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

pub fn show_settings(store: &ConfigStore) -> Result<()> {
    let config = store.load_effective()?;
    println!("# {}", store.path().display());
    for def in setting_definitions() {
        let raw = config.get(def.key).unwrap_or_default();
        println!("{:<9} {:<24} {}", def.key.as_str(), def.display_value(&raw), def.description);
    }
    Ok(())
}

pub fn set_setting(store: &ConfigStore, key: &str, value: &str) -> Result<()> {
    let key = SettingKey::parse(key).ok_or_else(|| CupsLabelError::InvalidSetting {
        key: key.to_string(),
        reason: "unknown setting".into(),
    })?;
    store.set(key, value)?;
    info!(%key, path = %store.path().display(), "setting stored");
    Ok(())
}

pub async fn serve(store: &ConfigStore, listen: Option<String>) -> Result<()> {
    let config = store.load_effective()?;
    let listen_addr = listen.unwrap_or_else(|| config.listen_addr.clone());
    let (driver, settings) = build_driver(config);
    relay::serve(Arc::new(RelayState { driver, settings }), &listen_addr).await
}

/// `labels/part-42.pdf` → `part-42`.
fn default_title(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "label".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_defaults_to_file_stem() {
        assert_eq!(default_title(Path::new("labels/part-42.pdf")), "part-42");
        assert_eq!(default_title(Path::new("/")), "label");
    }

    #[test]
    fn unknown_setting_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        let err = set_setting(&store, "COLOUR", "blue").unwrap_err();
        assert!(matches!(err, CupsLabelError::InvalidSetting { .. }));
        assert!(!store.path().exists());
    }

    #[test]
    fn set_accepts_any_key_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        set_setting(&store, "printer", "zebra").unwrap();
        assert_eq!(store.load().unwrap().printer, "zebra");
    }
}
