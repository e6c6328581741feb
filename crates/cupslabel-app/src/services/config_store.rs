// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Config file persistence.
//
// `config.json` holds the stored settings; `CUPSLABEL_*` environment
// variables override them at load time but are never written back.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use cupslabel_core::config::AppConfig;
use cupslabel_core::error::Result;
use cupslabel_core::settings::SettingKey;

use super::data_dir::data_dir;

const CONFIG_FILE: &str = "config.json";

/// Location of the relay's `config.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/cupslabel/config.json`.
    pub fn default_location() -> Self {
        Self::new(data_dir().join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored settings only. A missing file yields defaults; a file that
    /// exists but does not parse is an error, so a later save cannot
    /// silently discard it.
    pub fn load(&self) -> Result<AppConfig> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file, using defaults");
                return Ok(AppConfig::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&data)?)
    }

    /// Stored settings with environment overrides applied.
    pub fn load_effective(&self) -> Result<AppConfig> {
        let mut config = self.load()?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json)?;
        info!(path = %self.path.display(), "config saved");
        Ok(())
    }

    /// Validate and persist one setting, returning the stored config.
    pub fn set(&self, key: SettingKey, value: &str) -> Result<AppConfig> {
        let mut config = self.load()?;
        config.set(key, value)?;
        self.save(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cupslabel_core::error::CupsLabelError;

    fn store(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("nested").join(CONFIG_FILE))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = store(&dir).load().unwrap();
        assert_eq!(config.port, 631);
        assert_eq!(config.connection_reuse_secs, 60);
    }

    #[test]
    fn set_persists_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store.set(SettingKey::Server, "cups.local").unwrap();
        store.set(SettingKey::Printer, "zebra").unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.server, "cups.local");
        assert_eq!(config.printer, "zebra");
    }

    #[test]
    fn invalid_value_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.set(SettingKey::Port, "8631").unwrap();

        let err = store.set(SettingKey::Port, "seventy").unwrap_err();
        assert!(matches!(err, CupsLabelError::InvalidSetting { .. }));
        assert_eq!(store.load().unwrap().port, 8631);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            CupsLabelError::Serialization(_)
        ));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{ "server": "print.example.org" }"#).unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.server, "print.example.org");
        assert_eq!(config.request_timeout_secs, 30);
    }
}
