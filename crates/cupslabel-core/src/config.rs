// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::ffi::OsString;

use serde::{Deserialize, Serialize};

use crate::error::{CupsLabelError, Result};
use crate::settings::{
    DEFAULT_PORT, DEFAULT_SERVER, SettingKey, SettingsSource, parse_port, setting_definition,
};

/// Prefix of environment variables that override stored settings.
pub const ENV_PREFIX: &str = "CUPSLABEL_";

/// Persistent relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// CUPS server host or IP.
    pub server: String,
    /// CUPS server port (default 631).
    pub port: u16,
    /// User presented to the CUPS server.
    pub user: String,
    /// Password, handed to the client only when the server asks for it.
    pub password: String,
    /// Default printer queue.
    pub printer: String,
    /// How long a connection is reused, in seconds. `0` reconnects on every call.
    pub connection_reuse_secs: u64,
    /// Upper bound on connect probes and IPP requests, in seconds.
    pub request_timeout_secs: u64,
    /// Listen address of the HTTP relay.
    pub listen_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.into(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            printer: String::new(),
            connection_reuse_secs: 60,
            request_timeout_secs: 30,
            listen_addr: "127.0.0.1:8631".into(),
        }
    }
}

impl AppConfig {
    /// Validate and store one host setting.
    pub fn set(&mut self, key: SettingKey, value: &str) -> Result<()> {
        setting_definition(key).validate(value)?;
        match key {
            SettingKey::Server => self.server = value.trim().to_string(),
            SettingKey::Port => self.port = parse_port(value)?,
            SettingKey::User => self.user = value.to_string(),
            SettingKey::Password => self.password = value.to_string(),
            SettingKey::Printer => self.printer = value.trim().to_string(),
        }
        Ok(())
    }

    /// Apply `CUPSLABEL_<KEY>` overrides from the given variables.
    ///
    /// Unknown variables are ignored. An invalid value is an error rather than
    /// a silent fallback.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let Some(key) = name
                .as_ref()
                .strip_prefix(ENV_PREFIX)
                .and_then(SettingKey::parse)
            else {
                continue;
            };
            self.set(key, value.as_ref())?;
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_os_overrides(std::env::vars_os())
    }

    /// Like [`apply_overrides`](Self::apply_overrides), for raw OS strings.
    ///
    /// Variables whose name is not UTF-8 cannot be ours and are skipped. A
    /// `CUPSLABEL_*` variable whose value is not UTF-8 is an invalid setting.
    pub fn apply_os_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        for (name, value) in vars {
            let Ok(name) = name.into_string() else {
                continue;
            };
            let Some(key) = name.strip_prefix(ENV_PREFIX).and_then(SettingKey::parse) else {
                continue;
            };
            let value = value.into_string().map_err(|_| CupsLabelError::InvalidSetting {
                key: key.to_string(),
                reason: format!("{name} is not valid UTF-8"),
            })?;
            self.set(key, &value)?;
        }
        Ok(())
    }
}

impl SettingsSource for AppConfig {
    fn get(&self, key: SettingKey) -> Option<String> {
        Some(match key {
            SettingKey::Server => self.server.clone(),
            SettingKey::Port => self.port.to_string(),
            SettingKey::User => self.user.clone(),
            SettingKey::Password => self.password.clone(),
            SettingKey::Printer => self.printer.clone(),
        })
    }
}
