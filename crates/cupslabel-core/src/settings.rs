// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host-facing settings: the keys a host stores, how they are described and
// validated, and the connection settings derived from them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CupsLabelError, Result};

/// Default CUPS/IPP port.
pub const DEFAULT_PORT: u16 = 631;

/// Default CUPS server host.
pub const DEFAULT_SERVER: &str = "localhost";

/// Keys of the settings a host keeps for this driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingKey {
    Server,
    Port,
    User,
    Password,
    Printer,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::Server,
        SettingKey::Port,
        SettingKey::User,
        SettingKey::Password,
        SettingKey::Printer,
    ];

    /// Upper-case key name as stored by the host.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "SERVER",
            Self::Port => "PORT",
            Self::User => "USER",
            Self::Password => "PASSWORD",
            Self::Printer => "PRINTER",
        }
    }

    /// Parse a key name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read access to the host's stored settings.
///
/// Values are read on every call, so a host that changes a setting at runtime
/// is picked up by the next print or enumeration.
pub trait SettingsSource: Send + Sync {
    /// Raw stored value, or `None` if the host has no value for `key`.
    fn get(&self, key: SettingKey) -> Option<String>;
}

/// In-memory settings, used by embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<SettingKey, String>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: SettingKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }
}

impl SettingsSource for MapSettings {
    fn get(&self, key: SettingKey) -> Option<String> {
        self.values.get(&key).cloned()
    }
}

/// Everything needed to reach a CUPS server.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.into(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
        }
    }
}

// The password never appears in logs.
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

impl ConnectionSettings {
    /// Resolve connection settings from a host source, applying defaults for
    /// missing or blank values.
    pub fn from_source(source: &dyn SettingsSource) -> Result<Self> {
        let server = non_blank(source.get(SettingKey::Server))
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let port = match non_blank(source.get(SettingKey::Port)) {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            server,
            port,
            user: source.get(SettingKey::User).unwrap_or_default(),
            password: source.get(SettingKey::Password).unwrap_or_default(),
        })
    }

    /// `host:port` for log lines and error messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Deterministic digest of all four fields.
    ///
    /// Fields are length-prefixed before hashing so that no two distinct
    /// settings can collide by shifting characters between fields.
    pub fn fingerprint(&self) -> String {
        let port = self.port.to_be_bytes();
        let mut hasher = Sha256::new();
        for field in [
            self.server.as_bytes(),
            &port[..],
            self.user.as_bytes(),
            self.password.as_bytes(),
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        hex::encode(hasher.finalize())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err(CupsLabelError::InvalidSetting {
            key: SettingKey::Port.to_string(),
            reason: "port must be between 1 and 65535".into(),
        }),
        Ok(port) => Ok(port),
        Err(e) => Err(CupsLabelError::InvalidSetting {
            key: SettingKey::Port.to_string(),
            reason: format!("'{raw}' is not a valid port: {e}"),
        }),
    }
}

/// How a setting is entered and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    Text,
    /// Validated as a TCP port.
    Integer,
    /// Masked on display.
    Secret,
    /// Values offered at runtime by the driver's choices provider.
    Choice,
}

/// Host-facing description of one setting.
#[derive(Debug, Clone, Serialize)]
pub struct SettingDefinition {
    pub key: SettingKey,
    pub name: &'static str,
    pub description: &'static str,
    pub default: &'static str,
    pub kind: SettingKind,
}

impl SettingDefinition {
    /// Check a candidate value before the host stores it.
    pub fn validate(&self, raw: &str) -> Result<()> {
        match self.kind {
            SettingKind::Integer => parse_port(raw).map(|_| ()),
            SettingKind::Text if self.key == SettingKey::Server && raw.trim().is_empty() => {
                Err(CupsLabelError::InvalidSetting {
                    key: self.key.to_string(),
                    reason: "server must not be empty".into(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Value as it may be shown to a user.
    pub fn display_value(&self, raw: &str) -> String {
        match self.kind {
            SettingKind::Secret if !raw.is_empty() => "********".into(),
            _ => raw.to_string(),
        }
    }
}

/// The settings schema a host registers for this driver.
pub fn setting_definitions() -> Vec<SettingDefinition> {
    vec![
        SettingDefinition {
            key: SettingKey::Server,
            name: "Server",
            description: "IP/Hostname to connect to the cups server",
            default: DEFAULT_SERVER,
            kind: SettingKind::Text,
        },
        SettingDefinition {
            key: SettingKey::Port,
            name: "Port",
            description: "Port to connect to the cups server",
            default: "631",
            kind: SettingKind::Integer,
        },
        SettingDefinition {
            key: SettingKey::User,
            name: "User",
            description: "User to connect to the cups server",
            default: "",
            kind: SettingKind::Text,
        },
        SettingDefinition {
            key: SettingKey::Password,
            name: "Password",
            description: "Password to connect to the cups server",
            default: "",
            kind: SettingKind::Secret,
        },
        SettingDefinition {
            key: SettingKey::Printer,
            name: "Printer",
            description: "Printer from cups server",
            default: "",
            kind: SettingKind::Choice,
        },
    ]
}

/// Look up the definition of a single key.
pub fn setting_definition(key: SettingKey) -> SettingDefinition {
    setting_definitions()
        .into_iter()
        .find(|def| def.key == key)
        .unwrap_or_else(|| unreachable!("every SettingKey has a definition"))
}
