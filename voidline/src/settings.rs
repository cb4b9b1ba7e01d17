//! Typed view over the YAML config file.
use std::{net::SocketAddr, path::Path};

use voidline_config::{
    config::{opt_str, ConfigError},
    http::HttpClientParams,
    Configurable,
};

use crate::{backdrop::BackdropOptions, relay::RelayOptions, worker::WorkerConfig};

#[derive(Debug, Clone)]
pub struct Settings {
    config: serde_yaml::Value,
}

impl Configurable for Settings {
    fn config(&self) -> &serde_yaml::Value {
        &self.config
    }
}

impl Settings {
    pub fn new(config: serde_yaml::Value) -> Self {
        Self { config }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(Self::load_config(path)?))
    }

    fn section(&self, name: &str) -> &serde_yaml::Value {
        &self.config[name]
    }

    pub fn http(&self) -> Result<HttpClientParams, ConfigError> {
        HttpClientParams::from_config(self.section("http"))
    }

    pub fn relay(&self) -> Result<RelayOptions, ConfigError> {
        RelayOptions::from_config(self.section("relay"))
    }

    /// Worker config; `worker.assets_file` (one asset per line) overrides
    /// the inline `worker.assets` list.
    pub fn worker(&self) -> Result<WorkerConfig, ConfigError> {
        let section = self.section("worker");
        let mut config = WorkerConfig::from_config(section)?;
        if let Some(path) = opt_str(section, "assets_file") {
            config.assets = Self::load_text_file_lines(path)?;
        }
        Ok(config)
    }

    pub fn backdrop(&self) -> Result<BackdropOptions, ConfigError> {
        BackdropOptions::from_config(self.section("backdrop"))
    }

    /// Listen address for a component section (`relay.bind`, `worker.bind`).
    pub fn bind_addr(&self, component: &str, default: &str) -> Result<SocketAddr, ConfigError> {
        let field = format!("{component}.bind");
        let raw = self
            .get_config_value(&field)
            .and_then(|v| v.as_str())
            .unwrap_or(default);
        raw.parse().map_err(|e| ConfigError::invalid(&field, e))
    }

    /// Sheets to seed: `relay.sheets` maps sheet name to its header row.
    pub fn relay_sheets(&self) -> Result<Vec<(String, Vec<String>)>, ConfigError> {
        let Some(sheets) = self.get_config_value("relay.sheets") else {
            return Ok(Vec::new());
        };
        let map = sheets
            .as_mapping()
            .ok_or_else(|| ConfigError::invalid("relay.sheets", "expected a mapping"))?;
        map.iter()
            .map(|(name, headers)| {
                let name = name
                    .as_str()
                    .ok_or_else(|| ConfigError::invalid("relay.sheets", "sheet names must be strings"))?;
                let headers = headers
                    .as_sequence()
                    .ok_or_else(|| ConfigError::invalid("relay.sheets", "headers must be a list"))?
                    .iter()
                    .map(|h| match h {
                        serde_yaml::Value::String(s) => s.clone(),
                        other => serde_yaml::to_string(other)
                            .map(|s| s.trim().to_string())
                            .unwrap_or_default(),
                    })
                    .collect();
                Ok((name.to_string(), headers))
            })
            .collect()
    }
}
