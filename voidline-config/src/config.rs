use std::{
    fs,
    io::{self, BufRead},
    path,
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
    #[error("Line parsing error: {0}")]
    LineParse(String),
    #[error("Invalid config field {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub trait Configurable {
    fn config(&self) -> &serde_yaml::Value;

    // read configuration from yaml config
    fn load_config(
        config_file_path: impl AsRef<path::Path>,
    ) -> Result<serde_yaml::Value, ConfigError> {
        let content: String = fs::read_to_string(config_file_path)?;
        let config: serde_yaml::Value = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load Vec<String> from file with path `file path`, skipping blank lines
    /// and `#` comments. Used for asset manifests kept next to the config.
    fn load_text_file_lines(
        file_path: impl AsRef<path::Path>,
    ) -> Result<Vec<String>, ConfigError> {
        let file = fs::File::open(file_path)?;
        let lines = io::BufReader::new(file)
            .lines()
            .map(|l| l.map_err(|e| ConfigError::LineParse(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect())
    }

    /// Extract Value from config using dot notation i.e. "relay.lock_timeout"
    fn get_config_value(&self, key: &str) -> Option<&serde_yaml::Value> {
        let keys: Vec<&str> = key.split('.').collect();
        get_value_recursive(self.config(), &keys)
    }
}

fn get_value_recursive<'a>(
    config: &'a serde_yaml::Value,
    keys: &[&str],
) -> Option<&'a serde_yaml::Value> {
    if keys.is_empty() || keys[0].is_empty() {
        return None;
    };

    match config {
        serde_yaml::Value::Mapping(map) => {
            let value = map.get(serde_yaml::Value::String(keys[0].to_string()))?;
            let remaining_keys = &keys[1..];
            if remaining_keys.is_empty() {
                Some(value)
            } else {
                get_value_recursive(value, remaining_keys)
            }
        }
        _ => None,
    }
}

/// Optional string field of a config section.
pub fn opt_str<'a>(section: &'a serde_yaml::Value, field: &str) -> Option<&'a str> {
    section.get(field).and_then(|v| v.as_str())
}

/// Optional unsigned field; present-but-wrong-type is an error.
pub fn opt_u64(
    section: &serde_yaml::Value,
    field: &str,
) -> Result<Option<u64>, ConfigError> {
    match section.get(field) {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(field, "expected unsigned integer")),
    }
}

/// Optional float field, integers accepted.
pub fn opt_f64(
    section: &serde_yaml::Value,
    field: &str,
) -> Result<Option<f64>, ConfigError> {
    match section.get(field) {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(field, "expected number")),
    }
}

/// Optional list of strings.
pub fn opt_str_list(
    section: &serde_yaml::Value,
    field: &str,
) -> Result<Option<Vec<String>>, ConfigError> {
    match section.get(field) {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::invalid(field, "expected strings"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(ConfigError::invalid(field, "expected a list")),
    }
}
