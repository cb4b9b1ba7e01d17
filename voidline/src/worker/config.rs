use url::Url;
use voidline_config::config::{opt_str, opt_str_list, ConfigError};

pub const DEFAULT_SCOPE: &str = "http://localhost:8000/";
pub const DEFAULT_CACHE_PREFIX: &str = "release-cache";
pub const DEFAULT_VERSION: &str = "v47";

/// Shell, styles, scripts, manifest, remote font sheets and images precached
/// on install. Relative entries resolve against the worker scope.
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "index.html",
    "css/styles.css",
    "js/liquid-bg.js",
    "manifest.json",
    "https://fonts.googleapis.com/css2?family=Outfit:wght@100;300;400;600;900&family=Playfair+Display:ital,wght@0,400;0,600;1,400&family=JetBrains+Mono:wght@100;300;400&display=swap",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css",
    "index/waitlist.webp",
    "index/white.jpeg",
    "index/blue_butterfly.webp",
    "index/1 (1).webp",
    "index/1 (2).webp",
    "index/1 (3).webp",
    "index/1 (4).webp",
    "index/916/white.jpeg",
    "index/916/blue_butterfly.webp",
    "index/916/1 (1).webp",
    "index/916/1 (2).webp",
    "index/916/1 (3).webp",
    "index/916/1 (4).webp",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Origin + base path the worker controls
    pub scope: Url,
    pub cache_prefix: String,
    /// Bumped by the release process whenever assets or caching logic change
    pub version: String,
    pub assets: Vec<String>,
    /// Activate right after install instead of waiting for clients to close
    pub skip_waiting: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scope: Url::parse(DEFAULT_SCOPE).expect("default scope is a valid URL"),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            version: DEFAULT_VERSION.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
            skip_waiting: true,
        }
    }
}

impl WorkerConfig {
    pub fn new(scope: Url, version: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            scope,
            version: version.into(),
            assets,
            ..Self::default()
        }
    }

    /// Name of the single live cache bucket, e.g. `release-cache-v47`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    pub fn resolve(&self, asset: &str) -> Result<Url, url::ParseError> {
        self.scope.join(asset)
    }

    /// Reads the `worker` config section. Every field is optional.
    pub fn from_config(section: &serde_yaml::Value) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let scope = match opt_str(section, "scope") {
            Some(scope) => Url::parse(scope).map_err(|e| ConfigError::invalid("scope", e))?,
            None => defaults.scope,
        };
        let skip_waiting = match section.get("skip_waiting") {
            None => defaults.skip_waiting,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| ConfigError::invalid("skip_waiting", "expected boolean"))?,
        };
        Ok(Self {
            scope,
            cache_prefix: opt_str(section, "cache_prefix")
                .map(str::to_string)
                .unwrap_or(defaults.cache_prefix),
            version: opt_str(section, "version")
                .map(str::to_string)
                .unwrap_or(defaults.version),
            assets: opt_str_list(section, "assets")?.unwrap_or(defaults.assets),
            skip_waiting,
        })
    }
}
