//! HTTP client construction shared by the caching worker.
//!
//! # Example
//! ```no_run
//! use voidline_config::http::{HttpClientParams, build_http_client};
//!
//! let config: serde_yaml::Value = serde_yaml::from_str(r#"
//! http:
//!     timeout: 30
//!     connect_timeout: 10
//!     user_agent: voidline/0.1
//! "#).unwrap();
//!
//! let params = HttpClientParams::from_config(&config["http"]).unwrap();
//! let client = build_http_client(&params).unwrap();
//! ```
use std::time::Duration;

use crate::config::{opt_str, opt_u64, ConfigError};

pub const DEFAULT_USER_AGENT: &str = concat!("voidline/", env!("CARGO_PKG_VERSION"));

/// Parameters for configuring an HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientParams {
    pub timeout: u64,
    pub connect_timeout: u64,
    pub user_agent: String,
}

impl Default for HttpClientParams {
    fn default() -> Self {
        Self {
            timeout: 30,
            connect_timeout: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientParams {
    /// Creates params from the `http` section of the YAML config.
    ///
    /// ```yaml
    /// http:
    ///     timeout: 30
    ///     connect_timeout: 10
    ///     user_agent: voidline/0.1
    /// ```
    ///
    /// Every field is optional and falls back to [`HttpClientParams::default`].
    /// A missing section yields the defaults as well.
    pub fn from_config(http_config: &serde_yaml::Value) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            timeout: opt_u64(http_config, "timeout")?.unwrap_or(defaults.timeout),
            connect_timeout: opt_u64(http_config, "connect_timeout")?
                .unwrap_or(defaults.connect_timeout),
            user_agent: opt_str(http_config, "user_agent")
                .map(str::to_string)
                .unwrap_or(defaults.user_agent),
        })
    }
}

/// Builds a reqwest client with rustls, timeouts and the user agent applied.
/// Requests made with it are attempted exactly once.
pub fn build_http_client(
    params: &HttpClientParams,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(Duration::from_secs(params.timeout))
        .connect_timeout(Duration::from_secs(params.connect_timeout))
        .user_agent(params.user_agent.as_str())
        .build()
}
