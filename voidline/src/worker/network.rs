use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;
use voidline_cache::{CachedResponse, RequestKey};
use voidline_config::http::{build_http_client, HttpClientParams};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Unsupported request method: {0}")]
    Method(String),
}

/// Whether a request loads a whole page or a sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    Navigate,
    #[default]
    Subresource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: &str, url: Url, mode: RequestMode) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            mode,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Subresource)
    }

    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Build from incoming HTTP request parts. Browsers mark page loads with
    /// `Sec-Fetch-Mode: navigate`.
    pub fn from_http_parts(parts: &hyper::http::request::Parts, url: Url) -> Self {
        let headers: HashMap<String, String> = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let mode = match headers.get("sec-fetch-mode").map(String::as_str) {
            Some("navigate") => RequestMode::Navigate,
            _ => RequestMode::Subresource,
        };
        Self {
            method: parts.method.as_str().to_string(),
            url,
            mode,
            headers,
            body: Vec::new(),
        }
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Something that can perform a live fetch. The worker never retries.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, NetworkError>;
}

// Hop-by-hop and request-specific headers are not forwarded. The client
// negotiates its own `accept-encoding` so every body it returns is decoded.
const SKIPPED_HEADERS: &[&str] = &[
    "host",
    "accept-encoding",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

/// Live network over a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_params(params: &HttpClientParams) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(params)?))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, NetworkError> {
        let transport = |e: reqwest::Error| NetworkError::Transport {
            url: request.url.to_string(),
            reason: e.to_string(),
        };
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetworkError::Method(request.method.clone()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            if !SKIPPED_HEADERS.contains(&name.as_str()) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(transport)?;
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(transport)?;
        debug!(%url, status, bytes = body.len(), "fetched");

        Ok(CachedResponse {
            url,
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_mode_from_headers() {
        let (parts, _) = hyper::Request::builder()
            .method("GET")
            .uri("/index.html")
            .header("Sec-Fetch-Mode", "navigate")
            .body(())
            .unwrap()
            .into_parts();
        let url = Url::parse("http://localhost:8000/index.html").unwrap();
        let request = Request::from_http_parts(&parts, url.clone());
        assert!(request.is_navigation());
        assert_eq!(request.headers.get("sec-fetch-mode").unwrap(), "navigate");

        let (parts, _) = hyper::Request::builder()
            .method("GET")
            .uri("/css/styles.css")
            .header("Sec-Fetch-Mode", "no-cors")
            .body(())
            .unwrap()
            .into_parts();
        assert!(!Request::from_http_parts(&parts, url).is_navigation());
    }

    #[test]
    fn test_request_key() {
        let url = Url::parse("http://localhost:8000/a.js#frag").unwrap();
        let request = Request::new("post", url, RequestMode::Subresource);
        let key = request.key();
        assert_eq!(key.method, "POST");
        assert_eq!(key.url, "http://localhost:8000/a.js");
        assert!(!key.is_cacheable());
    }
}
