use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Request method {0} cannot be cached")]
    UnsupportedMethod(String),

    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}
