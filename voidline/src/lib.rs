//! # voidline
//!
//! Server-side pieces of the "Into the Void" progressive web app.
//!
//! - **Form relay** ([`relay`]): accepts waitlist/feedback form posts and
//!   appends one row per submission to a named sheet, serialized by a single
//!   workbook lock with a bounded wait.
//! - **Caching worker** ([`worker`]): install/activate/fetch lifecycle over one
//!   versioned cache bucket, network-first for page loads and
//!   stale-while-revalidate for everything else. [`worker::server`] exposes it
//!   as an offline proxy.
//! - **Backdrop** ([`backdrop`]): shuffle and crossfade timing for the
//!   background slideshow, with explicit pause/resume.
//!
//! Configuration is YAML, read through [`config::Configurable`]; see
//! [`settings::Settings`].
pub mod backdrop;
pub mod http;
pub mod relay;
pub mod settings;
pub mod worker;

pub use voidline_cache as cache;
pub use voidline_config as config;

// re-export
pub use async_trait;
pub use reqwest;
pub use serde_yaml;
pub use tracing;
pub use tracing_subscriber;
pub use url;
