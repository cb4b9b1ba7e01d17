//! Caching worker in front of the site, served as a local proxy.
//!
//! `cargo run --example offline_proxy -- tests/voidline.yml`
//!
//! Requests sent with `Sec-Fetch-Mode: navigate` go network-first, the rest
//! stale-while-revalidate. Stop the origin and cached pages keep loading.
use std::sync::Arc;

use voidline::{
    cache::InMemoryCacheStorage,
    settings::Settings,
    tracing, tracing_subscriber,
    worker::{server, HttpNetwork, ServiceWorker},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/voidline.yml".to_string());
    let settings = Settings::from_file(&path)?;

    let network = HttpNetwork::from_params(&settings.http()?)?;
    let worker = Arc::new(ServiceWorker::new(
        settings.worker()?,
        Arc::new(InMemoryCacheStorage::new()),
        Arc::new(network),
    ));

    let (installed, activated) = worker.start().await?;
    tracing::info!(
        cache = %worker.cache_name(),
        cached = installed.cached.len(),
        failed = installed.failed.len(),
        active = activated.is_some(),
        "worker started"
    );

    let addr = settings.bind_addr("worker", "127.0.0.1:8081")?;
    server::bind_and_serve(addr, worker)
        .await
        .map_err(anyhow::Error::msg)
}
