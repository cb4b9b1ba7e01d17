//! Offline caching worker.
//!
//! Lifecycle: `Uninstalled -> Installing -> Installed -> Activating -> Active`.
//! Install precaches the asset manifest into the bucket named after the
//! configured version; activate claims open clients and deletes every other
//! bucket. Once active, fetches are answered network-first for navigations
//! and stale-while-revalidate for everything else.
pub mod clients;
pub mod config;
pub mod network;
pub mod server;

use std::{fmt, sync::Arc};

use futures::future::join_all;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, instrument, warn};
use voidline_cache::{CacheBucket, CacheError, CacheStorage, CachedResponse, RequestKey};

pub use clients::{Client, ClientId, ClientRegistry};
pub use config::WorkerConfig;
pub use network::{HttpNetwork, Network, NetworkError, Request, RequestMode};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Offline and nothing cached for {url}: {source}")]
    Offline {
        url: String,
        #[source]
        source: NetworkError,
    },
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Invalid asset {asset}: {reason}")]
    InvalidAsset { asset: String, reason: String },
    #[error("Worker is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: WorkerState,
        actual: WorkerState,
    },
    #[error("Background fetch aborted: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Uninstalled,
    Installing,
    /// Installed and waiting for activation
    Installed,
    Activating,
    Active,
    /// Install could not open its bucket
    Redundant,
}

/// Per-asset result of an install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// Asset and the reason it was skipped
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    pub claimed: usize,
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
        }
    }
}

/// Background refresh started by a stale-while-revalidate hit.
#[derive(Debug)]
pub struct Revalidation {
    handle: JoinHandle<Result<CachedResponse, NetworkError>>,
}

impl Revalidation {
    /// Wait for the refresh; `true` when the network answered and the
    /// response was handed to the cache.
    pub async fn finished(self) -> bool {
        matches!(self.handle.await, Ok(Ok(_)))
    }
}

/// Answer to one intercepted fetch.
#[derive(Debug)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ResponseSource,
    /// Present when a cached response was served and a refresh is in flight
    pub revalidation: Option<Revalidation>,
}

impl Served {
    fn network(response: CachedResponse) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
            revalidation: None,
        }
    }
}

pub struct ServiceWorker {
    config: WorkerConfig,
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<ClientRegistry>,
    state: watch::Sender<WorkerState>,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            caches,
            network,
            clients: Arc::new(ClientRegistry::new()),
            state: watch::Sender::new(WorkerState::Uninstalled),
        }
    }

    pub fn with_clients(mut self, clients: Arc<ClientRegistry>) -> Self {
        self.clients = clients;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache_name(&self) -> String {
        self.config.cache_name()
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    pub fn caches(&self) -> &Arc<dyn CacheStorage> {
        &self.caches
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WorkerState) {
        debug!(?state, "worker state");
        self.state.send_replace(state);
    }

    /// Install, then activate immediately when `skip_waiting` is set.
    pub async fn start(&self) -> Result<(InstallReport, Option<ActivateReport>), WorkerError> {
        let installed = self.install().await?;
        let activated = if self.config.skip_waiting {
            Some(self.activate().await?)
        } else {
            None
        };
        Ok((installed, activated))
    }

    /// Precache every manifest entry independently. Individual failures are
    /// logged and reported but never fail the install.
    #[instrument(skip(self), fields(cache = %self.cache_name()))]
    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.set_state(WorkerState::Installing);
        let bucket = match self.caches.open(&self.cache_name()).await {
            Ok(bucket) => bucket,
            Err(err) => {
                self.set_state(WorkerState::Redundant);
                return Err(err.into());
            }
        };

        let attempts = self.config.assets.iter().map(|asset| {
            let bucket = bucket.clone();
            async move { (asset.clone(), self.add_asset(bucket.as_ref(), asset).await) }
        });

        let mut report = InstallReport::default();
        for (asset, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.cached.push(asset),
                Err(err) => {
                    warn!(%asset, error = %err, "failed to cache asset");
                    report.failed.push((asset, err.to_string()));
                }
            }
        }

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete"
        );
        self.set_state(WorkerState::Installed);
        Ok(report)
    }

    // Fetch one asset and store it; non-2xx answers are failures here.
    async fn add_asset(&self, bucket: &dyn CacheBucket, asset: &str) -> Result<(), WorkerError> {
        let url = self
            .config
            .resolve(asset)
            .map_err(|e| WorkerError::InvalidAsset {
                asset: asset.to_string(),
                reason: e.to_string(),
            })?;
        let request = Request::get(url);
        let response = self.network.fetch(&request).await?;
        if !response.is_success() {
            return Err(NetworkError::Status {
                url: request.url.to_string(),
                status: response.status,
            }
            .into());
        }
        bucket.put(request.key(), response).await?;
        Ok(())
    }

    /// Claim open clients and delete every bucket but the current one. Once
    /// started, activation always ends in `Active`.
    #[instrument(skip(self), fields(cache = %self.cache_name()))]
    pub async fn activate(&self) -> Result<ActivateReport, WorkerError> {
        let actual = self.state();
        if actual != WorkerState::Installed {
            return Err(WorkerError::InvalidState {
                expected: WorkerState::Installed,
                actual,
            });
        }
        self.set_state(WorkerState::Activating);

        let current = self.cache_name();
        let claimed = self.clients.claim(&current);

        // Cleanup failures are logged; activation itself always completes.
        let names = self.caches.keys().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to list caches, skipping cleanup");
            Vec::new()
        });
        let mut deleted = Vec::new();
        for name in names {
            if name == current {
                continue;
            }
            match self.caches.delete(&name).await {
                Ok(true) => deleted.push(name),
                Ok(false) => {}
                Err(err) => warn!(bucket = %name, error = %err, "failed to delete stale cache"),
            }
        }

        info!(claimed, deleted = deleted.len(), "activated");
        self.set_state(WorkerState::Active);
        Ok(ActivateReport { claimed, deleted })
    }

    /// Answer an intercepted request. Before activation requests go straight
    /// to the network.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn handle_fetch(&self, request: Request) -> Result<Served, WorkerError> {
        if self.state() != WorkerState::Active {
            return Ok(Served::network(self.network.fetch(&request).await?));
        }
        if request.is_navigation() {
            self.network_first(request).await
        } else {
            self.stale_while_revalidate(request).await
        }
    }

    async fn network_first(&self, request: Request) -> Result<Served, WorkerError> {
        let key = request.key();
        match self.network.fetch(&request).await {
            Ok(response) => {
                if key.is_cacheable() {
                    store(self.caches.as_ref(), &self.cache_name(), key, response.clone()).await;
                }
                Ok(Served::network(response))
            }
            Err(err) => {
                debug!(error = %err, "navigation offline, trying cache");
                match self.lookup(&key).await {
                    Some(response) => Ok(Served {
                        response,
                        source: ResponseSource::Cache,
                        revalidation: None,
                    }),
                    None => Err(WorkerError::Offline {
                        url: request.url.to_string(),
                        source: err,
                    }),
                }
            }
        }
    }

    async fn stale_while_revalidate(&self, request: Request) -> Result<Served, WorkerError> {
        let key = request.key();
        if !key.is_cacheable() {
            return Ok(Served::network(self.network.fetch(&request).await?));
        }

        let cached = self.lookup(&key).await;

        // Concurrent refreshes of one URL are not coalesced; last write wins.
        let refresh = {
            let network = self.network.clone();
            let caches = self.caches.clone();
            let cache_name = self.cache_name();
            let key = key.clone();
            tokio::spawn(async move {
                match network.fetch(&request).await {
                    Ok(response) => {
                        store(caches.as_ref(), &cache_name, key, response.clone()).await;
                        Ok(response)
                    }
                    Err(err) => {
                        debug!(error = %err, "revalidation fetch failed");
                        Err(err)
                    }
                }
            })
        };

        match cached {
            Some(response) => Ok(Served {
                response,
                source: ResponseSource::Cache,
                revalidation: Some(Revalidation { handle: refresh }),
            }),
            None => {
                let response = refresh
                    .await
                    .map_err(|e| WorkerError::Task(e.to_string()))?
                    .map_err(|err| WorkerError::Offline {
                        url: key.url.clone(),
                        source: err,
                    })?;
                Ok(Served::network(response))
            }
        }
    }

    // Lookup in the current bucket only; storage errors read as a miss.
    async fn lookup(&self, key: &RequestKey) -> Option<CachedResponse> {
        let name = self.cache_name();
        match self.caches.has(&name).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                warn!(error = %err, "cache lookup failed");
                return None;
            }
        }
        let bucket = self.caches.open(&name).await.ok()?;
        match bucket.match_request(key).await {
            Ok(entry) => entry.map(|e| e.response),
            Err(err) => {
                warn!(error = %err, "cache lookup failed");
                None
            }
        }
    }
}

/// Best-effort write into the named bucket.
async fn store(caches: &dyn CacheStorage, name: &str, key: RequestKey, response: CachedResponse) {
    let result = match caches.open(name).await {
        Ok(bucket) => bucket.put(key.clone(), response).await,
        Err(err) => Err(err),
    };
    if let Err(err) = result {
        warn!(%key, error = %err, "cache write failed");
    }
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("cache", &self.cache_name())
            .field("state", &self.state())
            .field("assets", &self.config.assets.len())
            .finish()
    }
}
