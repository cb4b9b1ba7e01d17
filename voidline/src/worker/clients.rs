use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::debug;
use url::Url;

/// Identifier of an open client page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub url: Url,
    /// Cache name of the worker controlling this page, if any
    pub controller: Option<String>,
}

/// Open pages within the worker scope.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened page, uncontrolled until a worker claims it.
    pub fn open(&self, url: Url) -> ClientId {
        let id = ClientId::new();
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(
                id,
                Client {
                    id,
                    url,
                    controller: None,
                },
            );
        }
        id
    }

    pub fn close(&self, id: ClientId) -> bool {
        self.clients
            .write()
            .map(|mut clients| clients.remove(&id).is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, id: ClientId) -> Option<Client> {
        self.clients.read().ok()?.get(&id).cloned()
    }

    pub fn controller(&self, id: ClientId) -> Option<String> {
        self.get(id).and_then(|c| c.controller)
    }

    pub fn len(&self) -> usize {
        self.clients.read().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make `controller` control every open page without a reload.
    /// Returns how many pages changed controller.
    pub fn claim(&self, controller: &str) -> usize {
        let Ok(mut clients) = self.clients.write() else {
            return 0;
        };
        let mut changed = 0;
        for client in clients.values_mut() {
            if client.controller.as_deref() != Some(controller) {
                client.controller = Some(controller.to_string());
                changed += 1;
            }
        }
        debug!(controller, changed, total = clients.len(), "claimed clients");
        changed
    }
}
