use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use super::RelayError;

/// Workbook-wide mutual exclusion with a bounded wait. One lock covers every
/// sheet. Dropping the guard releases it, so every exit path unlocks.
#[derive(Debug, Clone)]
pub struct WorkbookLock {
    inner: Arc<Mutex<()>>,
    timeout: Duration,
}

pub type WorkbookGuard = OwnedMutexGuard<()>;

impl WorkbookLock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(())),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn acquire(&self) -> Result<WorkbookGuard, RelayError> {
        let guard = tokio::time::timeout(self.timeout, self.inner.clone().lock_owned())
            .await
            .map_err(|_| RelayError::LockTimeout(self.timeout))?;
        trace!("workbook lock acquired");
        Ok(guard)
    }
}
