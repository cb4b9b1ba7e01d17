//! Form relay: turns a submitted form into one appended sheet row.
//!
//! Every submission runs the same critical section under a single
//! workbook-wide [`WorkbookLock`]: read the header row of the target sheet,
//! build the row column by column, append it. The result is always one of
//! three plain-text outcomes (`Success`, `Sheet not found`,
//! `Error: <details>`); nothing surfaces as a transport failure.
pub mod jsonl;
pub mod lock;
pub mod params;
pub mod server;
pub mod workbook;

use std::{fmt, sync::Arc, time::Duration};

use derive_builder::Builder;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use voidline_config::config::{opt_str, opt_u64, ConfigError};

pub use jsonl::JsonlWorkbook;
pub use lock::{WorkbookGuard, WorkbookLock};
pub use params::FormParams;
pub use workbook::{InMemoryWorkbook, Workbook};

pub const DEFAULT_SHEET: &str = "Waitlist";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
/// Form field selecting the target sheet.
pub const SHEET_PARAM: &str = "sheet";

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Lock timeout: could not acquire workbook lock within {0:?}")]
    LockTimeout(Duration),
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
    #[error("Workbook error: {0}")]
    Workbook(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Plain-text result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Success,
    SheetNotFound,
    Error(String),
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayOutcome::Success => f.write_str("Success"),
            RelayOutcome::SheetNotFound => f.write_str("Sheet not found"),
            RelayOutcome::Error(details) => write!(f, "Error: {details}"),
        }
    }
}

#[derive(Builder, Clone, Debug, PartialEq, Eq)]
#[builder(public, setter(into))]
pub struct RelayOptions {
    /// Sheet used when the submission carries no `sheet` field
    #[builder(default = "DEFAULT_SHEET.to_string()")]
    pub default_sheet: String,
    /// Bounded wait for the workbook lock
    #[builder(default = "DEFAULT_LOCK_TIMEOUT")]
    pub lock_timeout: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            default_sheet: DEFAULT_SHEET.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl RelayOptions {
    /// Reads the `relay` config section; `lock_timeout` is in seconds.
    pub fn from_config(section: &serde_yaml::Value) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            default_sheet: opt_str(section, "default_sheet")
                .map(str::to_string)
                .unwrap_or(defaults.default_sheet),
            lock_timeout: opt_u64(section, "lock_timeout")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.lock_timeout),
        })
    }
}

/// Build the row for a header sequence: each header is trimmed and looked up
/// in `params`; absent or empty fields become empty cells.
pub fn build_row<S: AsRef<str>>(headers: &[S], params: &FormParams) -> Vec<String> {
    headers
        .iter()
        .map(|header| {
            params
                .get(header.as_ref().trim())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

pub struct FormRelay {
    workbook: Arc<dyn Workbook>,
    lock: WorkbookLock,
    options: RelayOptions,
}

impl FormRelay {
    pub fn new(workbook: Arc<dyn Workbook>, options: RelayOptions) -> Self {
        Self {
            workbook,
            lock: WorkbookLock::new(options.lock_timeout),
            options,
        }
    }

    /// Share an existing lock, e.g. between relays writing the same workbook.
    pub fn with_lock(mut self, lock: WorkbookLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn lock(&self) -> &WorkbookLock {
        &self.lock
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Relay one submission. Never fails: errors become [`RelayOutcome::Error`].
    #[instrument(skip_all, fields(fields = params.len()))]
    pub async fn submit(&self, params: &FormParams) -> RelayOutcome {
        match self.try_submit(params).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "submission failed");
                RelayOutcome::Error(err.to_string())
            }
        }
    }

    async fn try_submit(&self, params: &FormParams) -> Result<RelayOutcome, RelayError> {
        let _guard = self.lock.acquire().await?;

        let sheet = params
            .get(SHEET_PARAM)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.options.default_sheet);

        let Some(headers) = self.workbook.headers(sheet).await? else {
            info!(sheet, "sheet not found");
            return Ok(RelayOutcome::SheetNotFound);
        };

        let row = build_row(&headers, params);
        debug!(sheet, columns = row.len(), "appending row");
        self.workbook.append_row(sheet, row).await?;
        info!(sheet, "row appended");
        Ok(RelayOutcome::Success)
    }
}

impl fmt::Debug for FormRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRelay")
            .field("lock", &self.lock)
            .field("options", &self.options)
            .finish()
    }
}
