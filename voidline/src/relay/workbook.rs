//! Sheet storage behind the relay. A workbook is a set of named sheets; each
//! sheet has a header row naming its columns followed by appended rows.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::RelayError;

#[async_trait]
pub trait Workbook: Send + Sync {
    /// Header row of `sheet`, `None` when the sheet does not exist.
    async fn headers(&self, sheet: &str) -> Result<Option<Vec<String>>, RelayError>;

    /// Append one complete row at the end of `sheet`.
    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), RelayError>;
}

#[derive(Debug, Clone, Default)]
struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Workbook held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkbook {
    sheets: Mutex<HashMap<String, Sheet>>,
}

impl InMemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet<S: Into<String>>(
        self,
        name: &str,
        headers: impl IntoIterator<Item = S>,
    ) -> Self {
        if let Ok(mut sheets) = self.sheets.lock() {
            sheets.insert(
                name.to_string(),
                Sheet {
                    headers: headers.into_iter().map(Into::into).collect(),
                    rows: Vec::new(),
                },
            );
        }
        self
    }

    /// Rows appended so far, header row excluded.
    pub fn rows(&self, sheet: &str) -> Option<Vec<Vec<String>>> {
        let sheets = self.sheets.lock().ok()?;
        sheets.get(sheet).map(|s| s.rows.clone())
    }

    pub fn total_rows(&self) -> usize {
        self.sheets
            .lock()
            .map(|sheets| sheets.values().map(|s| s.rows.len()).sum())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Workbook for InMemoryWorkbook {
    async fn headers(&self, sheet: &str) -> Result<Option<Vec<String>>, RelayError> {
        let sheets = self
            .sheets
            .lock()
            .map_err(|e| RelayError::Workbook(e.to_string()))?;
        Ok(sheets.get(sheet).map(|s| s.headers.clone()))
    }

    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), RelayError> {
        let mut sheets = self
            .sheets
            .lock()
            .map_err(|e| RelayError::Workbook(e.to_string()))?;
        let target = sheets
            .get_mut(sheet)
            .ok_or_else(|| RelayError::SheetNotFound(sheet.to_string()))?;
        target.rows.push(row);
        Ok(())
    }
}
