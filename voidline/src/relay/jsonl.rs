//! Directory-backed workbook. Every sheet is a `<name>.jsonl` file whose first
//! line is the JSON array of headers; each appended row is one more line.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{
    fs,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::debug;

use super::{RelayError, Workbook};

#[derive(Debug, Clone)]
pub struct JsonlWorkbook {
    dir: PathBuf,
}

impl JsonlWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create `sheet` with the given header row unless it already exists.
    pub async fn create_sheet<S: AsRef<str>>(
        &self,
        sheet: &str,
        headers: &[S],
    ) -> Result<(), RelayError> {
        let path = self
            .sheet_path(sheet)
            .ok_or_else(|| RelayError::Workbook(format!("invalid sheet name: {sheet}")))?;
        if fs::try_exists(&path).await? {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).await?;
        let headers: Vec<&str> = headers.iter().map(AsRef::as_ref).collect();
        let mut line = serde_json::to_string(&headers)?;
        line.push('\n');
        fs::write(&path, line).await?;
        debug!(sheet, path = %path.display(), "created sheet");
        Ok(())
    }

    /// Rows appended so far, header row excluded.
    pub async fn rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, RelayError> {
        let Some(path) = self.sheet_path(sheet) else {
            return Ok(Vec::new());
        };
        let content = fs::read_to_string(path).await?;
        content
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(RelayError::from))
            .collect()
    }

    // Names that could escape the directory never resolve to a sheet.
    fn sheet_path(&self, sheet: &str) -> Option<PathBuf> {
        let valid = !sheet.is_empty()
            && !sheet.starts_with('.')
            && !sheet.contains(['/', '\\', '\0']);
        valid.then(|| self.dir.join(format!("{sheet}.jsonl")))
    }
}

#[async_trait]
impl Workbook for JsonlWorkbook {
    async fn headers(&self, sheet: &str) -> Result<Option<Vec<String>>, RelayError> {
        let Some(path) = self.sheet_path(sheet) else {
            return Ok(None);
        };
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut first = String::new();
        BufReader::new(file).read_line(&mut first).await?;
        if first.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        // Header cells may be any JSON scalar; render them as text.
        let cells: Vec<serde_json::Value> = serde_json::from_str(first.trim())?;
        Ok(Some(
            cells
                .into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect(),
        ))
    }

    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), RelayError> {
        let path = self
            .sheet_path(sheet)
            .ok_or_else(|| RelayError::SheetNotFound(sheet.to_string()))?;
        let mut file = match fs::OpenOptions::new().append(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RelayError::SheetNotFound(sheet.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut line = serde_json::to_string(&row)?;
        line.push('\n');
        // Single write so the row lands whole or not at all.
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
