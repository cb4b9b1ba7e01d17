//! Form relay over HTTP.
//!
//! `cargo run --example relay_server -- tests/voidline.yml`
//!
//! Sheets come from `relay.sheets`. With `relay.data_dir` set rows are kept
//! in JSON-lines files there, otherwise in memory.
use std::sync::Arc;

use voidline::{
    config::Configurable,
    relay::{server, FormRelay, InMemoryWorkbook, JsonlWorkbook, Workbook},
    settings::Settings,
    tracing, tracing_subscriber,
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
    let sheets = settings.relay_sheets()?;

    let workbook: Arc<dyn Workbook> = match settings
        .get_config_value("relay.data_dir")
        .and_then(|v| v.as_str())
    {
        Some(dir) => {
            let workbook = JsonlWorkbook::new(dir);
            for (name, headers) in &sheets {
                workbook.create_sheet(name, headers.as_slice()).await?;
            }
            Arc::new(workbook)
        }
        None => Arc::new(
            sheets
                .into_iter()
                .fold(InMemoryWorkbook::new(), |wb, (name, headers)| {
                    wb.with_sheet(&name, headers)
                }),
        ),
    };

    let relay = Arc::new(FormRelay::new(workbook, settings.relay()?));
    let addr = settings.bind_addr("relay", "127.0.0.1:8080")?;
    tracing::info!(config = %path, ?relay, "starting form relay");

    server::bind_and_serve(addr, relay)
        .await
        .map_err(anyhow::Error::msg)
}
