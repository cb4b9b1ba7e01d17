use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::TcpListener;
use voidline::relay::{
    server, FormRelay, InMemoryWorkbook, JsonlWorkbook, RelayOptions, RelayOptionsBuilder,
};

async fn start_relay(relay: FormRelay) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, Arc::new(relay)));
    addr
}

async fn post(addr: SocketAddr, query: &str, body: &str) -> (u16, String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/exec{query}"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (status, content_type, resp.text().await.unwrap())
}

#[tokio::test]
async fn test_post_appends_row() {
    let workbook = Arc::new(InMemoryWorkbook::new().with_sheet("Waitlist", ["Name", "Email"]));
    let addr = start_relay(FormRelay::new(workbook.clone(), RelayOptions::default())).await;

    let (status, content_type, body) = post(addr, "", "Email=a%40b.com").await;

    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(body, "Success");
    assert_eq!(
        workbook.rows("Waitlist").unwrap(),
        vec![vec!["".to_string(), "a@b.com".to_string()]]
    );
}

#[tokio::test]
async fn test_sheet_from_query_string() {
    let workbook = Arc::new(
        InMemoryWorkbook::new()
            .with_sheet("Waitlist", ["Name"])
            .with_sheet("Feedback", ["Name", "Message"]),
    );
    let addr = start_relay(FormRelay::new(workbook.clone(), RelayOptions::default())).await;

    let (_, _, body) = post(addr, "?sheet=Feedback", "Name=Ada&Message=hello+void").await;

    assert_eq!(body, "Success");
    assert_eq!(
        workbook.rows("Feedback").unwrap(),
        vec![vec!["Ada".to_string(), "hello void".to_string()]]
    );
    assert!(workbook.rows("Waitlist").unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_sheet() {
    let workbook = Arc::new(InMemoryWorkbook::new().with_sheet("Waitlist", ["Name"]));
    let addr = start_relay(FormRelay::new(workbook.clone(), RelayOptions::default())).await;

    let (status, _, body) = post(addr, "", "sheet=Nope&Name=x").await;

    assert_eq!(status, 200);
    assert_eq!(body, "Sheet not found");
    assert_eq!(workbook.total_rows(), 0);
}

#[tokio::test]
async fn test_lock_timeout_reports_error() {
    let workbook = Arc::new(InMemoryWorkbook::new().with_sheet("Waitlist", ["Name"]));
    let options = RelayOptionsBuilder::default()
        .lock_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let relay = FormRelay::new(workbook.clone(), options);
    let lock = relay.lock().clone();
    let addr = start_relay(relay).await;

    let held = lock.acquire().await.unwrap();
    let (status, _, body) = post(addr, "", "Name=blocked").await;
    drop(held);

    assert_eq!(status, 200);
    assert!(body.starts_with("Error: "), "unexpected body: {body}");
    assert_eq!(workbook.total_rows(), 0);

    let (_, _, body) = post(addr, "", "Name=after").await;
    assert_eq!(body, "Success");
    assert_eq!(workbook.total_rows(), 1);
}

#[tokio::test]
async fn test_get_not_allowed() {
    let workbook = Arc::new(InMemoryWorkbook::new());
    let addr = start_relay(FormRelay::new(workbook, RelayOptions::default())).await;

    let resp = reqwest::get(format!("http://{addr}/exec")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 405);
}

#[tokio::test]
async fn test_jsonl_workbook_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = Arc::new(JsonlWorkbook::new(dir.path()));
    workbook
        .create_sheet("Waitlist", &["Name", "Email"])
        .await
        .unwrap();
    let addr = start_relay(FormRelay::new(workbook.clone(), RelayOptions::default())).await;

    for name in ["Ada", "Grace", "Edsger"] {
        let (_, _, body) = post(addr, "", &format!("Name={name}")).await;
        assert_eq!(body, "Success");
    }

    let rows = workbook.rows("Waitlist").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.len() == 2 && row[1].is_empty()));
}
