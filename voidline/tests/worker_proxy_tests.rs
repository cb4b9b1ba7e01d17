use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use hyper::{body::Incoming, Method, Request, StatusCode};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use url::Url;
use voidline::{
    cache::{CacheBucket, CacheStorage, InMemoryCacheStorage, RequestKey},
    http::{self, RespBody},
    worker::{server, HttpNetwork, ServiceWorker, WorkerConfig, WorkerState},
};

async fn origin(req: Request<Incoming>, hits: Arc<AtomicUsize>) -> hyper::Response<RespBody> {
    hits.fetch_add(1, Ordering::SeqCst);
    match (req.method(), req.uri().path()) {
        (&Method::POST, "/submit") => http::text_response(StatusCode::OK, "posted"),
        (_, "/") => http::text_response(StatusCode::OK, "<html>home</html>"),
        (_, "/css/styles.css") => http::text_response(StatusCode::OK, "body{}"),
        (_, "/secret") => http::text_response(StatusCode::OK, "secret data"),
        (_, "/echo-encoding") => {
            let encoding = req
                .headers()
                .get("accept-encoding")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("none")
                .to_string();
            http::text_response(StatusCode::OK, encoding)
        }
        _ => http::text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn start_origin(hits: Arc<AtomicUsize>) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = http::serve(listener, move |req| origin(req, hits.clone())).await;
    });
    (addr, handle)
}

async fn start_proxy(worker: Arc<ServiceWorker>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, worker));
    addr
}

fn worker(origin: SocketAddr, caches: Arc<InMemoryCacheStorage>) -> ServiceWorker {
    let scope = Url::parse(&format!("http://{origin}/")).unwrap();
    let config = WorkerConfig::new(
        scope,
        "v1",
        vec![
            "/".to_string(),
            "css/styles.css".to_string(),
            "missing.png".to_string(),
        ],
    );
    // no pooled connections, so a stopped origin reads as offline
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    ServiceWorker::new(config, caches, Arc::new(HttpNetwork::new(client)))
}

async fn get(proxy: SocketAddr, path: &str, navigate: bool) -> (u16, Option<String>, String) {
    let mut req = reqwest::Client::new().get(format!("http://{proxy}{path}"));
    if navigate {
        req = req.header("sec-fetch-mode", "navigate");
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    let source = resp
        .headers()
        .get(server::SOURCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (status, source, resp.text().await.unwrap())
}

#[tokio::test]
async fn test_install_tolerates_missing_asset() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (origin, _handle) = start_origin(hits.clone()).await;
    let caches = Arc::new(InMemoryCacheStorage::new());
    let worker = worker(origin, caches.clone());

    let (installed, activated) = worker.start().await.unwrap();

    assert_eq!(installed.cached.len(), 2);
    assert_eq!(installed.failed.len(), 1);
    assert_eq!(installed.failed[0].0, "missing.png");
    assert!(activated.is_some());
    assert_eq!(worker.state(), WorkerState::Active);
    assert_eq!(caches.keys().await.unwrap(), vec!["release-cache-v1".to_string()]);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_proxy_serves_offline_from_cache() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (origin, origin_handle) = start_origin(hits.clone()).await;
    let worker = Arc::new(worker(origin, Arc::new(InMemoryCacheStorage::new())));
    worker.start().await.unwrap();
    let proxy = start_proxy(worker.clone()).await;

    let (status, source, body) = get(proxy, "/css/styles.css", false).await;
    assert_eq!(status, 200);
    assert_eq!(source.as_deref(), Some("cache"));
    assert_eq!(body, "body{}");

    let (status, source, body) = get(proxy, "/", true).await;
    assert_eq!(status, 200);
    assert_eq!(source.as_deref(), Some("network"));
    assert_eq!(body, "<html>home</html>");

    origin_handle.abort();
    let _ = origin_handle.await;

    let (status, source, body) = get(proxy, "/", true).await;
    assert_eq!(status, 200);
    assert_eq!(source.as_deref(), Some("cache"));
    assert_eq!(body, "<html>home</html>");

    let (status, _, _) = get(proxy, "/css/styles.css", false).await;
    assert_eq!(status, 200);

    let (status, source, _) = get(proxy, "/js/never-cached.js", false).await;
    assert_eq!(status, 504);
    assert_eq!(source, None);
}

#[tokio::test]
async fn test_version_bump_replaces_bucket() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (origin, _handle) = start_origin(hits).await;
    let caches = Arc::new(InMemoryCacheStorage::new());

    worker(origin, caches.clone()).start().await.unwrap();

    let mut config = worker(origin, caches.clone()).config().clone();
    config.version = "v2".to_string();
    let next = ServiceWorker::new(
        config,
        caches.clone(),
        Arc::new(HttpNetwork::new(reqwest::Client::new())),
    );
    let (_, activated) = next.start().await.unwrap();

    assert_eq!(activated.unwrap().deleted, vec!["release-cache-v1".to_string()]);
    assert_eq!(caches.keys().await.unwrap(), vec!["release-cache-v2".to_string()]);
}

async fn raw_get(proxy: SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: {proxy}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn test_scheme_relative_target_stays_on_scope_origin() {
    let (origin, _origin_handle) = start_origin(Arc::new(AtomicUsize::new(0))).await;
    let other_hits = Arc::new(AtomicUsize::new(0));
    let (other, _other_handle) = start_origin(other_hits.clone()).await;
    let worker = Arc::new(worker(origin, Arc::new(InMemoryCacheStorage::new())));
    worker.start().await.unwrap();
    let proxy = start_proxy(worker.clone()).await;

    let response = raw_get(proxy, &format!("//{other}/secret")).await;

    assert!(response.starts_with("HTTP/1.1"), "unexpected response: {response}");
    assert!(!response.contains("secret data"));
    assert_eq!(other_hits.load(Ordering::SeqCst), 0);

    let bucket = worker.caches().open(&worker.cache_name()).await.unwrap();
    let scope_origin = worker.config().scope.origin();
    for key in bucket.keys().await.unwrap() {
        assert_eq!(Url::parse(&key.url).unwrap().origin(), scope_origin);
    }
}

#[tokio::test]
async fn test_client_accept_encoding_not_forwarded() {
    let (origin, _handle) = start_origin(Arc::new(AtomicUsize::new(0))).await;
    let worker = Arc::new(worker(origin, Arc::new(InMemoryCacheStorage::new())));
    worker.start().await.unwrap();
    let proxy = start_proxy(worker).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{proxy}/echo-encoding"))
        .header("accept-encoding", "gzip, deflate, br, zstd")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp.headers().get("content-encoding").is_none());
    let body = resp.text().await.unwrap();

    // only what the worker's own client can decode reaches the origin
    assert!(!body.contains("br"), "forwarded: {body}");
    assert!(!body.contains("zstd"), "forwarded: {body}");
}

#[tokio::test]
async fn test_post_passes_through_and_fails_with_bad_gateway_offline() {
    let (origin, origin_handle) = start_origin(Arc::new(AtomicUsize::new(0))).await;
    let worker = Arc::new(worker(origin, Arc::new(InMemoryCacheStorage::new())));
    worker.start().await.unwrap();
    let proxy = start_proxy(worker.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{proxy}/submit"))
        .body("Name=Ada")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers().get(server::SOURCE_HEADER).unwrap(),
        "network"
    );
    assert_eq!(resp.text().await.unwrap(), "posted");

    let bucket = worker.caches().open(&worker.cache_name()).await.unwrap();
    let submit = worker.config().scope.join("submit").unwrap();
    assert!(bucket
        .match_request(&RequestKey::get(&submit))
        .await
        .unwrap()
        .is_none());
    assert!(bucket.keys().await.unwrap().iter().all(|k| k.method == "GET"));

    origin_handle.abort();
    let _ = origin_handle.await;

    let resp = client
        .post(format!("http://{proxy}/submit"))
        .body("Name=Ada")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 502);
    assert!(resp.headers().get(server::SOURCE_HEADER).is_none());
}
