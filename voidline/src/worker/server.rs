//! Offline proxy: serves the worker scope over HTTP, routing every request
//! through [`ServiceWorker::handle_fetch`].
//!
//! The proxy does not track pages, so it never registers anything in the
//! worker's [`ClientRegistry`](super::ClientRegistry); embedders that know
//! about open pages call `open`/`close` themselves.
use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Incoming,
    header::{HeaderName, HeaderValue},
    Request as HttpRequest, Response, StatusCode, Uri,
};
use tokio::net::TcpListener;
use tracing::{debug, warn};
use url::Url;

use super::{Request, ServiceWorker, WorkerError};
use crate::http::{self, BoxError, RespBody};

pub const SOURCE_HEADER: &str = "x-voidline-source";

// Recomputed by hyper for the outgoing body.
const DROPPED_RESPONSE_HEADERS: &[&str] = &[
    "content-length",
    "transfer-encoding",
    "connection",
    "content-encoding",
];

pub async fn handle(req: HttpRequest<Incoming>, worker: Arc<ServiceWorker>) -> Response<RespBody> {
    let (parts, body) = req.into_parts();
    let url = scoped_url(&worker.config().scope, &parts.uri);

    let body = match body.collect().await {
        Ok(body) => body.to_bytes(),
        Err(err) => return http::text_response(StatusCode::BAD_REQUEST, err.to_string()),
    };
    let request = Request::from_http_parts(&parts, url).with_body(body.to_vec());

    match worker.handle_fetch(request).await {
        Ok(served) => {
            debug!(source = served.source.as_str(), status = served.response.status, "served");
            let response = served.response;
            let mut resp = Response::new(Full::new(Bytes::from(response.body)));
            *resp.status_mut() =
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
            for (name, value) in &response.headers {
                if DROPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                    continue;
                }
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    resp.headers_mut().append(name, value);
                }
            }
            resp.headers_mut().insert(
                HeaderName::from_static(SOURCE_HEADER),
                HeaderValue::from_static(served.source.as_str()),
            );
            resp
        }
        Err(err @ WorkerError::Offline { .. }) => {
            warn!(error = %err, "offline");
            http::text_response(StatusCode::GATEWAY_TIMEOUT, err.to_string())
        }
        Err(err) => {
            warn!(error = %err, "fetch failed");
            http::text_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

/// Target URL inside the scope. Only path and query are taken from the
/// request, so a target such as `//elsewhere/x` stays on the scope origin.
fn scoped_url(scope: &Url, uri: &Uri) -> Url {
    let mut url = scope.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url.set_fragment(None);
    url
}

pub async fn serve(listener: TcpListener, worker: Arc<ServiceWorker>) -> Result<(), BoxError> {
    http::serve(listener, move |req| handle(req, worker.clone())).await
}

pub async fn bind_and_serve(addr: SocketAddr, worker: Arc<ServiceWorker>) -> Result<(), BoxError> {
    http::bind_and_serve(addr, move |req| handle(req, worker.clone())).await
}
