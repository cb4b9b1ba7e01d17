//! HTTP boundary of the relay: `POST` with urlencoded query and/or body
//! fields, answered with a `text/plain` outcome.
use std::{net::SocketAddr, sync::Arc};

use http_body_util::BodyExt;
use hyper::{body::Incoming, Method, Request, Response, StatusCode};
use tokio::net::TcpListener;
use tracing::warn;

use super::{FormParams, FormRelay, RelayOutcome};
use crate::http::{self, BoxError, RespBody};

pub async fn handle(req: Request<Incoming>, relay: Arc<FormRelay>) -> Response<RespBody> {
    if req.method() != Method::POST {
        return http::text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    let mut params = req
        .uri()
        .query()
        .map(|q| FormParams::parse_urlencoded(q.as_bytes()))
        .unwrap_or_default();

    let outcome = match req.into_body().collect().await {
        Ok(body) => {
            params.extend(FormParams::parse_urlencoded(&body.to_bytes()));
            relay.submit(&params).await
        }
        Err(err) => {
            warn!(error = %err, "failed to read submission body");
            RelayOutcome::Error(err.to_string())
        }
    };

    http::text_response(StatusCode::OK, outcome.to_string())
}

/// Serve the relay on an already bound listener.
pub async fn serve(listener: TcpListener, relay: Arc<FormRelay>) -> Result<(), BoxError> {
    http::serve(listener, move |req| handle(req, relay.clone())).await
}

pub async fn bind_and_serve(addr: SocketAddr, relay: Arc<FormRelay>) -> Result<(), BoxError> {
    http::bind_and_serve(addr, move |req| handle(req, relay.clone())).await
}
