use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;

use crate::api::respond;
use crate::error::Result;
use crate::store::DocumentStore;

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: &'static str,
}

/// Handle GET /health
pub async fn health(store: &dyn DocumentStore) -> Result<Response<Full<Bytes>>> {
    let (status, database, code) = if store.is_ready() {
        ("ok", "connected", StatusCode::OK)
    } else {
        ("degraded", "disconnected", StatusCode::SERVICE_UNAVAILABLE)
    };
    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
    };

    respond(code, &response)
}

/// Handle GET /api/test
pub async fn test() -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &json!({ "message": "ok" }))
}
