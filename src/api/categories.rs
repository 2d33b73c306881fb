use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use storefront_core::Category;

use crate::api::{parse_body, respond};
use crate::error::Result;
use crate::listing::categories;
use crate::params::ListParams;
use crate::store::DocumentStore;

/// Handle GET /api/categories
pub async fn list(store: &dyn DocumentStore, params: ListParams) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &categories::list(store, &params).await?)
}

/// Handle GET /api/category/{id}
pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &categories::get(store, id).await?)
}

/// Handle POST /api/categories
pub async fn create(store: &dyn DocumentStore, body: &Bytes) -> Result<Response<Full<Bytes>>> {
    let category: Category = parse_body(body)?;
    respond(StatusCode::OK, &categories::create(store, category).await?)
}
