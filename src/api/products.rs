use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use storefront_core::Product;

use crate::api::{parse_body, respond};
use crate::error::Result;
use crate::listing::products;
use crate::params::ListParams;
use crate::store::DocumentStore;

/// Handle GET /api/products
pub async fn list(store: &dyn DocumentStore, params: ListParams) -> Result<Response<Full<Bytes>>> {
    let listing = products::list(store, &params, None).await?;
    respond(StatusCode::OK, &listing)
}

/// Handle GET /api/category/{id}/products
pub async fn list_by_category(
    store: &dyn DocumentStore,
    params: ListParams,
    id: &str,
) -> Result<Response<Full<Bytes>>> {
    let listing = products::list_by_category(store, &params, id).await?;
    respond(StatusCode::OK, &listing)
}

/// Handle GET /api/product/{id}
pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &products::get(store, id).await?)
}

/// Handle POST /api/products
pub async fn create(store: &dyn DocumentStore, body: &Bytes) -> Result<Response<Full<Bytes>>> {
    let product: Product = parse_body(body)?;
    respond(StatusCode::OK, &products::create(store, product).await?)
}
