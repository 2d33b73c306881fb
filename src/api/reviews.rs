use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use storefront_core::Review;

use crate::api::{parse_body, respond};
use crate::error::Result;
use crate::listing::reviews;
use crate::params::ListParams;
use crate::store::DocumentStore;

/// Handle GET /api/reviews and GET /api/product/{id}/reviews
pub async fn list(
    store: &dyn DocumentStore,
    params: ListParams,
    product: Option<&str>,
) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &reviews::list(store, &params, product).await?)
}

/// Handle GET /api/product/{id}/review/{reviewId}
pub async fn get(store: &dyn DocumentStore, product: &str, review: &str) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &reviews::get(store, product, review).await?)
}

/// Handle POST /api/product/{id}/reviews
pub async fn create(store: &dyn DocumentStore, product: &str, body: &Bytes) -> Result<Response<Full<Bytes>>> {
    let review: Review = parse_body(body)?;
    respond(StatusCode::OK, &reviews::create(store, product, review).await?)
}
