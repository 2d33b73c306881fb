use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use storefront_core::OrderHistory;

use crate::api::{parse_body, respond};
use crate::error::Result;
use crate::listing::orders;
use crate::params::ListParams;
use crate::store::DocumentStore;

/// Handle GET /api/orderhistory and GET /api/orderhistory/customer/{customerId}
pub async fn list(
    store: &dyn DocumentStore,
    params: ListParams,
    customer: Option<&str>,
) -> Result<Response<Full<Bytes>>> {
    let listing = match customer {
        Some(id) => orders::list_by_customer(store, &params, id).await?,
        None => orders::list(store, &params, None).await?,
    };
    respond(StatusCode::OK, &listing)
}

/// Handle GET /api/orderhistory/{id}
pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &orders::get(store, id).await?)
}

/// Handle POST /api/orderhistory
pub async fn create(store: &dyn DocumentStore, body: &Bytes) -> Result<Response<Full<Bytes>>> {
    let order: OrderHistory = parse_body(body)?;
    respond(StatusCode::OK, &orders::create(store, order).await?)
}

/// Handle DELETE /api/orderhistory/{id}
pub async fn delete(store: &dyn DocumentStore, id: &str) -> Result<Response<Full<Bytes>>> {
    orders::delete(store, id).await?;
    respond(StatusCode::OK, &json!({ "message": "Order deleted" }))
}
