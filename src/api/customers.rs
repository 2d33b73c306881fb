use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::api::respond;
use crate::error::Result;
use crate::listing::customers;
use crate::params::ListParams;
use crate::store::DocumentStore;

/// Handle GET /api/customers
pub async fn list(store: &dyn DocumentStore, params: ListParams) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &customers::list(store, &params).await?)
}

/// Handle GET /api/customer/{id}
pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Response<Full<Bytes>>> {
    respond(StatusCode::OK, &customers::get(store, id).await?)
}
