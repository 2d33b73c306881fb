use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use storefront_core::PaymentIntentRequest;

use crate::api::{parse_body, respond, AppState};
use crate::error::Result;
use crate::payment;

/// Handle POST /api/payment/intent
pub async fn create(state: &AppState, body: &Bytes) -> Result<Response<Full<Bytes>>> {
    let request: PaymentIntentRequest = parse_body(body)?;
    let created = payment::create_intent(
        state.store.as_ref(),
        state.payments.as_ref(),
        &state.currency,
        request,
    )
    .await?;
    respond(StatusCode::OK, &created)
}

/// Handle PUT /api/payment/intent/{intentId}
pub async fn update(state: &AppState, intent_id: &str, body: &Bytes) -> Result<Response<Full<Bytes>>> {
    let request: PaymentIntentRequest = parse_body(body)?;
    let updated = payment::update_intent(
        state.store.as_ref(),
        state.payments.as_ref(),
        intent_id,
        request,
    )
    .await?;
    respond(StatusCode::OK, &updated)
}
