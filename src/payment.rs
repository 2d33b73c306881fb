//! Checkout pricing and payment intents.
//!
//! Amounts are always recomputed from the live product records; the client
//! only sends identifiers and quantities. Gateway amounts are integer cents.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use storefront_core::{
    AmountBreakdown, CartLine, PaymentIntentCreated, PaymentIntentRequest, PaymentIntentUpdated,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ids;
use crate::pipeline::{Pipeline, Stage};
use crate::store::{collections, ensure_ready, DocumentStore};

/// Shipping code used when the client does not pick one.
pub const DEFAULT_SHIPPING_CODE: u8 = 1;

/// Shipping cost in cents: 1 free, 2 ground, 3 next day.
pub fn shipping_cost(code: u8) -> Result<u64> {
    match code {
        1 => Ok(0),
        2 => Ok(599),
        3 => Ok(1599),
        other => Err(Error::BadRequest(format!("unknown shipping code {other}"))),
    }
}

fn round_cents(dollars: f64) -> f64 {
    (dollars * 100.0).round() / 100.0
}

fn cents(dollars: f64) -> u64 {
    (dollars * 100.0).round().max(0.0) as u64
}

fn dollars(cents: u64) -> f64 {
    cents as f64 / 100.0
}

/// Sum of quantity times live price over the cart, in dollars rounded to cents.
///
/// Lines naming unknown products contribute nothing.
pub async fn cart_total(store: &dyn DocumentStore, cart: &[CartLine]) -> Result<f64> {
    ensure_ready(store)?;
    let wanted: Vec<&str> = cart
        .iter()
        .map(|line| line.id.as_str())
        .filter(|id| ids::is_valid(id))
        .collect();
    if wanted.is_empty() {
        return Ok(0.0);
    }

    let pipeline = Pipeline::matching(json!({ "_id": { "$in": wanted } }))
        .then(Stage::Project(vec![("price".to_string(), true)]));
    let products = store.aggregate(collections::PRODUCTS, &pipeline).await?;
    let prices: HashMap<&str, f64> = products
        .iter()
        .filter_map(|p| Some((p.get("_id")?.as_str()?, p.get("price")?.as_f64()?)))
        .collect();

    let total = cart
        .iter()
        .filter_map(|line| prices.get(line.id.as_str()).map(|price| price * f64::from(line.cart_quantity)))
        .sum();
    Ok(round_cents(total))
}

/// A payment intent as held by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub id: String,
    pub client_secret: String,
    /// Amount in cents.
    pub amount: u64,
    pub currency: String,
}

/// Card processor seam
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open an intent to charge `amount` cents
    async fn create_intent(&self, amount: u64, currency: &str) -> Result<Intent>;

    /// Change the amount of an open intent; unknown ids are not found
    async fn update_intent(&self, id: &str, amount: u64) -> Result<Intent>;
}

/// Gateway that keeps intents in memory and never charges anything.
#[derive(Default)]
pub struct SandboxGateway {
    intents: RwLock<HashMap<String, Intent>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_intent(&self, amount: u64, currency: &str) -> Result<Intent> {
        let id = format!("pi_{}", ids::generate());
        let intent = Intent {
            client_secret: format!("{id}_secret_{}", ids::generate()),
            id: id.clone(),
            amount,
            currency: currency.to_string(),
        };
        self.intents.write().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn update_intent(&self, id: &str, amount: u64) -> Result<Intent> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("payment intent {id}")))?;
        intent.amount = amount;
        Ok(intent.clone())
    }
}

/// Price the cart and open an intent for it plus shipping.
pub async fn create_intent(
    store: &dyn DocumentStore,
    gateway: &dyn PaymentGateway,
    currency: &str,
    request: PaymentIntentRequest,
) -> Result<PaymentIntentCreated> {
    let cart = request
        .cart
        .ok_or_else(|| Error::BadRequest("cart is required".into()))?;
    let shipping = shipping_cost(request.shipping_code.unwrap_or(DEFAULT_SHIPPING_CODE))?;
    let amount = cents(cart_total(store, &cart).await?) + shipping;
    if amount == 0 {
        return Err(Error::BadRequest("nothing to charge".into()));
    }

    let intent = gateway.create_intent(amount, currency).await?;
    info!("Created payment intent {} for {} cents", intent.id, intent.amount);
    Ok(PaymentIntentCreated {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
        pay_amount: dollars(intent.amount),
    })
}

/// Re-price an open intent after the cart or shipping changed.
pub async fn update_intent(
    store: &dyn DocumentStore,
    gateway: &dyn PaymentGateway,
    intent_id: &str,
    request: PaymentIntentRequest,
) -> Result<PaymentIntentUpdated> {
    let (Some(cart), Some(code)) = (request.cart, request.shipping_code) else {
        return Err(Error::BadRequest("cart and shippingCode are required".into()));
    };
    if intent_id.is_empty() || intent_id == "undefined" {
        return Err(Error::BadRequest("payment intent id is required".into()));
    }
    let shipping = shipping_cost(code)?;
    let cart_total = cart_total(store, &cart).await?;

    let intent = gateway.update_intent(intent_id, cents(cart_total) + shipping).await?;
    debug!("Updated payment intent {} to {} cents", intent.id, intent.amount);
    Ok(PaymentIntentUpdated {
        amount: AmountBreakdown {
            total: dollars(intent.amount),
            shipping: dollars(shipping),
            cart_total,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const SWITCH: &str = "66fb8b2b3a1e4c0012a3b4c5";
    const GAME: &str = "66fb8b2b3a1e4c0012a3b4c6";

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, price) in [(SWITCH, 299.99), (GAME, 59.99)] {
            store
                .insert(collections::PRODUCTS, json!({ "_id": id, "name": id, "price": price }))
                .await
                .unwrap();
        }
        store
    }

    fn line(id: &str, qty: u32) -> CartLine {
        CartLine { id: id.into(), cart_quantity: qty }
    }

    #[test]
    fn shipping_codes() {
        assert_eq!(shipping_cost(1).unwrap(), 0);
        assert_eq!(shipping_cost(2).unwrap(), 599);
        assert_eq!(shipping_cost(3).unwrap(), 1599);
        assert!(matches!(shipping_cost(4), Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn cart_uses_live_prices() {
        let store = store().await;
        let cart = [line(SWITCH, 1), line(GAME, 2), line("66fb8b2b3a1e4c0012a3b4c7", 9), line("junk", 1)];
        assert_eq!(cart_total(&store, &cart).await.unwrap(), 419.97);
        assert_eq!(cart_total(&store, &[]).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn create_then_update_intent() {
        let store = store().await;
        let gateway = SandboxGateway::new();

        let created = create_intent(
            &store,
            &gateway,
            "usd",
            PaymentIntentRequest { cart: Some(vec![line(GAME, 1)]), shipping_code: Some(2) },
        )
        .await
        .unwrap();
        assert_eq!(created.pay_amount, 65.98);
        assert!(created.client_secret.starts_with(&created.payment_intent_id));

        let updated = update_intent(
            &store,
            &gateway,
            &created.payment_intent_id,
            PaymentIntentRequest { cart: Some(vec![line(GAME, 2)]), shipping_code: Some(3) },
        )
        .await
        .unwrap();
        assert_eq!(updated.amount.cart_total, 119.98);
        assert_eq!(updated.amount.shipping, 15.99);
        assert_eq!(updated.amount.total, 135.97);
    }

    #[tokio::test]
    async fn rejects_empty_charges_and_unknown_intents() {
        let store = store().await;
        let gateway = SandboxGateway::new();

        let empty = PaymentIntentRequest { cart: Some(vec![]), shipping_code: None };
        assert!(matches!(
            create_intent(&store, &gateway, "usd", empty).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            create_intent(&store, &gateway, "usd", PaymentIntentRequest::default()).await,
            Err(Error::BadRequest(_))
        ));

        let request = PaymentIntentRequest { cart: Some(vec![line(GAME, 1)]), shipping_code: Some(1) };
        assert!(matches!(
            update_intent(&store, &gateway, "pi_missing", request.clone()).await,
            Err(Error::NotFound(_))
        ));
        let partial = PaymentIntentRequest { cart: request.cart, shipping_code: None };
        assert!(matches!(
            update_intent(&store, &gateway, "pi_missing", partial).await,
            Err(Error::BadRequest(_))
        ));
    }
}
