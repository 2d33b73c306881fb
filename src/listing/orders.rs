use serde_json::{json, Value};
use storefront_core::{Listing, OrderHistory};
use tracing::info;

use crate::error::{Error, Result};
use crate::ids;
use crate::listing::{all_exist, fetch_page, require_id, without_version};
use crate::params::{ListParams, PageLimit};
use crate::pipeline::{ListQuery, Lookup, Pipeline, Stage};
use crate::store::{collections, ensure_ready, find_by_id, DocumentStore};

const CART_PRODUCTS: &str = "cart_products";

fn cart_join() -> Lookup {
    Lookup {
        from: collections::PRODUCTS.to_string(),
        local_field: "cart._id".to_string(),
        foreign_field: "_id".to_string(),
        as_field: CART_PRODUCTS.to_string(),
        pipeline: vec![without_version()],
    }
}

/// Attach the live product record to every cart line, or null when it is gone.
fn attach_products(order: &mut Value) {
    let Some(fields) = order.as_object_mut() else {
        return;
    };
    let products = match fields.remove(CART_PRODUCTS) {
        Some(Value::Array(products)) => products,
        _ => Vec::new(),
    };
    if let Some(Value::Array(cart)) = fields.get_mut("cart") {
        for line in cart.iter_mut().filter_map(Value::as_object_mut) {
            let product = line
                .get("_id")
                .and_then(|id| products.iter().find(|p| p.get("_id") == Some(id)))
                .cloned()
                .unwrap_or(Value::Null);
            line.insert("product".to_string(), product);
        }
    }
}

/// List orders, newest first, optionally for one customer.
///
/// `product` restricts the list to orders with that product in the cart.
pub async fn list(store: &dyn DocumentStore, params: &ListParams, customer: Option<&str>) -> Result<Listing<Value>> {
    let base = match customer {
        Some(id) => Pipeline::matching(json!({ "customer_id": id })),
        None => Pipeline::new(),
    };

    let mut query = ListQuery::new(base, params, PageLimit::Twenty);
    if let Some(product) = &params.product {
        query = query.matching(json!({ "cart._id": product.trim() }));
    }
    let (count, paged) = query.filter().split_count();
    let page = paged
        .sort("-order_date")
        .populate(
            collections::PRODUCTS,
            "cart._id",
            "_id",
            CART_PRODUCTS,
            vec![without_version()],
        )
        .paginate();

    fetch_page(store, collections::ORDERS, "order_history", count, page, attach_products).await
}

/// Orders of the customer `id`, which must exist.
pub async fn list_by_customer(store: &dyn DocumentStore, params: &ListParams, id: &str) -> Result<Listing<Value>> {
    let id = require_id(id, "customer")?;
    if !all_exist(store, collections::CUSTOMERS, &[id.to_string()]).await? {
        return Err(Error::NotFound(format!("customer {id}")));
    }
    list(store, params, Some(id)).await
}

pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Value> {
    let id = require_id(id, "order")?;
    let pipeline = Pipeline::new().then(without_version()).then(Stage::Lookup(cart_join()));
    let mut doc = find_by_id(store, collections::ORDERS, id, pipeline)
        .await?
        .ok_or_else(|| Error::NotFound(format!("order {id}")))?;
    attach_products(&mut doc);
    Ok(doc)
}

/// Store a placed order for an existing customer.
pub async fn create(store: &dyn DocumentStore, mut order: OrderHistory) -> Result<Value> {
    ensure_ready(store)?;
    if !ids::is_valid(&order.customer_id)
        || !all_exist(store, collections::CUSTOMERS, &[order.customer_id.clone()]).await?
    {
        return Err(Error::BadRequest(format!("unknown customer {}", order.customer_id)));
    }
    if order.cart.is_empty() {
        return Err(Error::BadRequest("cart must not be empty".into()));
    }
    if !(1..=3).contains(&order.shipping.code) {
        return Err(Error::BadRequest(format!("unknown shipping code {}", order.shipping.code)));
    }
    order.id = None;

    let doc = store
        .insert(collections::ORDERS, serde_json::to_value(&order)?)
        .await?;
    info!("Created order {} for customer {}", doc["_id"], order.customer_id);
    Ok(doc)
}

/// Remove an order; unknown ids are not found.
pub async fn delete(store: &dyn DocumentStore, id: &str) -> Result<()> {
    let id = require_id(id, "order")?;
    ensure_ready(store)?;
    if store.delete(collections::ORDERS, id).await? {
        info!("Deleted order {}", id);
        Ok(())
    } else {
        Err(Error::NotFound(format!("order {id}")))
    }
}
