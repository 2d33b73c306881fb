use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{Method, StatusCode};
use serde_json::{json, Value};

use storefront::api::{Api, AppState};
use storefront::listing::{categories, customers, orders, products, reviews};
use storefront::store::collections;
use storefront::{DocumentStore, Error, ListParams, MemoryStore, SandboxGateway};

const CAT_ELECTRONICS: &str = "66f5a1b2c3d4e5f6a7b8c901";
const CAT_TEST: &str = "66f5a1b2c3d4e5f6a7b8c902";
const NINTENDO: &str = "66f5a1b2c3d4e5f6a7b8c911";
const ITEM: &str = "66f5a1b2c3d4e5f6a7b8c912";
const CUSTOMER: &str = "66f5a1b2c3d4e5f6a7b8c921";
const ORDER: &str = "66f5a1b2c3d4e5f6a7b8c931";

async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    let docs = [
        (collections::CATEGORIES, json!({ "_id": CAT_ELECTRONICS, "name": "Electronics-test", "alias": "electronics" })),
        (collections::CATEGORIES, json!({ "_id": CAT_TEST, "name": "Test", "alias": "test" })),
        (
            collections::PRODUCTS,
            json!({
                "_id": NINTENDO,
                "name": "test-nintendo",
                "brand": "test-brand",
                "price": 100.01,
                "retail_price": 200.99,
                "description": "A handheld console",
                "tags": ["nintendo"],
                "category": [CAT_ELECTRONICS],
                "quantity": 23,
                "total_bought": 190,
            }),
        ),
        (
            collections::PRODUCTS,
            json!({
                "_id": ITEM,
                "name": "test-item",
                "brand": "test-brand2",
                "price": 49.99,
                "retail_price": 199.0,
                "description": "A plain item",
                "tags": ["test"],
                "category": [CAT_TEST],
                "quantity": 20,
                "total_bought": 0,
            }),
        ),
        (
            collections::CUSTOMERS,
            json!({
                "_id": CUSTOMER,
                "username": "Pbody",
                "email": "1234@1234.com",
                "password": "unhashedpass",
                "first_name": "testname",
                "last_name": "Sherman",
            }),
        ),
        (
            collections::ORDERS,
            json!({
                "_id": ORDER,
                "customer_id": CUSTOMER,
                "order_date": "2024-10-01T22:31:31.507Z",
                "shipping": { "code": 1, "cost": 0 },
                "cart_total": 6,
                "cart": [{
                    "_id": NINTENDO,
                    "name": "test-nintendo",
                    "brand": "test-brand",
                    "price": 100.01,
                    "retail_price": 200.99,
                    "quantity": 23,
                    "cart_quantity": 1,
                    "category": [{ "_id": CAT_ELECTRONICS, "name": "Electronics-test" }],
                }],
            }),
        ),
    ];
    for (collection, doc) in docs {
        store.insert(collection, doc).await.unwrap();
    }
    store
}

fn params(query: &str) -> ListParams {
    ListParams::from_query(Some(query))
}

#[tokio::test]
async fn product_search_counts_before_paging() {
    let store = seeded().await;
    let listing = products::list(&store, &params("search=nintendo&limit=5&page=1"), None)
        .await
        .unwrap();
    assert_eq!(listing.records_count, 1);
    assert_eq!(listing.list_count, 1);
    assert_eq!(listing.total_pages, 1);
    assert_eq!(listing.items()[0]["name"], "test-nintendo");
    assert_eq!(listing.items()[0]["review_info"], Value::Null);
}

#[tokio::test]
async fn record_count_is_the_same_on_every_page() {
    let store = seeded().await;
    let first = products::list(&store, &params("limit=1&page=1"), None).await.unwrap();
    let second = products::list(&store, &params("limit=1&page=2"), None).await.unwrap();
    assert_eq!(first.records_count, 2);
    assert_eq!(second.records_count, 2);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.list_count, 1);
    assert_eq!(second.list_count, 1);
    assert_ne!(first.items()[0]["_id"], second.items()[0]["_id"]);
}

#[tokio::test]
async fn page_past_the_end_is_not_found() {
    let store = seeded().await;
    assert!(matches!(
        products::list(&store, &params("page=3&limit=20"), None).await,
        Err(Error::NotFound(_))
    ));
    let empty = products::list(&store, &params("search=zelda"), None).await.unwrap();
    assert_eq!(empty.records_count, 0);
    assert_eq!(empty.total_pages, 1);
}

#[tokio::test]
async fn brand_is_matched_exactly_and_price_range_applies() {
    let store = seeded().await;
    let listing = products::list(&store, &params("brand=TEST-BRAND"), None).await.unwrap();
    assert_eq!(listing.records_count, 1);
    assert_eq!(listing.items()[0]["_id"], NINTENDO);

    let cheap = products::list(&store, &params("price_low=10&price_high=50"), None).await.unwrap();
    assert_eq!(cheap.records_count, 1);
    assert_eq!(cheap.items()[0]["_id"], ITEM);

    let inverted = products::list(&store, &params("price_low=60&price_high=5"), None).await.unwrap();
    assert_eq!(inverted.records_count, 1);
    assert_eq!(inverted.items()[0]["_id"], NINTENDO);
}

#[tokio::test]
async fn category_products_and_default_sort() {
    let store = seeded().await;
    let listing = products::list_by_category(&store, &ListParams::default(), CAT_TEST).await.unwrap();
    assert_eq!(listing.records_count, 1);
    assert_eq!(listing.items()[0]["name"], "test-item");

    let all = products::list(&store, &ListParams::default(), None).await.unwrap();
    let names: Vec<&str> = all.items().iter().filter_map(|p| p["name"].as_str()).collect();
    assert_eq!(names, ["test-item", "test-nintendo"]);
}

#[tokio::test]
async fn mixed_field_lists_fall_back_to_default_projection() {
    let store = seeded().await;
    let listing = products::list(&store, &params("fields=name,-brand"), None).await.unwrap();
    let product = &listing.items()[0];
    assert!(product.get("brand").is_some());
    assert!(product.get("__v").is_none());

    let narrow = products::list(&store, &params("fields=name,-_id"), None).await.unwrap();
    let product = narrow.items()[0].as_object().unwrap();
    assert!(product.contains_key("name"));
    assert!(!product.contains_key("_id"));
    assert!(!product.contains_key("brand"));
}

#[tokio::test]
async fn categories_default_to_ten_sorted_by_name() {
    let store = seeded().await;
    let listing = categories::list(&store, &ListParams::default()).await.unwrap();
    assert_eq!(listing.records_count, 2);
    assert_eq!(listing.items()[0]["name"], "Electronics-test");
    assert_eq!(listing.items()[1]["name"], "Test");

    let json = serde_json::to_value(&listing).unwrap();
    assert_eq!(json["categories"].as_array().unwrap().len(), 2);
    assert_eq!(json["total_pages"], 1);
}

#[tokio::test]
async fn customers_never_expose_passwords() {
    let store = seeded().await;
    for query in ["fields=-password", "fields=username,password", "search=sherman"] {
        let listing = customers::list(&store, &params(query)).await.unwrap();
        assert_eq!(listing.records_count, 1, "{query}");
        assert!(listing.items()[0].get("password").is_none(), "{query}");
    }
    let one = customers::get(&store, CUSTOMER).await.unwrap();
    assert!(one.get("password").is_none());
}

#[tokio::test]
async fn orders_filter_by_product_and_enrich_cart() {
    let store = seeded().await;
    let query = format!("product={NINTENDO}");
    let listing = orders::list(&store, &params(&query), None).await.unwrap();
    assert_eq!(listing.records_count, 1);
    let cart = &listing.items()[0]["cart"];
    assert_eq!(cart[0]["product"]["name"], "test-nintendo");
    assert!(listing.items()[0].get("cart_products").is_none());

    let query = format!("product={ITEM}");
    let none = orders::list(&store, &params(&query), None).await.unwrap();
    assert_eq!(none.records_count, 0);

    let mine = orders::list_by_customer(&store, &ListParams::default(), CUSTOMER).await.unwrap();
    assert_eq!(mine.records_count, 1);

    let query = format!("product={NINTENDO}");
    let scoped = orders::list_by_customer(&store, &params(&query), CUSTOMER).await.unwrap();
    assert_eq!(scoped.records_count, 1);
    let query = format!("product={ITEM}");
    let scoped = orders::list_by_customer(&store, &params(&query), CUSTOMER).await.unwrap();
    assert_eq!(scoped.records_count, 0);
}

#[tokio::test]
async fn orders_are_newest_first() {
    let store = seeded().await;
    let mut newer: storefront_core::OrderHistory =
        serde_json::from_value(orders::get(&store, ORDER).await.unwrap()).unwrap();
    newer.id = None;
    newer.order_date = "2025-01-01T00:00:00Z".parse().unwrap();
    let created = orders::create(&store, newer).await.unwrap();

    let listing = orders::list(&store, &ListParams::default(), None).await.unwrap();
    assert_eq!(listing.records_count, 2);
    assert_eq!(listing.items()[0]["_id"], created["_id"]);

    orders::delete(&store, created["_id"].as_str().unwrap()).await.unwrap();
    assert!(matches!(
        orders::get(&store, created["_id"].as_str().unwrap()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn product_detail_carries_review_stats() {
    let store = seeded().await;
    let review: storefront_core::Review = serde_json::from_value(json!({
        "rating": 4,
        "reviewer_name": "Pbody",
        "review_title": "Good",
        "review_description": "Works",
    }))
    .unwrap();
    reviews::create(&store, NINTENDO, review).await.unwrap();

    let product = products::get(&store, NINTENDO).await.unwrap();
    assert_eq!(product["review_info"]["review_count"], 1);
    assert_eq!(product["review_info"]["review_average"], 4);

    let listing = reviews::list(&store, &params("search=test-brand"), None).await.unwrap();
    assert_eq!(listing.records_count, 1);
    assert_eq!(listing.items()[0]["product"]["_id"], NINTENDO);
}

#[tokio::test]
async fn unready_store_is_a_server_error() {
    let store = seeded().await;
    store.set_ready(false);
    let err = products::list(&store, &ListParams::default(), None).await.unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

fn api(store: MemoryStore) -> Api {
    Api::new(AppState {
        store: Arc::new(store),
        payments: Arc::new(SandboxGateway::new()),
        currency: "usd".into(),
    })
    .unwrap()
}

async fn call(api: &Api, method: Method, path: &str, query: Option<&str>, body: Value) -> (StatusCode, Value) {
    let body = if body.is_null() { Bytes::new() } else { Bytes::from(body.to_string()) };
    let response = api.dispatch(&method, path, query, body).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn http_not_found_shapes() {
    let api = api(seeded().await);
    let generic = json!({ "error": "Not found" });

    let (status, body) = call(&api, Method::GET, "/api/orderhistory/not-an-id", None, Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let (status, body) = call(&api, Method::GET, "/api/products", Some("page=3&limit=20"), Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let huge = Some("page=9223372036854775807&limit=60");
    let (status, body) = call(&api, Method::GET, "/api/products", huge, Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let (status, body) = call(&api, Method::GET, "/api/nowhere", None, Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, generic);

    let (status, _) = call(&api, Method::PATCH, "/api/products", None, Value::Null).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn http_lists_and_creates() {
    let api = api(seeded().await);

    let (status, body) = call(&api, Method::GET, "/api/test", None, Value::Null).await;
    assert_eq!((status, body), (StatusCode::OK, json!({ "message": "ok" })));

    let (status, body) = call(&api, Method::GET, "/api/products", Some("search=nintendo&limit=5"), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records_count"], 1);
    assert_eq!(body["products"][0]["name"], "test-nintendo");

    let path = format!("/api/orderhistory/customer/{CUSTOMER}");
    let (status, body) = call(&api, Method::GET, &path, None, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_history"][0]["_id"], ORDER);

    let (status, body) = call(&api, Method::POST, "/api/categories", None, json!({ "name": "Toys" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Toys");

    let (status, _) = call(&api, Method::POST, "/api/orderhistory", None, json!({ "customer_id": CUSTOMER })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_payment_intents() {
    let api = api(seeded().await);
    let cart = json!([{ "_id": ITEM, "cart_quantity": 2 }]);

    let (status, created) = call(
        &api,
        Method::POST,
        "/api/payment/intent",
        None,
        json!({ "cart": cart, "shippingCode": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["payAmount"], 105.97);

    let path = format!("/api/payment/intent/{}", created["paymentIntentId"].as_str().unwrap());
    let (status, updated) = call(&api, Method::PUT, &path, None, json!({ "cart": cart, "shippingCode": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["amount"], json!({ "total": 99.98, "shipping": 0.0, "cartTotal": 99.98 }));

    let (status, _) = call(&api, Method::PUT, &path, None, json!({ "cart": cart, "shippingCode": 9 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
