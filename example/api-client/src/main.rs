//! HTTP client example for the storefront API
//!
//! Browses the catalogue and prices a one-item cart.
//!
//! Usage:
//!   cargo run -p api-client [--url http://localhost:3000] [--search TERM]

use serde_json::{json, Value};
use storefront_core::{Listing, PaymentIntentCreated, PaymentIntentUpdated};

const DEFAULT_URL: &str = "http://localhost:3000";

fn flag(name: &str) -> Option<String> {
    std::env::args().skip_while(|arg| arg != name).nth(1)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = flag("--url").unwrap_or_else(|| DEFAULT_URL.to_string());
    let search = flag("--search");

    println!("Storefront API Client Demo");
    println!("==========================\n");
    println!("Connecting to: {}\n", base_url);

    let client = reqwest::Client::new();

    // 1. List products
    println!("1. Listing products...\n");
    let mut request = client
        .get(format!("{}/api/products", base_url))
        .query(&[("limit", "5"), ("sortBy", "rating")]);
    if let Some(term) = &search {
        request = request.query(&[("search", term)]);
    }
    let page: Listing<Value> = request.send().await?.error_for_status()?.json().await?;

    println!(
        "   Showing {} of {} product(s), {} page(s):\n",
        page.list_count, page.records_count, page.total_pages
    );

    for product in page.items() {
        println!("   - {} ({})", product["name"], product["brand"]);
        println!("     ${} (list ${})", product["price"], product["retail_price"]);
        match product.get("review_info").filter(|info| !info.is_null()) {
            Some(info) => println!(
                "     {} review(s), average {}",
                info["review_count"], info["review_average"]
            ),
            None => println!("     No reviews yet"),
        }
        println!();
    }

    // Pick the first product for further demo
    let Some(first) = page.items().first() else {
        println!("No products found.");
        return Ok(());
    };
    let Some(product_id) = first["_id"].as_str() else {
        println!("Product has no identifier.");
        return Ok(());
    };

    // 2. List its reviews
    println!("2. Latest reviews for {}...\n", first["name"]);
    let reviews: Listing<Value> = client
        .get(format!("{}/api/product/{}/reviews", base_url, product_id))
        .query(&[("limit", "3")])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    for review in reviews.items() {
        println!("   - {}/5 {}", review["rating"], review["review_title"]);
        println!("     by {} on {}", review["reviewer_name"], review["review_date"]);
    }
    if reviews.items().is_empty() {
        println!("   (none)");
    }
    println!();

    // 3. Open a payment intent for one unit with ground shipping
    println!("3. Pricing a cart...\n");
    let cart = json!([{ "_id": product_id, "cart_quantity": 1 }]);
    let created: PaymentIntentCreated = client
        .post(format!("{}/api/payment/intent", base_url))
        .json(&json!({ "cart": cart, "shippingCode": 2 }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("   Intent: {}", created.payment_intent_id);
    println!("   Amount: ${:.2}", created.pay_amount);

    // 4. Switch to next-day shipping
    println!("\n4. Switching to next-day shipping...\n");
    let updated: PaymentIntentUpdated = client
        .put(format!("{}/api/payment/intent/{}", base_url, created.payment_intent_id))
        .json(&json!({ "cart": cart, "shippingCode": 3 }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    println!("   Cart:     ${:.2}", updated.amount.cart_total);
    println!("   Shipping: ${:.2}", updated.amount.shipping);
    println!("   Total:    ${:.2}", updated.amount.total);

    println!("\nDemo complete!");

    Ok(())
}
