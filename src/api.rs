use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use matchit::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{json_response, Error, Result};
use crate::params::ListParams;
use crate::payment::PaymentGateway;
use crate::store::DocumentStore;

pub mod categories;
pub mod customers;
pub mod health;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reviews;

/// Shared handles every request handler may use.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub payments: Arc<dyn PaymentGateway>,
    /// Currency payment intents are opened in.
    pub currency: String,
}

/// Route identifier
#[derive(Clone, Copy)]
enum Route {
    Health,
    Test,
    Products,
    Product,
    ProductReviews,
    ProductReview,
    Categories,
    Category,
    CategoryProducts,
    Reviews,
    Customers,
    Customer,
    Orders,
    Order,
    CustomerOrders,
    PaymentIntents,
    PaymentIntent,
}

/// Build the router
fn build_router() -> std::result::Result<Router<Route>, matchit::InsertError> {
    let mut router = Router::new();
    router.insert("/health", Route::Health)?;
    router.insert("/api/test", Route::Test)?;
    router.insert("/api/products", Route::Products)?;
    router.insert("/api/product/{id}", Route::Product)?;
    router.insert("/api/product/{id}/reviews", Route::ProductReviews)?;
    router.insert("/api/product/{id}/review/{reviewId}", Route::ProductReview)?;
    router.insert("/api/categories", Route::Categories)?;
    router.insert("/api/category/{id}", Route::Category)?;
    router.insert("/api/category/{id}/products", Route::CategoryProducts)?;
    router.insert("/api/reviews", Route::Reviews)?;
    router.insert("/api/customers", Route::Customers)?;
    router.insert("/api/customer/{id}", Route::Customer)?;
    router.insert("/api/orderhistory", Route::Orders)?;
    router.insert("/api/orderhistory/{id}", Route::Order)?;
    router.insert("/api/orderhistory/customer/{customerId}", Route::CustomerOrders)?;
    router.insert("/api/payment/intent", Route::PaymentIntents)?;
    router.insert("/api/payment/intent/{intentId}", Route::PaymentIntent)?;
    Ok(router)
}

/// Serialise `value` as the JSON body of a response.
pub(crate) fn respond<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Full<Bytes>>> {
    Ok(json_response(status, serde_json::to_vec(value)?))
}

/// Decode a JSON request body; malformed or incomplete bodies are bad requests.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::BadRequest(format!("invalid body: {e}")))
}

/// Router plus state: turns a decoded request into a response.
pub struct Api {
    router: Router<Route>,
    state: AppState,
}

impl Api {
    pub fn new(state: AppState) -> anyhow::Result<Self> {
        Ok(Self {
            router: build_router()?,
            state,
        })
    }

    /// Route and handle one request.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        debug!("{} {}", method, path);

        // Match route
        let matched = match self.router.at(path) {
            Ok(m) => m,
            Err(_) => {
                return json_response(StatusCode::NOT_FOUND, r#"{"error":"Not found"}"#);
            }
        };

        let route = *matched.value;
        let params = matched.params;
        let param = |name: &str| params.get(name).unwrap_or_default();
        let state = &self.state;
        let store = state.store.as_ref();

        // Dispatch to handler
        let result = match (method, route) {
            (&Method::GET, Route::Health) => health::health(store).await,
            (&Method::GET, Route::Test) => health::test().await,

            (&Method::GET, Route::Products) => products::list(store, ListParams::from_query(query)).await,
            (&Method::POST, Route::Products) => products::create(store, &body).await,
            (&Method::GET, Route::Product) => products::get(store, param("id")).await,
            (&Method::GET, Route::ProductReviews) => {
                reviews::list(store, ListParams::from_query(query), Some(param("id"))).await
            }
            (&Method::POST, Route::ProductReviews) => reviews::create(store, param("id"), &body).await,
            (&Method::GET, Route::ProductReview) => {
                reviews::get(store, param("id"), param("reviewId")).await
            }

            (&Method::GET, Route::Categories) => categories::list(store, ListParams::from_query(query)).await,
            (&Method::POST, Route::Categories) => categories::create(store, &body).await,
            (&Method::GET, Route::Category) => categories::get(store, param("id")).await,
            (&Method::GET, Route::CategoryProducts) => {
                products::list_by_category(store, ListParams::from_query(query), param("id")).await
            }

            (&Method::GET, Route::Reviews) => reviews::list(store, ListParams::from_query(query), None).await,

            (&Method::GET, Route::Customers) => customers::list(store, ListParams::from_query(query)).await,
            (&Method::GET, Route::Customer) => customers::get(store, param("id")).await,

            (&Method::GET, Route::Orders) => orders::list(store, ListParams::from_query(query), None).await,
            (&Method::POST, Route::Orders) => orders::create(store, &body).await,
            (&Method::GET, Route::Order) => orders::get(store, param("id")).await,
            (&Method::DELETE, Route::Order) => orders::delete(store, param("id")).await,
            (&Method::GET, Route::CustomerOrders) => {
                orders::list(store, ListParams::from_query(query), Some(param("customerId"))).await
            }

            (&Method::POST, Route::PaymentIntents) => payment::create(state, &body).await,
            (&Method::PUT, Route::PaymentIntent) => payment::update(state, param("intentId"), &body).await,

            _ => Ok(json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                r#"{"error":"Method not allowed"}"#,
            )),
        };

        // Convert result to response
        match result {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }
}

/// Handle incoming requests
async fn handle_request(
    req: Request<Incoming>,
    api: Arc<Api>,
) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            return Ok(Error::BadRequest("unreadable request body".into()).into_response());
        }
    };

    Ok(api
        .dispatch(&parts.method, parts.uri.path(), parts.uri.query(), body)
        .await)
}

/// Run the HTTP server
pub async fn run(config: Config, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let api = Arc::new(Api::new(state)?);

    info!("Server listening on http://{}", addr);

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let api = Arc::clone(&api);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, Arc::clone(&api)));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection from {}: {}", remote_addr, e);
            }
        });
    }
}
