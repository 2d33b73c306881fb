use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unavailable(_)
            | Error::InvalidPipeline(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Not-found outcomes share the router's generic 404 body, and server
    /// errors are logged and reported without detail.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status_code();
        let message = match &self {
            Error::NotFound(_) => "Not found".to_string(),
            Error::BadRequest(msg) => msg.clone(),
            _ => {
                error!("{}", self);
                "Internal server error".to_string()
            }
        };
        let body = serde_json::json!({ "error": message });
        json_response(status, body.to_string())
    }
}

/// Build a JSON response with the given status.
pub fn json_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

pub type Result<T> = std::result::Result<T, Error>;
