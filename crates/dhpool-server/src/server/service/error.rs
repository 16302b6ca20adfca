//! Mapping from pool errors to HTTP responses.
//!
//! - `UnrecognizedClass` becomes `400 Bad Request` naming the class.
//! - `PoolEmpty`, or a picked file that vanished before it could be opened,
//!   becomes `503 Service Unavailable` with `Retry-After`: the condition is
//!   temporary and the client is expected to come back.
//! - Anything else is a `500` with a generic body; details go to the log.

use crate::server::telemetry::{increment_invalid_requests, increment_unavailable};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Seconds a client should wait before retrying an empty class.
pub const RETRY_AFTER_SECS: u64 = 30;

pub const UNAVAILABLE_BODY: &str = "Temporarily out of magic numbers, sorry!";

#[derive(Debug)]
pub enum ApiError {
    Pool(dhpool::Error),
    /// The picked file was deleted between selection and open.
    Vanished { class: String },
}

impl From<dhpool::Error> for ApiError {
    fn from(err: dhpool::Error) -> Self {
        Self::Pool(err)
    }
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
        UNAVAILABLE_BODY,
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Pool(err @ dhpool::Error::UnrecognizedClass { .. }) => {
                increment_invalid_requests();
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
            Self::Pool(dhpool::Error::PoolEmpty { class }) => {
                increment_unavailable(&class.to_string());
                unavailable()
            }
            Self::Vanished { class } => {
                increment_unavailable(&class);
                unavailable()
            }
            Self::Pool(err) => {
                tracing::error!("Request failed: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
