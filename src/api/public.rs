//! Public API types

use axum::Json;
use axum::response::{IntoResponse, Response};

use crate::resource::{Envelope, GatewayError, Reply, Status};

// Errors

/// Unexpected failures. The cause is logged and clients only ever see
/// a generic server error.
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("{:#}", self.0);
        (
            Status::ServerError.code(),
            Json(Envelope::message("Server error")),
        )
            .into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::Persistence(err) = &self {
            tracing::error!("Storage failure: {}", err);
        }
        (self.status().code(), Json(Envelope::message(self.to_string()))).into_response()
    }
}

/// Replies are sent as is. Queued notices must be delivered before
/// converting since they are dropped here.
impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status.code(), Json(self.body)).into_response()
    }
}

// Re-export public types from each route

pub mod email {
    pub use crate::api::routes::email::public::*;
}
