//! Error envelope for the HTTP layer.
//!
//! Every failure is answered with `500 {"error": "..."}` and a fixed,
//! operation-level message. The underlying error goes to the log only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

pub const CONNECT_FAILED: &str = "Failed to connect to WhatsApp";
pub const DISCONNECT_FAILED: &str = "Failed to disconnect from WhatsApp";
pub const SEND_FAILED: &str = "Failed to send message";
pub const FETCH_MESSAGES_FAILED: &str = "Failed to fetch messages";

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl ApiError {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }

    /// Log `cause` and map it to a generic error, for use with `map_err`
    pub fn logged<E: Display>(message: &'static str) -> impl FnOnce(E) -> Self {
        move |cause| {
            error!(error = %cause, "{}", message);
            Self::new(message)
        }
    }

    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
