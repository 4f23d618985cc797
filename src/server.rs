//! HTTP surface: the health check and JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error. Please try again later.";

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: bool,
    pub message: String,
    pub timestamp: String,
}

impl StatusBody {
    fn new(status: bool, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusBody::new(false, INTERNAL_ERROR_MESSAGE)),
            )
                .into_response(),
        }
    }
}

pub fn router() -> Router {
    with_middleware(Router::new().route("/health", get(health)))
}

/// Request tracing plus conversion of handler panics into the JSON 500 body.
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<StatusBody> {
    Json(StatusBody::new(true, "ok"))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!("Unhandled panic in request handler: {}", detail);
    ApiError::Internal.into_response()
}
