//! REST API
//!
//! Thin axum layer over the lifecycle, gateway and message log. Routes live
//! under `/api`; `/health` sits at the root.

pub mod error;
pub mod routes;

use crate::storage::SessionStorage;
use crate::whatsapp::{ConnectionLifecycle, MessageGateway};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: ConnectionLifecycle,
    pub gateway: MessageGateway,
    pub storage: Arc<dyn SessionStorage>,
}

impl AppState {
    pub fn new(lifecycle: ConnectionLifecycle, storage: Arc<dyn SessionStorage>) -> Self {
        let gateway = MessageGateway::new(lifecycle.clone(), Arc::clone(&storage));
        Self {
            lifecycle,
            gateway,
            storage,
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/connect", post(routes::connect))
        .route("/disconnect", post(routes::disconnect))
        .route("/status", get(routes::status))
        .route(
            "/messages",
            get(routes::list_messages).post(routes::send_message),
        );

    Router::new()
        .nest("/api", api)
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
