// HTTP routes: trigger notifications on demand and inspect the outbox

mod error;
mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppDispatcher;
use crate::store::SqliteStore;

pub use error::ApiError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dispatcher: Arc<AppDispatcher>,
    pub(crate) store: SqliteStore,
}

pub fn app(dispatcher: Arc<AppDispatcher>, store: SqliteStore) -> Router {
    let state = AppState { dispatcher, store };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route(
            "/api/notifications/summary/{user_id}",
            post(http::send_summary_handler),
        ) // POST /api/notifications/summary/{user_id}?since=
        .route(
            "/api/notifications/error-state/{report_id}",
            post(http::send_error_state_handler),
        ) // POST /api/notifications/error-state/{report_id}
        .route("/api/outbox", get(http::outbox_handler)) // GET /api/outbox?limit=
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
