// Handlers: version, notification triggers, outbox listing

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::models::NotificationRequest;
use crate::store::OutboxMessage;
use crate::version::{NAME, VERSION};

const DEFAULT_OUTBOX_LIMIT: u32 = 50;

/// Summary of a message handed to the transport.
#[derive(Debug, Serialize, Deserialize)]
pub struct SentResponse {
    pub subject: String,
    pub recipients: Vec<String>,
}

impl From<NotificationRequest> for SentResponse {
    fn from(request: NotificationRequest) -> Self {
        Self {
            recipients: request.to.addresses().to_vec(),
            subject: request.subject,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SummaryQuery {
    /// Window start (RFC 3339); one day ago when absent.
    since: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OutboxQuery {
    limit: Option<u32>,
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// POST /api/notifications/summary/{user_id} — sends the summary mail to one user now.
pub(super) async fn send_summary_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SentResponse>, ApiError> {
    let request = state.dispatcher.send_summary(user_id, query.since).await?;
    Ok(Json(request.into()))
}

/// POST /api/notifications/error-state/{report_id} — alerts the owners of the report's host.
pub(super) async fn send_error_state_handler(
    State(state): State<AppState>,
    Path(report_id): Path<i64>,
) -> Result<Json<SentResponse>, ApiError> {
    let request = state.dispatcher.send_error_state(report_id).await?;
    Ok(Json(request.into()))
}

/// GET /api/outbox — most recently queued messages.
pub(super) async fn outbox_handler(
    State(state): State<AppState>,
    Query(query): Query<OutboxQuery>,
) -> Result<Json<Vec<OutboxMessage>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_OUTBOX_LIMIT);
    Ok(Json(state.store.outbox(limit).await?))
}
