//! REST handlers

use super::error::{
    ApiError, ApiResult, CONNECT_FAILED, DISCONNECT_FAILED, FETCH_MESSAGES_FAILED, SEND_FAILED,
};
use super::AppState;
use crate::storage::Message;
use crate::whatsapp::StatusSnapshot;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    pub content: String,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

/// POST /api/connect
pub async fn connect(State(state): State<AppState>) -> ApiResult<Json<SuccessResponse>> {
    state
        .lifecycle
        .connect()
        .await
        .map_err(ApiError::logged(CONNECT_FAILED))?;
    Ok(SuccessResponse::ok())
}

/// POST /api/disconnect
pub async fn disconnect(State(state): State<AppState>) -> ApiResult<Json<SuccessResponse>> {
    state
        .lifecycle
        .disconnect()
        .await
        .map_err(ApiError::logged(DISCONNECT_FAILED))?;
    Ok(SuccessResponse::ok())
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.lifecycle.status())
}

/// POST /api/messages
///
/// Malformed bodies get the same 500 envelope as a failed send.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<Json<Message>> {
    let Json(request) = payload.map_err(ApiError::logged(SEND_FAILED))?;
    let message = state
        .gateway
        .send(&request.to, &request.content)
        .await
        .map_err(ApiError::logged(SEND_FAILED))?;
    Ok(Json(message))
}

/// GET /api/messages
pub async fn list_messages(State(state): State<AppState>) -> ApiResult<Json<Vec<Message>>> {
    let messages = state
        .storage
        .messages()
        .await
        .map_err(ApiError::logged(FETCH_MESSAGES_FAILED))?;
    Ok(Json(messages))
}
