//! HTTP route handlers exposing the conversation store.
//!
//! Mirrors the store contract: sending to an unknown conversation or with blank
//! text is not an error, it answers `applied: false`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::messaging::core::ids::MessageId;
use crate::messaging::core::types::Conversation;
use crate::messaging::provider::StoreProvider;
use crate::messaging::store::core::ConversationStore;

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}", get(get_conversation))
        .route("/api/conversations/{id}/messages", post(send_message))
        .route("/api/conversations/{id}/replies", post(receive_reply))
        .route("/api/conversations/{id}/read", post(mark_read))
        .route("/api/unread", get(unread_total))
        .route("/api/local-data", delete(clear_local_data))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "networking-inbox",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Full conversation list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListResponse {
    /// Snapshot version the list was taken from.
    pub version: u64,
    /// Sum of unread counts in this snapshot.
    pub total_unread: u64,
    /// All conversations.
    pub conversations: Vec<Conversation>,
}

/// Outgoing message request.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message text; surrounding whitespace is stripped.
    pub text: String,
}

/// Simulated counterpart reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    /// Message text; surrounding whitespace is stripped.
    pub text: String,
    /// Whether the conversation is open on the caller's screen.
    #[serde(default)]
    pub is_open: bool,
}

/// Result of a mutating call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    /// Whether the store applied the change.
    pub applied: bool,
    /// Id of the appended message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Unread total after the call.
    pub total_unread: u64,
}

/// Aggregate unread count.
#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    /// Sum of unread counts.
    pub total: u64,
}

type ApiError = (StatusCode, String);

/// Run a store call on the blocking pool; the store writes to `SQLite` synchronously.
async fn blocking<R, F>(state: &Arc<AppState>, f: F) -> Result<R, ApiError>
where
    F: FnOnce(&StoreProvider) -> R + Send + 'static,
    R: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.provider))
        .await
        .map_err(|e| {
            tracing::error!("Store task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Store task failed".to_string())
        })
}

fn list_response(provider: &StoreProvider) -> ConversationListResponse {
    let snapshot = provider.snapshot();
    ConversationListResponse {
        version: snapshot.version(),
        total_unread: snapshot.total_unread(),
        conversations: snapshot.conversations().to_vec(),
    }
}

fn appended(message_id: Option<MessageId>, store: &ConversationStore) -> MutationResponse {
    MutationResponse {
        applied: message_id.is_some(),
        message_id,
        total_unread: store.total_unread(),
    }
}

/// List every conversation.
async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    blocking(&state, list_response).await.map(Json)
}

/// Fetch one conversation.
async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let lookup = id.clone();
    blocking(&state, move |provider| provider.conversation(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Conversation not found: {id}")))
}

/// Send a message as the local user.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    blocking(&state, move |provider| {
        provider.with_store(|store| {
            let message_id = store.add_message(&id, &request.text);
            appended(message_id, store)
        })
    })
    .await
    .map(Json)
}

/// Deliver a counterpart message.
async fn receive_reply(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    blocking(&state, move |provider| {
        provider.with_store(|store| {
            let message_id = store.receive_message(&id, &request.text, request.is_open);
            appended(message_id, store)
        })
    })
    .await
    .map(Json)
}

/// Mark a conversation read (surfaces call this when opening it).
async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MutationResponse>, ApiError> {
    blocking(&state, move |provider| {
        provider.with_store(|store| MutationResponse {
            applied: store.mark_read(&id),
            message_id: None,
            total_unread: store.total_unread(),
        })
    })
    .await
    .map(Json)
}

/// Aggregate unread count for the navigation badge.
async fn unread_total(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UnreadResponse>, ApiError> {
    blocking(&state, |provider| UnreadResponse {
        total: provider.total_unread(),
    })
    .await
    .map(Json)
}

/// Settings action: erase persisted conversations.
async fn clear_local_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    blocking(&state, |provider| {
        provider.clear_local_data();
        list_response(provider)
    })
    .await
    .map(Json)
}
