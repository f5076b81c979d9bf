//! Conversation API.
//!
//! Endpoints:
//!
//! - `POST /conversations`                 — Create a conversation
//! - `GET  /conversations`                 — List conversations, most recent first
//! - `GET  /conversations/{id}`            — A conversation with its messages
//! - `GET  /conversations/{id}/features`   — Current map features
//! - `POST /conversations/{id}/messages`   — Send a message, get an SSE stream
//! - `GET  /tools`                         — The merged tool catalog
//!
//! The message stream carries one named event per loop event (`user_prompt`,
//! `llm_response`, `tool_call`, `tool_result`, `tool_error`, `geo_feature`,
//! `remove_geo_feature`) and ends with exactly one `done` or `error` event.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};

use geoagent_core::event::LoopEvent;
use geoagent_core::feature::GeoFeature;
use geoagent_core::message::ConversationId;
use geoagent_core::provider::ToolDefinition;
use geoagent_core::store::{ConversationRecord, MessageKind, StoredMessage};

use crate::SharedState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route("/conversations/{id}", get(get_conversation_handler))
        .route("/conversations/{id}/features", get(list_features_handler))
        .route("/conversations/{id}/messages", post(send_message_handler))
        .route("/tools", get(list_tools_handler))
        .with_state(state)
}

// ── Shared types ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    error!(error = %e, "Request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn require_conversation(state: &SharedState, id: &ConversationId) -> Result<ConversationRecord, ApiError> {
    state
        .store()
        .get_conversation(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Conversation {id} not found")))
}

// ── Conversations ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// `POST /conversations` — the body is optional.
async fn create_conversation_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ConversationRecord>), ApiError> {
    let request: CreateConversationRequest = if body.is_empty() {
        CreateConversationRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid request body: {e}")))?
    };

    let record = state
        .store()
        .create_conversation(None, request.title)
        .await
        .map_err(internal)?;
    info!(conversation_id = %record.id, "Conversation created");
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationRecord>,
}

async fn list_conversations_handler(
    State(state): State<SharedState>,
    Query(page): Query<Pagination>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0).max(0);

    let conversations = state
        .store()
        .list_conversations(limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(ConversationListResponse { conversations }))
}

/// A stored message as clients render it.
#[derive(Debug, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: StoredMessage,

    pub role: &'static str,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub geo_features: Vec<GeoFeature>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: ConversationRecord,

    pub messages: Vec<MessageView>,
}

async fn get_conversation_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let id = ConversationId(id);
    let conversation = require_conversation(&state, &id).await?;

    let stored = state.store().list_messages(&id).await.map_err(internal)?;
    let mut messages = Vec::with_capacity(stored.len());
    for message in stored {
        let geo_features = if message.kind == MessageKind::Assistant {
            state
                .store()
                .message_features(&message.id)
                .await
                .map_err(internal)?
                .iter()
                .map(|f| f.to_feature())
                .collect()
        } else {
            Vec::new()
        };
        messages.push(MessageView {
            role: message.kind.role(),
            message,
            geo_features,
        });
    }

    Ok(Json(ConversationDetail { conversation, messages }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureListResponse {
    pub conversation_id: ConversationId,
    pub features: Vec<GeoFeature>,
}

async fn list_features_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<FeatureListResponse>, ApiError> {
    let id = ConversationId(id);
    require_conversation(&state, &id).await?;

    let features = state
        .store()
        .conversation_features(&id)
        .await
        .map_err(internal)?
        .iter()
        .map(|f| f.to_feature())
        .collect();
    Ok(Json(FeatureListResponse {
        conversation_id: id,
        features,
    }))
}

// ── Tools ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDefinition>,
    pub count: usize,
}

async fn list_tools_handler(State(state): State<SharedState>) -> Result<Json<ToolListResponse>, ApiError> {
    let tools = state
        .tools()
        .list_tools()
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(ToolListResponse {
        count: tools.len(),
        tools,
    }))
}

// ── Messages (SSE) ────────────────────────────────────────────────────────

fn sse_event(name: &str, data: &serde_json::Value) -> SseEvent {
    SseEvent::default()
        .event(name)
        .data(serde_json::to_string(data).unwrap_or_default())
}

/// `POST /conversations/{id}/messages` — run the agent and stream progress.
///
/// Validation failures are plain JSON errors; once the stream starts, run
/// failures arrive as its terminal `error` event.
async fn send_message_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let body: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid request body: {e}")))?;
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Message is required and must be a string"))?;

    let conversation_id = ConversationId(id);
    info!(conversation_id = %conversation_id, message_len = message.len(), "Message received");

    let (tx, rx) = mpsc::unbounded_channel::<SseEvent>();
    let service = state.service.clone();

    tokio::spawn(async move {
        let events = tx.clone();
        let sink = move |event: LoopEvent| {
            // A closed receiver means the client went away; the run still completes
            let _ = events.send(sse_event(event.kind(), &event.data()));
        };

        let terminal = match service.send_message(&conversation_id, &message, &sink).await {
            Ok(result) => sse_event(
                "done",
                &serde_json::json!({
                    "final_response": result.final_text,
                    "geo_features": result.features,
                    "llm_history": result.history,
                    "usage": result.usage,
                }),
            ),
            Err(e) => {
                error!(conversation_id = %conversation_id, error = %e, "Agent run failed");
                sse_event("error", &serde_json::json!({ "error": e.to_string() }))
            }
        };
        let _ = tx.send(terminal);
    });

    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
