use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{bearer_token, chat::required, events::event_stream, token_from, AppState};
use crate::chat::{ChatMessage, ConversationSummary, Mode};
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeRequest {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSendRequest {
    pub conversation_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub success: bool,
    pub mode: Mode,
}

#[derive(Debug, Serialize)]
pub struct OperatorSendResponse {
    pub message: ChatMessage,
    pub mode: Mode,
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
}

pub async fn takeover(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ModeRequest>,
) -> AppResult<Json<ModeResponse>> {
    let operator = state.auth.authenticate_owner(bearer_token(&headers)).await?;
    let conversation_id = required(&req.conversation_id, "conversationId")?;

    let mode = state.manager.takeover(&operator, conversation_id).await?;
    Ok(Json(ModeResponse { success: true, mode }))
}

pub async fn release(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ModeRequest>,
) -> AppResult<Json<ModeResponse>> {
    let operator = state.auth.authenticate_owner(bearer_token(&headers)).await?;
    let conversation_id = required(&req.conversation_id, "conversationId")?;

    let mode = state.manager.release(&operator, conversation_id).await?;
    Ok(Json(ModeResponse { success: true, mode }))
}

pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OperatorSendRequest>,
) -> AppResult<Json<OperatorSendResponse>> {
    let operator = state.auth.authenticate_owner(bearer_token(&headers)).await?;
    let conversation_id = required(&req.conversation_id, "conversationId")?;
    let content = required(&req.content, "content")?;

    let message = state
        .manager
        .send_operator_message(&operator, conversation_id, content)
        .await?;
    Ok(Json(OperatorSendResponse {
        message,
        mode: Mode::HumanControlled,
    }))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ConversationsResponse>> {
    state.auth.authenticate_owner(bearer_token(&headers)).await?;
    let conversations = state.manager.list_conversations().await?;
    Ok(Json(ConversationsResponse { conversations }))
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<MessagesResponse>> {
    state.auth.authenticate_owner(bearer_token(&headers)).await?;
    let messages = state.manager.conversation_messages(&id).await?;
    Ok(Json(MessagesResponse { messages }))
}

/// Every event on the bus, presence included.
pub async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> AppResult<impl IntoResponse> {
    state
        .auth
        .authenticate_owner(token_from(&headers, query.token.as_deref()))
        .await?;

    Ok(event_stream(state.bus.subscribe(), |_| true))
}
