use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{bearer_token, events::event_stream, token_from, AppState};
use crate::chat::ChatMessage;
use crate::error::{AppError, AppResult};
use crate::manager::{ResumedSession, SendOutcome};
use crate::responder::{DisplayDirective, Intent};

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub conversation_id: Option<String>,
    pub content: Option<String>,
    pub intent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub conversation_id: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SendResponse {
    Reply(ReplyResponse),
    Status { status: &'static str },
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayDirective>,
}

pub(super) fn required<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{} is required", field)))
}

pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ResumedSession>> {
    let visitor = state.auth.authenticate(bearer_token(&headers)).await?;
    // No body means defaults; a body that is there must parse.
    let req: StartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("invalid request body: {}", e)))?
    };

    let session = state
        .manager
        .start_or_resume(&visitor, req.name.as_deref(), req.reset)
        .await?;
    Ok(Json(session))
}

pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendRequest>,
) -> AppResult<Json<SendResponse>> {
    let caller = state.auth.authenticate(bearer_token(&headers)).await?;
    let conversation_id = required(&req.conversation_id, "conversationId")?;
    let content = required(&req.content, "content")?;
    let intent = Intent::from_hint(req.intent.as_deref());

    let outcome = state
        .manager
        .send_visitor_message(&caller, conversation_id, content, intent)
        .await?;

    let body = match outcome {
        SendOutcome::Replied { message, display } => SendResponse::Reply(ReplyResponse {
            reply: message.content.clone(),
            message,
            display,
        }),
        SendOutcome::SentToOperator => SendResponse::Status {
            status: "sent_to_operator",
        },
    };
    Ok(Json(body))
}

pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConversationRequest>,
) -> AppResult<StatusCode> {
    let caller = state.auth.authenticate(bearer_token(&headers)).await?;
    let conversation_id = required(&req.conversation_id, "conversationId")?;

    state
        .manager
        .heartbeat(&caller, conversation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Live updates for one conversation: new messages and mode changes.
pub async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> AppResult<impl IntoResponse> {
    let caller = state
        .auth
        .authenticate(token_from(&headers, query.token.as_deref()))
        .await?;
    let conversation_id = required(&query.conversation_id, "conversationId")?.to_string();

    state
        .manager
        .conversation_for(&caller, state.auth.role(&caller), &conversation_id)
        .await?;

    let rx = state.bus.subscribe();
    Ok(event_stream(rx, move |event| {
        event.is_visitor_visible() && event.conversation_id() == conversation_id
    }))
}
