//! HTTP JSON API and SSE push channels.

mod admin;
mod auth;
mod chat;
mod content;
mod events;

use std::sync::Arc;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Authenticator;
use crate::bus::EventBus;
use crate::manager::ChatManager;

/// Everything a handler needs; built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ChatManager>,
    pub auth: Authenticator,
    pub bus: Arc<EventBus>,
}

impl AppState {
    pub fn new(manager: Arc<ChatManager>, auth: Authenticator, bus: Arc<EventBus>) -> Self {
        Self { manager, auth, bus }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // Identity
        .route("/auth/anonymous", post(auth::anonymous))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        // Visitor chat
        .route("/chat/start", post(chat::start))
        .route("/chat/send", post(chat::send))
        .route("/chat/heartbeat", post(chat::heartbeat))
        .route("/chat/events", get(chat::events))
        // Operator
        .route("/admin/takeover", post(admin::takeover))
        .route("/admin/release", post(admin::release))
        .route("/admin/send", post(admin::send))
        .route("/admin/conversations", get(admin::list_conversations))
        .route("/admin/conversations/:id/messages", get(admin::conversation_messages))
        .route("/admin/events", get(admin::events))
        // Portfolio content
        .route("/content/profile", get(content::profile))
        .route("/content/projects", get(content::projects))
        .route("/content/skills", get(content::skills))
        .route("/content/experiences", get(content::experiences))
        .route("/content/interests", get(content::interests))
        .route("/content/vision-cards", get(content::vision_cards))
        .route("/content/background-cards", get(content::background_cards))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// `Authorization: Bearer <token>`, if present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// SSE clients cannot set headers, so a `?token=` query value is accepted
/// as well; the header wins when both are present.
fn token_from<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    bearer_token(headers).or(query_token)
}
