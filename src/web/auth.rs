use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::{bearer_token, AppState};
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousResponse {
    pub token: String,
    pub visitor_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub identity_id: String,
}

pub async fn anonymous(State(state): State<AppState>) -> AppResult<Json<AnonymousResponse>> {
    let session = state.auth.issue_anonymous().await?;
    Ok(Json(AnonymousResponse {
        token: session.token,
        visitor_id: session.identity.id,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }
    let session = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        identity_id: session.identity.id,
    }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<StatusCode> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    state.auth.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}
