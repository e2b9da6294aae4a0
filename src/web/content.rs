//! Read-only portfolio content. Never fails: empty or broken tables fall
//! back to samples.

use axum::{extract::State, Json};

use super::AppState;
use crate::content::{Card, CardKind, Experience, Profile, Project, Skill};

pub async fn profile(State(state): State<AppState>) -> Json<Profile> {
    Json(state.manager.content().profile().await)
}

pub async fn projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.manager.content().projects().await)
}

pub async fn skills(State(state): State<AppState>) -> Json<Vec<Skill>> {
    Json(state.manager.content().skills().await)
}

pub async fn experiences(State(state): State<AppState>) -> Json<Vec<Experience>> {
    Json(state.manager.content().experiences().await)
}

pub async fn interests(State(state): State<AppState>) -> Json<Vec<Card>> {
    Json(state.manager.content().cards(CardKind::Interest).await)
}

pub async fn vision_cards(State(state): State<AppState>) -> Json<Vec<Card>> {
    Json(state.manager.content().cards(CardKind::Vision).await)
}

pub async fn background_cards(State(state): State<AppState>) -> Json<Vec<Card>> {
    Json(state.manager.content().cards(CardKind::Background).await)
}
