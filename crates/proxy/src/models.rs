//! Models listing handler.

use axum::{Json, extract::State};
use relaygate_provider::{ModelList, ModelRouter};
use std::sync::Arc;

use crate::AppState;

/// Handles `GET /models`: every alias plus the fallback sentinel.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(ModelRouter::new(&state.config.load()).models())
}
