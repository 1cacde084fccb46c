//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{error_response, room_error_response};
use crate::{
    domain::RoomKey,
    infrastructure::dto::http::{RoomKind, RoomSummaryDto, StartResponseDto},
    runtime::RoomDirectory,
    ui::state::AppState,
    usecase::RoomBehavior,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of resident rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let circuits = state.documents.keys().await.into_iter().map(|key| RoomSummaryDto {
        key: key.as_str().to_string(),
        kind: RoomKind::Circuit,
    });
    let challenges = state.challenges.keys().await.into_iter().map(|key| RoomSummaryDto {
        key: key.as_str().to_string(),
        kind: RoomKind::Challenge,
    });

    Json(circuits.chain(challenges).collect())
}

/// Force a waiting challenge room into its countdown.
pub async fn start_challenge(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    let key = match RoomKey::new(session_id) {
        Ok(key) => key,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let Some(room) = state.challenges.get(&key).await else {
        return error_response(StatusCode::NOT_FOUND, format!("room '{key}' not found"));
    };

    match room.start().await {
        Ok(()) => {
            tracing::info!(room_key = %key, "Challenge started by administrator");
            Json(StartResponseDto {
                status: "countdown".to_string(),
            })
            .into_response()
        }
        Err(e) => {
            tracing::warn!(room_key = %key, "Start rejected: {}", e);
            room_error_response(&e)
        }
    }
}

/// Snapshot of a resident room. Never creates one.
pub(super) async fn room_snapshot<B: RoomBehavior>(
    directory: &RoomDirectory<B>,
    key: &RoomKey,
) -> Response {
    let Some(room) = directory.get(key).await else {
        return error_response(StatusCode::NOT_FOUND, format!("room '{key}' not found"));
    };

    match room.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => room_error_response(&e),
    }
}
