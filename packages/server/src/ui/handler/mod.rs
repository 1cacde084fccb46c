mod http;
mod websocket;

pub use http::{get_rooms, health_check, start_challenge};
pub use websocket::{challenge_room_handler, circuit_room_handler};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{domain::RoomError, infrastructure::dto::http::ErrorResponseDto};

/// Map a room's refusal onto an HTTP status with a JSON error body.
pub(crate) fn room_error_response(error: &RoomError) -> Response {
    let status = match error {
        RoomError::RoomFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RoomError::AlreadyStarted => StatusCode::CONFLICT,
        RoomError::Unsupported(_) => StatusCode::BAD_REQUEST,
        RoomError::RoomClosed | RoomError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.to_string())
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorResponseDto {
        error: message.into(),
    };
    (status, Json(body)).into_response()
}
