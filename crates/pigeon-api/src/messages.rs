use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::warn;

use pigeon_types::api::{Claims, MessageEnvelope, SendMessageRequest};

use crate::{ApiError, AppState, policy};

/// GET /messages/{id} — sender or recipient only.
pub async fn get_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.with_db(move |db| db.get_message(id)).await?;

    if !policy::can_view(&claims.username, &message) {
        warn!("{} denied read of message {}", claims.username, id);
        return Err(ApiError::Unauthorized("Not authorized to see this message".into()));
    }

    Ok(Json(MessageEnvelope { message }))
}

/// POST /messages — the sender is always the caller.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .with_db(move |db| db.create_message(&claims.username, &req.to_username, &req.body))
        .await?;

    Ok((StatusCode::CREATED, Json(MessageEnvelope { message })))
}

/// POST /messages/{id}/read — recipient only. Marking twice keeps the first
/// timestamp.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.with_db(move |db| db.get_message(id)).await?;

    if !policy::can_mark_read(&claims.username, &message) {
        warn!("{} denied mark-read of message {}", claims.username, id);
        return Err(ApiError::Unauthorized("Not authorized to mark this message as read".into()));
    }

    let receipt = state.with_db(move |db| db.mark_read(id)).await?;

    Ok(Json(MessageEnvelope { message: receipt }))
}
