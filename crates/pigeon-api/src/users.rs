use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use pigeon_types::api::{Claims, MessagesEnvelope, UserEnvelope, UsersEnvelope};

use crate::middleware::ensure_correct_user;
use crate::{ApiError, AppState};

/// GET /users — directory of everyone, any logged-in user may list it.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = state.with_db(|db| db.all_users()).await?;
    Ok(Json(UsersEnvelope { users }))
}

/// GET /users/{username}
pub async fn get_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_correct_user(&claims, &username)?;
    let user = state.with_db(move |db| db.get_user(&username)).await?;
    Ok(Json(UserEnvelope { user }))
}

/// GET /users/{username}/to — inbox.
pub async fn messages_to(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_correct_user(&claims, &username)?;
    let messages = state.with_db(move |db| db.messages_to(&username)).await?;
    Ok(Json(MessagesEnvelope { messages }))
}

/// GET /users/{username}/from — outbox.
pub async fn messages_from(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_correct_user(&claims, &username)?;
    let messages = state.with_db(move |db| db.messages_from(&username)).await?;
    Ok(Json(MessagesEnvelope { messages }))
}
