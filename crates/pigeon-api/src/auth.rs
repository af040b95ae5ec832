use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{error, info, warn};

use pigeon_db::{Database, DbError, users::NewUser};
use pigeon_types::api::{LoginRequest, RegisterRequest, TokenResponse};

use crate::ApiError;
use crate::token::TokenIssuer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenIssuer,
}

impl AppStateInner {
    /// Run a store call on the blocking pool so a slow query never stalls
    /// other requests on the runtime.
    pub async fn with_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.to_string())
            })?
            .map_err(ApiError::from)
    }
}

/// POST /auth/register — create the account and log it in.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .with_db(move |db| {
            db.register(&NewUser {
                username: &req.username,
                password: &req.password,
                first_name: &req.first_name,
                last_name: &req.last_name,
                phone: &req.phone,
            })
        })
        .await?;

    let token = state.tokens.issue(&user.username)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// POST /auth/login — wrong password and unknown user look the same.
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();

    let valid = state
        .with_db(move |db| {
            if !db.authenticate(&req.username, &req.password)? {
                return Ok(false);
            }
            db.record_login(&req.username)?;
            Ok(true)
        })
        .await?;

    if !valid {
        warn!("Failed login for {}", username);
        return Err(ApiError::Unauthorized("Invalid username/password".into()));
    }

    let token = state.tokens.issue(&username)?;
    info!("{} logged in", username);

    Ok(Json(TokenResponse { token }))
}
