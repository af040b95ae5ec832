use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::{authenticate, require_auth};
use crate::{ApiError, AppState, auth, ensure_json_error, messages, users};

/// All API routes. Transport-level layers (tracing, CORS, timeouts) are the
/// binary's business.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .route("/users", get(users::list_users))
        .route("/users/{username}", get(users::get_user))
        .route("/users/{username}/to", get(users::messages_to))
        .route("/users/{username}/from", get(users::messages_from))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(|| async { ApiError::NotFound("No such route".into()) })
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(middleware::map_response(ensure_json_error))
        .with_state(state)
}
