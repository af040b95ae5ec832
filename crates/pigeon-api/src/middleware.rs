use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;
use tracing::{debug, warn};

use pigeon_types::api::Claims;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    #[serde(rename = "_token")]
    token: Option<String>,
}

/// Bind the caller's identity to the request when a valid token is present.
/// Requests without one pass through unauthenticated; `require_auth` decides
/// whether that is acceptable.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(&req) {
        match state.tokens.verify(&token) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(e) => debug!("Ignoring bad token: {}", e),
        }
    }
    next.run(req).await
}

/// Reject requests that did not carry a valid token.
pub async fn require_auth(req: Request, next: Next) -> Result<Response, ApiError> {
    if req.extensions().get::<Claims>().is_none() {
        return Err(ApiError::Unauthorized("Login required".into()));
    }
    Ok(next.run(req).await)
}

/// The logged-in user must be `username`.
pub fn ensure_correct_user(claims: &Claims, username: &str) -> Result<(), ApiError> {
    if claims.username != username {
        warn!("{} tried to access {}'s account", claims.username, username);
        return Err(ApiError::Unauthorized("Not authorized for this user".into()));
    }
    Ok(())
}

/// `Authorization: Bearer` header first, `?_token=` query parameter second.
fn bearer_token(req: &Request) -> Option<String> {
    if let Some(auth) = req.headers().typed_get::<Authorization<Bearer>>() {
        return Some(auth.token().to_string());
    }

    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    fn claims_for(username: &str) -> Claims {
        Claims {
            username: username.to_string(),
            iat: 0,
            exp: usize::MAX,
        }
    }

    #[test]
    fn correct_user_check() {
        let claims = claims_for("test1");
        assert!(ensure_correct_user(&claims, "test1").is_ok());
        assert!(matches!(
            ensure_correct_user(&claims, "test2"),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn token_from_header() {
        let req = http::Request::builder()
            .uri("/messages/1")
            .header("Authorization", "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn token_from_query() {
        let req = http::Request::builder()
            .uri("/messages/1?_token=abc.def.ghi&x=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn no_token() {
        let req = http::Request::builder()
            .uri("/messages/1")
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), None);
    }
}
