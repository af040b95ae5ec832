use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use pigeon_db::DbError;
use pigeon_types::api::{ErrorBody, ErrorDetail};
use thiserror::Error;
use tracing::error;

/// Every failure a handler can return. Rendered as
/// `{"error": {"message": ..., "status": ...}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(cause) => {
                error!("Internal error: {}", cause);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                message,
                status: status.as_u16(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Give bare error responses produced outside the handlers (405 from routing,
/// 408 from the timeout layer) the same JSON body as `ApiError`. Status and
/// headers such as `Allow` are kept.
pub async fn ensure_json_error(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error())
        || response.headers().contains_key(header::CONTENT_TYPE)
    {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let body = ErrorBody {
        error: ErrorDetail {
            message: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
        },
    };
    let (json_parts, json_body) = Json(body).into_response().into_parts();

    parts.headers.remove(header::CONTENT_LENGTH);
    if let Some(content_type) = json_parts.headers.get(header::CONTENT_TYPE) {
        parts.headers.insert(header::CONTENT_TYPE, content_type.clone());
    }
    Response::from_parts(parts, json_body)
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            DbError::AlreadyExists(what) => ApiError::BadRequest(format!("{what} taken")),
            DbError::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_to_statuses() {
        let cases = [
            (DbError::NotFound("message 1".into()), StatusCode::NOT_FOUND),
            (DbError::AlreadyExists("bob".into()), StatusCode::BAD_REQUEST),
            (DbError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
            (DbError::LockPoisoned("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (db_err, expected) in cases {
            assert_eq!(ApiError::from(db_err).status(), expected);
        }
    }

    #[test]
    fn duplicate_username_message() {
        let err = ApiError::from(DbError::AlreadyExists("bob".into()));
        assert_eq!(err.to_string(), "bob taken");
    }

    #[tokio::test]
    async fn bare_timeout_gets_json_body() {
        let bare = StatusCode::REQUEST_TIMEOUT.into_response();
        let response = ensure_json_error(bare).await;

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn json_and_success_responses_untouched() {
        let ok = ensure_json_error(StatusCode::NO_CONTENT.into_response()).await;
        assert_eq!(ok.status(), StatusCode::NO_CONTENT);
        assert!(ok.headers().get(header::CONTENT_TYPE).is_none());

        let api = ensure_json_error(ApiError::NotFound("x".into()).into_response()).await;
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let response = ApiError::Internal("secret path /var/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
