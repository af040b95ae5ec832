use serde::{Deserialize, Serialize};

use crate::models::{User, UserSummary};

// -- JWT Claims --

/// Bearer token claims. The username is the only identity carried; `iat` and
/// `exp` are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub to_username: String,
    pub body: String,
}

/// `{message: ...}` wrapper used by every message endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub message: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesEnvelope<T> {
    pub messages: Vec<T>,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersEnvelope {
    pub users: Vec<UserSummary>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_rejects_unknown_fields() {
        let json = r#"{"username":"a","password":"b","first_name":"c","last_name":"d","phone":"e","admin":true}"#;
        assert!(serde_json::from_str::<RegisterRequest>(json).is_err());
    }

    #[test]
    fn error_body_shape() {
        let body = ErrorBody {
            error: ErrorDetail {
                message: "nope".into(),
                status: 401,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, serde_json::json!({"error": {"message": "nope", "status": 401}}));
    }
}
