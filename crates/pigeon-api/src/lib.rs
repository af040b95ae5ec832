pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod policy;
pub mod router;
pub mod token;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::{ApiError, ensure_json_error};
pub use router::router;
