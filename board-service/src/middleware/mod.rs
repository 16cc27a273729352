pub mod auth;

pub use auth::{require_account, require_active_account, require_session, AuthSession, AuthUser};
