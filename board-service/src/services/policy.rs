//! Message authorization rules.

use crate::models::{Message, User};

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    /// Authors may delete their own messages; elevated clearance may delete any.
    ///
    /// Clearance is read from the live record, not from the session token.
    pub fn can_delete(user: &User, message: &Message) -> bool {
        message.user_id == user.user_id || user.has_elevated_clearance()
    }
}
