//! User identity record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ACTIVE: &str = "active";

pub const CLEARANCE_DEFAULT: &str = "LEVEL 1";
pub const CLEARANCE_ELEVATED: &str = "TOP SECRET";

/// Identity record keyed by lowercase email.
///
/// `status` is free-form: the approval tooling may write values other than
/// `pending`/`active` and only `active` unlocks the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub password_salt: String,
    pub status: String,
    pub clearance_level: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profile: RegistrationProfile,
}

/// Free-form registration metadata shown to the approving administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationProfile {
    pub first_name: String,
    pub last_name: String,
    pub cow_name: String,
    pub answers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<ProfilePicture>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePicture {
    pub data: String,
    pub name: String,
    pub content_type: String,
}

impl User {
    /// New registration awaiting approval.
    pub fn new(
        email: &str,
        password_hash: String,
        password_salt: String,
        profile: RegistrationProfile,
    ) -> Self {
        let email = email.trim().to_lowercase();
        Self {
            user_id: format!("user-{}", Uuid::new_v4()),
            username: email.clone(),
            email,
            password_hash,
            password_salt,
            status: STATUS_PENDING.to_string(),
            clearance_level: CLEARANCE_DEFAULT.to_string(),
            created_at: Utc::now(),
            last_login: None,
            profile,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn has_elevated_clearance(&self) -> bool {
        self.clearance_level == CLEARANCE_ELEVATED
    }

    /// Convert to sanitized response (no credential fields).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self)
    }
}

/// User as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub clearance_level: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.user_id.clone(),
            email: u.email.clone(),
            username: u.username.clone(),
            clearance_level: u.clearance_level.clone(),
            status: u.status.clone(),
            created_at: u.created_at,
            last_login: u.last_login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_pending_level_one() {
        let user = User::new(
            "  Cow@X.com ",
            "hash".to_string(),
            "salt".to_string(),
            RegistrationProfile::default(),
        );

        assert_eq!(user.email, "cow@x.com");
        assert_eq!(user.username, "cow@x.com");
        assert_eq!(user.status, STATUS_PENDING);
        assert_eq!(user.clearance_level, CLEARANCE_DEFAULT);
        assert!(user.user_id.starts_with("user-"));
        assert!(user.last_login.is_none());
        assert!(!user.is_active());
    }

    #[test]
    fn test_sanitized_omits_credentials() {
        let user = User::new(
            "cow@x.com",
            "hash".to_string(),
            "salt".to_string(),
            RegistrationProfile::default(),
        );
        let json = serde_json::to_value(user.sanitized()).unwrap();

        assert!(json.get("passwordHash").is_none());
        assert!(json.get("passwordSalt").is_none());
        assert_eq!(json["userId"], user.user_id);
    }
}
