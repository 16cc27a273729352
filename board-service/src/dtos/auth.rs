use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::models::UserResponse;

/// Registration form. Every field is optional on the wire so that missing
/// values surface as `MISSING_FIELDS` rather than a JSON rejection.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    #[schema(example = "newcow@cow.com")]
    pub email: Option<String>,
    #[schema(example = "StrongPassword123")]
    pub password: Option<String>,
    #[schema(example = "John")]
    pub first_name: Option<String>,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
    #[schema(example = "Thunder Hooves")]
    pub cow_name: Option<String>,
    /// Base64 data URL.
    pub profile_picture: Option<String>,
    #[schema(example = "photo.png")]
    pub profile_picture_name: Option<String>,
    #[schema(example = "image/png")]
    pub profile_picture_type: Option<String>,
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub success: bool,
    #[schema(example = "Registration received. The Council will review your answers.")]
    pub message: String,
    #[schema(example = "user-550e8400-e29b-41d4-a716-446655440000")]
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SignInRequest {
    #[schema(example = "admin@cow.com")]
    pub email: Option<String>,
    #[schema(example = "StrongPassword123")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignInResponse {
    pub success: bool,
    #[schema(example = "Authentication successful")]
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUserResponse {
    pub success: bool,
    pub user: UserResponse,
}
