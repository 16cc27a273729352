pub mod auth;
pub mod messages;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = false)]
    pub success: bool,
    #[schema(example = "No authorization token provided")]
    pub error: String,
    #[schema(example = "MISSING_TOKEN")]
    pub code: String,
}

/// Plain `{success, message}` acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Message deleted successfully")]
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
