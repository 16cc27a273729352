use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::dtos::ErrorResponse;
use crate::services::jwt::TokenError;
use crate::utils::CredentialError;

/// Every failure a board handler can report, each with a stable result code.
#[derive(Error, Debug)]
pub enum ServiceError {
    // Client input
    #[error("{0}")]
    InvalidJson(String),

    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Email, password, first name, last name, and cow name are required")]
    MissingFields,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("{0}")]
    WeakPassword(String),

    #[error("All security questions must be answered")]
    IncompleteAnswers,

    #[error("Message content is required")]
    MissingContent,

    #[error("Message content exceeds {0} characters")]
    ContentTooLong(usize),

    // Authentication / authorization
    #[error("No authorization token provided")]
    MissingToken,

    #[error("Token has been invalidated")]
    TokenBlacklisted,

    #[error("{0}")]
    InvalidToken(TokenError),

    #[error("User not authorized or account pending Council approval")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Account is {status}. Please contact the Council.")]
    AccountNotActive { status: String, at_sign_in: bool },

    #[error("Not authorized to delete this message")]
    Forbidden,

    // Resource state
    #[error("A cow with this email is already grazing in our pasture")]
    UserExists,

    #[error("Message not found")]
    MessageNotFound,

    // Internal
    #[error("Stored credential is corrupt: {0}")]
    CorruptCredential(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Result code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidJson(_) => "INVALID_JSON",
            ServiceError::MissingCredentials => "MISSING_CREDENTIALS",
            ServiceError::MissingFields => "MISSING_FIELDS",
            ServiceError::InvalidEmail => "INVALID_EMAIL",
            ServiceError::WeakPassword(_) => "WEAK_PASSWORD",
            ServiceError::IncompleteAnswers => "INCOMPLETE_ANSWERS",
            ServiceError::MissingContent => "MISSING_CONTENT",
            ServiceError::ContentTooLong(_) => "CONTENT_TOO_LONG",
            ServiceError::MissingToken => "MISSING_TOKEN",
            ServiceError::TokenBlacklisted => "TOKEN_BLACKLISTED",
            ServiceError::InvalidToken(_) => "INVALID_TOKEN",
            ServiceError::InvalidCredentials => "INVALID_CREDENTIALS",
            ServiceError::UserNotFound => "USER_NOT_FOUND",
            ServiceError::AccountNotActive { .. } => "ACCOUNT_NOT_ACTIVE",
            ServiceError::Forbidden => "FORBIDDEN",
            ServiceError::UserExists => "USER_EXISTS",
            ServiceError::MessageNotFound => "MESSAGE_NOT_FOUND",
            ServiceError::CorruptCredential(_) => "CORRUPT_CREDENTIAL",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidJson(_)
            | ServiceError::MissingCredentials
            | ServiceError::MissingFields
            | ServiceError::InvalidEmail
            | ServiceError::WeakPassword(_)
            | ServiceError::IncompleteAnswers
            | ServiceError::MissingContent
            | ServiceError::ContentTooLong(_) => StatusCode::BAD_REQUEST,
            ServiceError::MissingToken
            | ServiceError::TokenBlacklisted
            | ServiceError::InvalidToken(_)
            | ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServiceError::AccountNotActive { at_sign_in: true, .. } => StatusCode::UNAUTHORIZED,
            ServiceError::AccountNotActive { .. } | ServiceError::Forbidden => {
                StatusCode::FORBIDDEN
            }
            ServiceError::UserNotFound | ServiceError::MessageNotFound => StatusCode::NOT_FOUND,
            ServiceError::UserExists => StatusCode::CONFLICT,
            ServiceError::CorruptCredential(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<CredentialError> for ServiceError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Corrupt(e) => ServiceError::CorruptCredential(e),
            CredentialError::EntropyUnavailable(e) => {
                ServiceError::Internal(anyhow::anyhow!("entropy source unavailable: {}", e))
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Only client-facing messages leave the service; internals stay in the log.
        let error = match &self {
            ServiceError::Internal(e) => {
                tracing::error!(error = ?e, code, "Request failed");
                "Internal server error".to_string()
            }
            ServiceError::CorruptCredential(e) => {
                tracing::error!(error = %e, code, "Stored credential could not be decoded");
                "Internal server error".to_string()
            }
            other => {
                tracing::debug!(code, "Request rejected");
                other.to_string()
            }
        };

        metrics::counter!("board_request_errors_total", "code" => code).increment(1);

        (
            status,
            Json(ErrorResponse {
                success: false,
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_not_active_status_depends_on_operation() {
        let sign_in = ServiceError::AccountNotActive {
            status: "pending".to_string(),
            at_sign_in: true,
        };
        let elsewhere = ServiceError::AccountNotActive {
            status: "pending".to_string(),
            at_sign_in: false,
        };

        assert_eq!(sign_in.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(elsewhere.status(), StatusCode::FORBIDDEN);
        assert_eq!(sign_in.code(), elsewhere.code());
    }

    #[test]
    fn test_token_failures_are_distinguished() {
        assert_eq!(ServiceError::MissingToken.code(), "MISSING_TOKEN");
        assert_eq!(ServiceError::TokenBlacklisted.code(), "TOKEN_BLACKLISTED");
        assert_eq!(
            ServiceError::InvalidToken(TokenError::Expired).code(),
            "INVALID_TOKEN"
        );
    }

    #[test]
    fn test_corrupt_credential_maps_to_500() {
        let err: ServiceError = CredentialError::Corrupt("salt".to_string()).into();
        assert_eq!(err.code(), "CORRUPT_CREDENTIAL");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
