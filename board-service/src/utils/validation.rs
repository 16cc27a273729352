use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::ValidateEmail;

use crate::services::ServiceError;

/// JSON body extractor that reports malformed payloads as `INVALID_JSON`.
pub struct BoardJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for BoardJson<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServiceError::InvalidJson(e.body_text()))?;

        Ok(BoardJson(value))
    }
}

/// Syntactic email check used at registration.
pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

/// At least 8 characters with an uppercase letter, a lowercase letter and a digit.
pub fn check_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !(has_upper && has_lower && has_digit) {
        return Err("Password must contain uppercase, lowercase, and digit".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("Password123").is_ok());
        assert!(check_password_strength("Pass1").is_err());
        assert!(check_password_strength("password123").is_err());
        assert!(check_password_strength("PASSWORD123").is_err());
        assert!(check_password_strength("Passwordabc").is_err());
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("cow@x.com"));
        assert!(!is_valid_email("cow.x.com"));
        assert!(!is_valid_email("cow@"));
    }
}
