use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::User;

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    /// Clearance at issue time; may lag the live record.
    pub clearance_level: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Malformed(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Issues and verifies HS256 session tokens with a process-wide secret.
///
/// The secret has no version tag; replacing it invalidates every token
/// issued under the old one.
#[derive(Clone)]
pub struct SessionTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl SessionTokenCodec {
    pub fn new(secret: &Secret<String>, lifetime_hours: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        tracing::info!(lifetime_hours, "Session token codec initialized with HS256");

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime: Duration::hours(lifetime_hours),
        }
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    /// Issue a token for `user`, valid from now for the configured lifetime.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = SessionClaims {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            clearance_level: user.clearance_level.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check the signature, then expiry, against the current time.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is judged below against `now`, with no leeway.
        validation.validate_exp = false;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;

        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RegistrationProfile, CLEARANCE_ELEVATED};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn codec() -> SessionTokenCodec {
        SessionTokenCodec::new(&Secret::new("test-secret".to_string()), 24)
    }

    fn user() -> User {
        User::new(
            "cow@x.com",
            "hash".to_string(),
            "salt".to_string(),
            RegistrationProfile::default(),
        )
    }

    /// Rewrite the payload segment, keeping the original signature.
    fn tamper(token: &str, from: &str, to: &str) -> String {
        let parts: Vec<&str> = token.split('.').collect();
        let payload = String::from_utf8(URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert!(payload.contains(from));
        let forged = URL_SAFE_NO_PAD.encode(payload.replacen(from, to, 1));
        format!("{}.{}.{}", parts[0], forged, parts[2])
    }

    #[test]
    fn test_issue_and_verify() -> Result<(), TokenError> {
        let user = user();
        let token = codec().issue(&user)?;

        let claims = codec().verify(&token)?;
        assert_eq!(claims.user_id, user.user_id);
        assert_eq!(claims.email, "cow@x.com");
        assert_eq!(claims.clearance_level, "LEVEL 1");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
        Ok(())
    }

    #[test]
    fn test_expired_after_lifetime() -> Result<(), TokenError> {
        let issued = Utc::now() - Duration::hours(48);
        let token = codec().issue_at(&user(), issued)?;

        let at_expiry = issued + Duration::hours(24);
        assert!(codec().verify_at(&token, at_expiry).is_ok());

        let just_after = at_expiry + Duration::seconds(1);
        assert_eq!(
            codec().verify_at(&token, just_after),
            Err(TokenError::Expired)
        );
        assert_eq!(codec().verify(&token), Err(TokenError::Expired));
        Ok(())
    }

    #[test]
    fn test_altered_claim_is_malformed() -> Result<(), TokenError> {
        let token = codec().issue(&user())?;

        let forged = tamper(&token, "LEVEL 1", "LEVEL 9");
        assert!(matches!(
            codec().verify(&forged),
            Err(TokenError::Malformed(_))
        ));

        let elevated = tamper(&token, "LEVEL 1", CLEARANCE_ELEVATED);
        assert!(matches!(
            codec().verify(&elevated),
            Err(TokenError::Malformed(_))
        ));
        Ok(())
    }

    #[test]
    fn test_other_secret_is_malformed() -> Result<(), TokenError> {
        let token = codec().issue(&user())?;
        let rotated = SessionTokenCodec::new(&Secret::new("rotated".to_string()), 24);

        assert!(matches!(
            rotated.verify(&token),
            Err(TokenError::Malformed(_))
        ));
        Ok(())
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            codec().verify("abc"),
            Err(TokenError::Malformed(_))
        ));
    }
}
