//! Bearer-token authentication shared by every protected route.
//!
//! Checks run in a fixed order and stop at the first failure:
//! header shape, revocation, signature and expiry, identity lookup,
//! account status.

use axum::http::{header, HeaderMap};
use std::sync::Arc;

use crate::models::User;
use crate::services::error::ServiceError;
use crate::services::jwt::{SessionClaims, SessionTokenCodec};
use crate::services::revocation::RevocationLedger;
use crate::services::store::UserStore;

/// Account status a route demands once the token is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRequirement {
    /// Any registered account, whatever its status.
    Any,
    /// Only accounts with status `active`.
    Active,
}

/// A token that passed the revocation and signature checks.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub token: String,
    pub claims: SessionClaims,
}

/// Authenticated caller: live identity record plus the token it presented.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub claims: SessionClaims,
    pub token: String,
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The value must split on whitespace into exactly two parts and the scheme
/// is matched case-insensitively.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let (scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

#[derive(Clone)]
pub struct Authenticator {
    ledger: Arc<dyn RevocationLedger>,
    codec: Arc<SessionTokenCodec>,
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(
        ledger: Arc<dyn RevocationLedger>,
        codec: Arc<SessionTokenCodec>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            ledger,
            codec,
            users,
        }
    }

    /// Token-only checks: header, revocation, signature and expiry.
    pub async fn verify_bearer(&self, headers: &HeaderMap) -> Result<VerifiedToken, ServiceError> {
        let token = extract_bearer(headers).ok_or(ServiceError::MissingToken)?;

        // A ledger we cannot read must not let a revoked token through.
        let revoked = self.ledger.is_revoked(token).await.map_err(|e| {
            tracing::error!(error = %e, "Revocation ledger lookup failed");
            ServiceError::Internal(e)
        })?;
        if revoked {
            metrics::counter!("board_auth_failures_total", "code" => "TOKEN_BLACKLISTED")
                .increment(1);
            return Err(ServiceError::TokenBlacklisted);
        }

        self.verify_signature(token)
    }

    /// Header, signature and expiry only; the ledger is not consulted.
    ///
    /// Sign-out uses this so that revoking an already-revoked token is a
    /// repeatable success.
    pub fn decode_bearer(&self, headers: &HeaderMap) -> Result<VerifiedToken, ServiceError> {
        let token = extract_bearer(headers).ok_or(ServiceError::MissingToken)?;
        self.verify_signature(token)
    }

    fn verify_signature(&self, token: &str) -> Result<VerifiedToken, ServiceError> {
        let claims = self.codec.verify(token).map_err(|e| {
            tracing::debug!(reason = %e, "Rejected session token");
            metrics::counter!("board_auth_failures_total", "code" => "INVALID_TOKEN").increment(1);
            ServiceError::InvalidToken(e)
        })?;

        Ok(VerifiedToken {
            token: token.to_string(),
            claims,
        })
    }

    /// Full authentication: token checks, then the live identity record.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        requirement: AccountRequirement,
    ) -> Result<Identity, ServiceError> {
        let VerifiedToken { token, claims } = self.verify_bearer(headers).await?;

        let user = self
            .users
            .find_by_email(&claims.email)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        if requirement == AccountRequirement::Active && !user.is_active() {
            tracing::debug!(user_id = %user.user_id, status = %user.status, "Account not active");
            return Err(ServiceError::AccountNotActive {
                status: user.status.clone(),
                at_sign_in: false,
            });
        }

        Ok(Identity {
            user,
            claims,
            token,
        })
    }
}
