use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::{
    services::{AccountRequirement, Identity, ServiceError, VerifiedToken},
    AppState,
};

async fn authenticate(
    state: &AppState,
    mut req: Request,
    next: Next,
    requirement: AccountRequirement,
) -> Result<Response, ServiceError> {
    let identity = state
        .authenticator
        .authenticate(req.headers(), requirement)
        .await?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Require a valid session for an account with status `active`.
pub async fn require_active_account(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    authenticate(&state, req, next, AccountRequirement::Active).await
}

/// Require a valid session for any registered account.
pub async fn require_account(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    authenticate(&state, req, next, AccountRequirement::Any).await
}

/// Require a correctly signed, unexpired token. Neither the ledger nor the
/// account is consulted, so a repeated sign-out still succeeds.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let session = state.authenticator.decode_bearer(req.headers())?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Identity placed in the request by `require_active_account` or `require_account`.
pub struct AuthUser(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("Identity missing from request extensions"))
        })?;

        Ok(AuthUser(identity.clone()))
    }
}

/// Token placed in the request by `require_session`.
pub struct AuthSession(pub VerifiedToken);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<VerifiedToken>().ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!("Session missing from request extensions"))
        })?;

        Ok(AuthSession(session.clone()))
    }
}
