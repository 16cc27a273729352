use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    dtos::{
        auth::{CurrentUserResponse, SignInRequest, SignInResponse, SignUpRequest, SignUpResponse},
        ErrorResponse, StatusResponse,
    },
    middleware::{AuthSession, AuthUser},
    services::ServiceError,
    utils::BoardJson,
    AppState,
};

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Registration received, pending approval", body = SignUpResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn sign_up(
    State(state): State<AppState>,
    BoardJson(req): BoardJson<SignUpRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = state.account_service.sign_up(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            success: true,
            message: "Registration received. The Council will review your answers.".to_string(),
            user_id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 400, description = "Missing credentials", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or account not active", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn sign_in(
    State(state): State<AppState>,
    BoardJson(req): BoardJson<SignInRequest>,
) -> Result<Json<SignInResponse>, ServiceError> {
    let (token, user) = state.account_service.sign_in(req).await?;

    Ok(Json(SignInResponse {
        success: true,
        message: "Authentication successful".to_string(),
        token,
        user: user.sanitized(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/signout",
    responses(
        (status = 200, description = "Signed out", body = StatusResponse),
        (status = 401, description = "Missing, revoked or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn sign_out(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Json<StatusResponse> {
    state.account_service.sign_out(&session).await;
    Json(StatusResponse::ok(
        "Successfully signed out. Return to the pasture safely.",
    ))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Missing, revoked or invalid token", body = ErrorResponse),
        (status = 403, description = "Account not active", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn current_user(AuthUser(identity): AuthUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        success: true,
        user: identity.user.sanitized(),
    })
}
