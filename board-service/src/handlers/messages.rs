use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    dtos::{
        messages::{ListMessagesQuery, ListMessagesResponse, PostMessageRequest, PostMessageResponse},
        ErrorResponse, StatusResponse,
    },
    middleware::AuthUser,
    services::ServiceError,
    utils::BoardJson,
    AppState,
};

#[utoipa::path(
    get,
    path = "/messages",
    params(ListMessagesQuery),
    responses(
        (status = 200, description = "Messages, newest first", body = ListMessagesResponse),
        (status = 401, description = "Missing, revoked or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<ListMessagesResponse>, ServiceError> {
    let page = state
        .message_service
        .list(query.page_size(), query.cursor())
        .await?;

    Ok(Json(ListMessagesResponse {
        success: true,
        messages: page.messages,
        last_key: page.last_key,
    }))
}

#[utoipa::path(
    post,
    path = "/messages",
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message posted", body = PostMessageResponse),
        (status = 400, description = "Missing or oversized content", body = ErrorResponse),
        (status = 401, description = "Missing, revoked or invalid token", body = ErrorResponse),
        (status = 403, description = "Account not active", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn post_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    BoardJson(req): BoardJson<PostMessageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let message = state
        .message_service
        .post(&identity, req.content.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PostMessageResponse {
            success: true,
            message,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/messages/{message_id}",
    params(("message_id" = String, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message deleted", body = StatusResponse),
        (status = 401, description = "Missing, revoked or invalid token", body = ErrorResponse),
        (status = 403, description = "Not the author and not elevated", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state
        .message_service
        .delete(&identity, &message_id)
        .await?;

    Ok(Json(StatusResponse::ok("Message deleted successfully")))
}
