pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::BoardConfig;
use crate::services::{
    AccountService, AdminNotifier, Authenticator, MessageService, MessageStore, RevocationLedger,
    SessionTokenCodec, UserStore,
};
use crate::utils::CredentialHasher;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::sign_up,
        handlers::auth::sign_in,
        handlers::auth::sign_out,
        handlers::auth::current_user,
        handlers::messages::list_messages,
        handlers::messages::post_message,
        handlers::messages::delete_message,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::StatusResponse,
            dtos::auth::SignUpRequest,
            dtos::auth::SignUpResponse,
            dtos::auth::SignInRequest,
            dtos::auth::SignInResponse,
            dtos::auth::CurrentUserResponse,
            dtos::messages::PostMessageRequest,
            dtos::messages::PostMessageResponse,
            dtos::messages::ListMessagesResponse,
            models::Message,
            models::UserResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and bearer sessions"),
        (name = "Messages", description = "Message board"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: BoardConfig,
    pub users: Arc<dyn UserStore>,
    pub ledger: Arc<dyn RevocationLedger>,
    pub authenticator: Authenticator,
    pub account_service: AccountService,
    pub message_service: MessageService,
}

impl AppState {
    /// Wire the services over the given backends.
    pub fn new(
        config: BoardConfig,
        users: Arc<dyn UserStore>,
        messages: Arc<dyn MessageStore>,
        ledger: Arc<dyn RevocationLedger>,
        notifier: Arc<dyn AdminNotifier>,
    ) -> Self {
        let codec = Arc::new(SessionTokenCodec::new(
            &config.token.secret,
            config.token.lifetime_hours,
        ));
        let hasher = CredentialHasher::new(config.credentials.kdf_iterations);

        let authenticator = Authenticator::new(ledger.clone(), codec.clone(), users.clone());
        let account_service =
            AccountService::new(users.clone(), ledger.clone(), codec, hasher, notifier);
        let message_service = MessageService::new(messages);

        Self {
            config,
            users,
            ledger,
            authenticator,
            account_service,
            message_service,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_router(state: AppState) -> Router {
    let active = || from_fn_with_state(state.clone(), middleware::require_active_account);
    let registered = || from_fn_with_state(state.clone(), middleware::require_account);

    // Posting needs an active account; reading and deleting only a registered one.
    let message_routes = Router::new()
        .route(
            "/messages",
            get(handlers::messages::list_messages)
                .layer(registered())
                .merge(post(handlers::messages::post_message).layer(active())),
        )
        .route(
            "/messages/:message_id",
            delete(handlers::messages::delete_message).layer(registered()),
        );

    let session_routes = Router::new()
        .route(
            "/auth/signout",
            post(handlers::auth::sign_out).layer(from_fn_with_state(
                state.clone(),
                middleware::require_session,
            )),
        )
        .route(
            "/auth/me",
            get(handlers::auth::current_user).layer(active()),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/signup", post(handlers::auth::sign_up))
        .route("/auth/signin", post(handlers::auth::sign_in))
        .merge(session_routes)
        .merge(message_routes)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.users.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    state.ledger.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation ledger health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up",
            "revocation": "up"
        }
    })))
}
