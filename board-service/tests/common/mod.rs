//! Shared setup for board-service integration tests.
//!
//! Builds the full router over in-memory backends and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use board_service::{
    build_router,
    config::{
        BoardConfig, CredentialConfig, Environment, RevocationConfig, SecurityConfig,
        StoreBackend, StoreConfig, TokenConfig, MIN_KDF_ITERATIONS,
    },
    models::{RegistrationProfile, User},
    services::{
        AdminNotifier, InMemoryRevocationLedger, MemoryStore, MockNotifier, RevocationLedger,
        SessionTokenCodec, UserStore,
    },
    AppState,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "Password123";

pub fn test_config() -> BoardConfig {
    BoardConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "board-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreConfig {
            backend: StoreBackend::Memory,
            redis_url: Secret::new(String::new()),
        },
        token: TokenConfig {
            secret: Secret::new(TEST_SECRET.to_string()),
            lifetime_hours: 24,
        },
        credentials: CredentialConfig {
            kdf_iterations: MIN_KDF_ITERATIONS,
        },
        revocation: RevocationConfig {
            sweep_interval_seconds: 300,
        },
        security: SecurityConfig {
            allowed_origins: vec!["*".to_string()],
        },
        notification: None,
    }
}

/// Ledger whose writes always fail; reads report nothing revoked.
#[derive(Default)]
pub struct FailingLedger;

#[async_trait]
impl RevocationLedger for FailingLedger {
    async fn revoke(&self, _token: &str, _token_exp: i64) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("ledger write refused"))
    }

    async fn is_revoked(&self, _token: &str) -> Result<bool, anyhow::Error> {
        Ok(false)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<dyn RevocationLedger>,
    pub notifier: Arc<MockNotifier>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_ledger(Arc::new(InMemoryRevocationLedger::new()))
    }

    pub fn with_ledger(ledger: Arc<dyn RevocationLedger>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(MockNotifier::default());

        let state = AppState::new(
            test_config(),
            store.clone(),
            store.clone(),
            ledger.clone(),
            notifier.clone() as Arc<dyn AdminNotifier>,
        );

        Self {
            router: build_router(state),
            store,
            ledger,
            notifier,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    pub async fn sign_up(&self, email: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/auth/signup",
            None,
            Some(signup_body(email, TEST_PASSWORD)),
        )
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/auth/signin",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Approve the account the way the external approval tooling does.
    pub async fn activate(&self, email: &str) {
        self.set_status(email, "active").await;
    }

    pub async fn set_status(&self, email: &str, status: &str) {
        assert!(self.store.set_status(email, status).await.unwrap());
    }

    pub async fn user(&self, email: &str) -> User {
        self.store.find_by_email(email).await.unwrap().unwrap()
    }

    /// Correctly signed token for an email that never registered.
    pub fn token_for_unregistered(&self, email: &str) -> String {
        let user = User::new(
            email,
            "hash".to_string(),
            "salt".to_string(),
            RegistrationProfile::default(),
        );
        codec().issue(&user).unwrap()
    }

    /// Correctly signed token that expired a day ago.
    pub async fn expired_token_for(&self, email: &str) -> String {
        let user = self.user(email).await;
        codec()
            .issue_at(&user, Utc::now() - Duration::hours(48))
            .unwrap()
    }

    pub async fn set_clearance(&self, email: &str, clearance: &str) {
        let mut user = self.user(email).await;
        user.clearance_level = clearance.to_string();
        self.store.upsert_user(user);
    }

    /// Register, activate and sign in; returns the session token.
    pub async fn active_user(&self, email: &str) -> String {
        assert_eq!(self.sign_up(email).await.status, StatusCode::CREATED);
        self.activate(email).await;
        let response = self.sign_in(email, TEST_PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["token"].as_str().unwrap().to_string()
    }

    pub async fn post_message(&self, token: &str, content: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/messages",
            Some(token),
            Some(json!({ "content": content })),
        )
        .await
    }
}

pub fn codec() -> SessionTokenCodec {
    SessionTokenCodec::new(&Secret::new(TEST_SECRET.to_string()), 24)
}

pub fn signup_body(email: &str, password: &str) -> Value {
    json!({
        "email": email,
        "password": password,
        "firstName": "Bessie",
        "lastName": "Moo",
        "cowName": "Thunder Hooves",
        "answers": {
            "q1": "Kentucky Bluegrass",
            "q2": "Four",
            "q3": "divine",
            "q4": "A sunny pasture"
        }
    })
}
