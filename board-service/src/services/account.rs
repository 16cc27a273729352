use chrono::Utc;
use std::sync::Arc;

use crate::{
    dtos::auth::{SignInRequest, SignUpRequest},
    models::{ProfilePicture, RegistrationProfile, User},
    services::{
        AdminNotifier, RevocationLedger, ServiceError, SessionTokenCodec, UserStore,
        VerifiedToken,
    },
    utils::{check_password_strength, is_valid_email, CredentialHasher, Password, StoredCredential},
};

/// Security questions a registration must answer.
pub const REQUIRED_ANSWERS: usize = 4;

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn RevocationLedger>,
    codec: Arc<SessionTokenCodec>,
    hasher: CredentialHasher,
    notifier: Arc<dyn AdminNotifier>,
}

/// Trimmed value, or `None` when absent or blank.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn RevocationLedger>,
        codec: Arc<SessionTokenCodec>,
        hasher: CredentialHasher,
        notifier: Arc<dyn AdminNotifier>,
    ) -> Self {
        Self {
            users,
            ledger,
            codec,
            hasher,
            notifier,
        }
    }

    /// Register a pending account and notify the administrator.
    ///
    /// Returns the new user id.
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<String, ServiceError> {
        let email = non_blank(req.email);
        let password = req.password.filter(|p| !p.is_empty());
        let first_name = non_blank(req.first_name);
        let last_name = non_blank(req.last_name);
        let cow_name = non_blank(req.cow_name);

        let (Some(email), Some(password), Some(first_name), Some(last_name), Some(cow_name)) =
            (email, password, first_name, last_name, cow_name)
        else {
            return Err(ServiceError::MissingFields);
        };

        if !is_valid_email(&email) {
            return Err(ServiceError::InvalidEmail);
        }

        check_password_strength(&password).map_err(ServiceError::WeakPassword)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::UserExists);
        }

        if req.answers.len() < REQUIRED_ANSWERS {
            return Err(ServiceError::IncompleteAnswers);
        }

        let profile_picture = non_blank(req.profile_picture).map(|data| ProfilePicture {
            data,
            name: req.profile_picture_name.unwrap_or_default(),
            content_type: req.profile_picture_type.unwrap_or_default(),
        });

        let credential = self.derive(Password::new(password)).await?;

        let user = User::new(
            &email,
            credential.digest,
            credential.salt,
            RegistrationProfile {
                first_name,
                last_name,
                cow_name,
                answers: req.answers,
                profile_picture,
            },
        );

        // Two registrations racing for one email: the store decides.
        if !self.users.insert(&user).await? {
            return Err(ServiceError::UserExists);
        }

        tracing::info!(user_id = %user.user_id, "Registration received");
        metrics::counter!("board_registrations_total").increment(1);

        if let Err(e) = self.notifier.notify_registration(&user).await {
            tracing::warn!(error = %e, user_id = %user.user_id, "Admin notification failed");
        }

        Ok(user.user_id)
    }

    /// Check credentials and issue a session token.
    ///
    /// Status is checked before the password, so a pending account learns it
    /// is pending whatever password it sends.
    pub async fn sign_in(&self, req: SignInRequest) -> Result<(String, User), ServiceError> {
        let email = non_blank(req.email);
        let password = req.password.filter(|p| !p.is_empty());
        let (Some(email), Some(password)) = (email, password) else {
            return Err(ServiceError::MissingCredentials);
        };

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !user.is_active() {
            tracing::info!(user_id = %user.user_id, status = %user.status, "Sign-in refused for inactive account");
            return Err(ServiceError::AccountNotActive {
                status: user.status.clone(),
                at_sign_in: true,
            });
        }

        let stored = StoredCredential {
            salt: user.password_salt.clone(),
            digest: user.password_hash.clone(),
        };
        if !self.verify(Password::new(password), stored).await? {
            tracing::info!(user_id = %user.user_id, "Sign-in refused: bad password");
            metrics::counter!("board_auth_failures_total", "code" => "INVALID_CREDENTIALS")
                .increment(1);
            return Err(ServiceError::InvalidCredentials);
        }

        let now = Utc::now();
        if let Err(e) = self.users.record_login(&user.email, now).await {
            tracing::warn!(error = %e, user_id = %user.user_id, "Failed to record last login");
        }
        user.last_login = Some(now);

        let token = self
            .codec
            .issue_at(&user, now)
            .map_err(|e| ServiceError::Internal(e.into()))?;

        tracing::info!(user_id = %user.user_id, "User signed in");
        Ok((token, user))
    }

    /// Revoke the presented token.
    ///
    /// A ledger write failure is logged and otherwise ignored: the caller is
    /// told they are signed out, and the token lives until its natural expiry.
    pub async fn sign_out(&self, session: &VerifiedToken) {
        match self.ledger.revoke(&session.token, session.claims.exp).await {
            Ok(()) => {
                tracing::info!(user_id = %session.claims.user_id, "User signed out");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user_id = %session.claims.user_id,
                    "Failed to revoke token; it remains valid until expiry"
                );
                metrics::counter!("board_revocation_failures_total").increment(1);
            }
        }
    }

    async fn derive(&self, password: Password) -> Result<StoredCredential, ServiceError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.derive(&password, None))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?
            .map_err(ServiceError::from)
    }

    async fn verify(
        &self,
        password: Password,
        stored: StoredCredential,
    ) -> Result<bool, ServiceError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?
            .map_err(ServiceError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryRevocationLedger, MemoryStore, MockNotifier};
    use secrecy::Secret;
    use std::collections::BTreeMap;

    struct Fixture {
        service: AccountService,
        store: Arc<MemoryStore>,
        ledger: Arc<InMemoryRevocationLedger>,
        notifier: Arc<MockNotifier>,
        codec: Arc<SessionTokenCodec>,
    }

    fn fixture_with(notifier: MockNotifier) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(InMemoryRevocationLedger::new());
        let notifier = Arc::new(notifier);
        let codec = Arc::new(SessionTokenCodec::new(
            &Secret::new("test-secret".to_string()),
            24,
        ));
        let service = AccountService::new(
            store.clone(),
            ledger.clone(),
            codec.clone(),
            CredentialHasher::default(),
            notifier.clone(),
        );
        Fixture {
            service,
            store,
            ledger,
            notifier,
            codec,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockNotifier::default())
    }

    fn answers(n: usize) -> BTreeMap<String, String> {
        (1..=n).map(|i| (format!("q{}", i), format!("a{}", i))).collect()
    }

    fn signup(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: Some(email.to_string()),
            password: Some("Password123".to_string()),
            first_name: Some("Bessie".to_string()),
            last_name: Some("Moo".to_string()),
            cow_name: Some("Bess".to_string()),
            answers: answers(4),
            ..Default::default()
        }
    }

    fn signin(email: &str, password: &str) -> SignInRequest {
        SignInRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_sign_up_creates_pending_user_and_notifies() -> Result<(), ServiceError> {
        let f = fixture();
        let user_id = f.service.sign_up(signup("Cow@X.com")).await?;

        let user = f.store.find_by_email("cow@x.com").await?.unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.status, "pending");
        assert_eq!(user.profile.cow_name, "Bess");
        assert_ne!(user.password_hash, "Password123");
        assert_eq!(f.notifier.sent(), vec!["cow@x.com".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_sign_up_validation_order() {
        let f = fixture();

        let mut req = signup("cow@x.com");
        req.cow_name = Some("   ".to_string());
        assert_eq!(f.service.sign_up(req).await.unwrap_err().code(), "MISSING_FIELDS");

        let req = signup("not-an-email");
        assert_eq!(f.service.sign_up(req).await.unwrap_err().code(), "INVALID_EMAIL");

        let mut req = signup("cow@x.com");
        req.password = Some("password".to_string());
        req.answers = answers(1);
        assert_eq!(f.service.sign_up(req).await.unwrap_err().code(), "WEAK_PASSWORD");

        let mut req = signup("cow@x.com");
        req.answers = answers(3);
        assert_eq!(
            f.service.sign_up(req).await.unwrap_err().code(),
            "INCOMPLETE_ANSWERS"
        );
        assert_eq!(f.store.find_by_email("cow@x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_before_answers() -> Result<(), ServiceError> {
        let f = fixture();
        f.service.sign_up(signup("cow@x.com")).await?;

        let mut req = signup("COW@x.com");
        req.answers = answers(0);
        assert_eq!(f.service.sign_up(req).await.unwrap_err().code(), "USER_EXISTS");
        Ok(())
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_sign_up() -> Result<(), ServiceError> {
        let f = fixture_with(MockNotifier::failing());
        f.service.sign_up(signup("cow@x.com")).await?;
        assert!(f.store.find_by_email("cow@x.com").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_sign_in_requires_active_account() -> Result<(), ServiceError> {
        let f = fixture();
        f.service.sign_up(signup("cow@x.com")).await?;

        // Pending status is reported even with the wrong password.
        let err = f
            .service
            .sign_in(signin("cow@x.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_NOT_ACTIVE");
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);

        f.store.set_status("cow@x.com", "active").await?;
        let (token, user) = f.service.sign_in(signin("cow@x.com", "Password123")).await?;

        assert!(user.last_login.is_some());
        let stored = f.store.find_by_email("cow@x.com").await?.unwrap();
        assert_eq!(stored.last_login, user.last_login);

        let claims = f.codec.verify(&token).map_err(ServiceError::InvalidToken)?;
        assert_eq!(claims.user_id, user.user_id);
        Ok(())
    }

    #[tokio::test]
    async fn test_sign_in_failures_share_a_code() -> Result<(), ServiceError> {
        let f = fixture();
        f.service.sign_up(signup("cow@x.com")).await?;
        f.store.set_status("cow@x.com", "active").await?;

        let unknown = f
            .service
            .sign_in(signin("nobody@x.com", "Password123"))
            .await
            .unwrap_err();
        let wrong = f
            .service
            .sign_in(signin("cow@x.com", "Password124"))
            .await
            .unwrap_err();
        assert_eq!(unknown.code(), "INVALID_CREDENTIALS");
        assert_eq!(wrong.code(), "INVALID_CREDENTIALS");
        assert_eq!(unknown.to_string(), wrong.to_string());

        let missing = f
            .service
            .sign_in(SignInRequest {
                email: Some("cow@x.com".to_string()),
                password: None,
            })
            .await
            .unwrap_err();
        assert_eq!(missing.code(), "MISSING_CREDENTIALS");
        Ok(())
    }

    #[tokio::test]
    async fn test_damaged_credential_is_not_a_wrong_password() -> Result<(), ServiceError> {
        let f = fixture();
        f.service.sign_up(signup("cow@x.com")).await?;
        f.store.set_status("cow@x.com", "active").await?;

        let mut user = f.store.find_by_email("cow@x.com").await?.unwrap();
        user.password_hash = String::new();
        f.store.upsert_user(user);

        let err = f
            .service
            .sign_in(signin("cow@x.com", "Password123"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CORRUPT_CREDENTIAL");
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() -> Result<(), ServiceError> {
        let f = fixture();
        f.service.sign_up(signup("cow@x.com")).await?;
        f.store.set_status("cow@x.com", "active").await?;
        let (token, _) = f.service.sign_in(signin("cow@x.com", "Password123")).await?;

        let claims = f.codec.verify(&token).map_err(ServiceError::InvalidToken)?;
        f.service
            .sign_out(&VerifiedToken {
                token: token.clone(),
                claims,
            })
            .await;

        assert!(f.ledger.is_revoked(&token).await?);
        Ok(())
    }
}
