use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::models::User;

/// Tells the approving administrator that a registration is waiting.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify_registration(&self, user: &User) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_email: String,
    admin_email: String,
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, anyhow::Error> {
        let creds = Credentials::new(
            config.smtp_user.clone(),
            config.smtp_password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::relay(&config.smtp_host)?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.smtp_host, "Admin notifier initialized with SMTP");

        Ok(Self {
            mailer,
            from_email: config.sender.clone(),
            admin_email: config.admin_email.clone(),
        })
    }
}

fn registration_body(user: &User) -> String {
    let profile = &user.profile;
    let mut body = format!(
        "A new cow has asked to join the pasture.\n\n\
         Email: {}\nName: {} {}\nCow name: {}\nUser id: {}\nRegistered: {}\n\n\
         Security answers:\n",
        user.email,
        profile.first_name,
        profile.last_name,
        profile.cow_name,
        user.user_id,
        user.created_at.to_rfc3339(),
    );
    for (question, answer) in &profile.answers {
        body.push_str(&format!("  {}: {}\n", question, answer));
    }
    if let Some(picture) = &profile.profile_picture {
        body.push_str(&format!("\nProfile picture attached: {}\n", picture.name));
    }
    body.push_str("\nSet the account status to \"active\" to approve.\n");
    body
}

#[async_trait]
impl AdminNotifier for SmtpNotifier {
    async fn notify_registration(&self, user: &User) -> Result<(), anyhow::Error> {
        let email = Message::builder()
            .from(self.from_email.parse()?)
            .to(self.admin_email.parse()?)
            .subject(format!("New registration pending review: {}", user.email))
            .header(ContentType::TEXT_PLAIN)
            .body(registration_body(user))?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email)).await?;

        match result {
            Ok(_) => {
                tracing::info!(user_id = %user.user_id, "Registration notice sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, user_id = %user.user_id, "Failed to send registration notice");
                Err(e.into())
            }
        }
    }
}

/// Used when no SMTP settings are configured.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl AdminNotifier for NoopNotifier {
    async fn notify_registration(&self, user: &User) -> Result<(), anyhow::Error> {
        tracing::debug!(user_id = %user.user_id, "Admin notification disabled");
        Ok(())
    }
}

/// Records notified emails; optionally fails every send.
#[derive(Debug, Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AdminNotifier for MockNotifier {
    async fn notify_registration(&self, user: &User) -> Result<(), anyhow::Error> {
        if self.fail {
            return Err(anyhow::anyhow!("smtp unavailable"));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(user.email.clone());
        }
        Ok(())
    }
}
