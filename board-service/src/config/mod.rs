use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Signing secret used when none is configured outside production.
pub const DEV_TOKEN_SECRET: &str = "board-dev-secret-change-me";

/// Lowest iteration count accepted for password derivation.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Longest session token lifetime accepted (one year).
pub const MAX_TOKEN_LIFETIME_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub token: TokenConfig,
    pub credentials: CredentialConfig,
    pub revocation: RevocationConfig,
    pub security: SecurityConfig,
    pub notification: Option<NotificationConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: Secret<String>,
    pub lifetime_hours: i64,
}

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub kdf_iterations: u32,
}

#[derive(Debug, Clone)]
pub struct RevocationConfig {
    /// Interval of the expired-entry sweep for the in-memory ledger.
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

/// SMTP settings for the new-registration notice sent to the administrator.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub admin_email: String,
    pub sender: String,
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_password: Secret<String>,
}

impl BoardConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let backend: StoreBackend = get_env("STORE_BACKEND", Some("redis"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        if is_prod && backend == StoreBackend::Memory {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORE_BACKEND=memory is not allowed in production"
            )));
        }

        let config = BoardConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("board-service"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            store: StoreConfig {
                backend,
                redis_url: Secret::new(get_env(
                    "REDIS_URL",
                    Some("redis://127.0.0.1:6379"),
                    is_prod,
                )?),
            },
            token: TokenConfig {
                secret: Secret::new(get_env("JWT_SECRET", Some(DEV_TOKEN_SECRET), is_prod)?),
                lifetime_hours: parse_env("TOKEN_LIFETIME_HOURS", "24")?,
            },
            credentials: CredentialConfig {
                kdf_iterations: parse_env("KDF_ITERATIONS", "100000")?,
            },
            revocation: RevocationConfig {
                sweep_interval_seconds: parse_env("REVOCATION_SWEEP_SECONDS", "300")?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("*"), false)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            notification: notification_from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would weaken the session or credential guarantees.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=MAX_TOKEN_LIFETIME_HOURS).contains(&self.token.lifetime_hours) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_LIFETIME_HOURS must be between 1 and {}",
                MAX_TOKEN_LIFETIME_HOURS
            )));
        }
        if self.credentials.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "KDF_ITERATIONS must be at least {}",
                MIN_KDF_ITERATIONS
            )));
        }
        if self.revocation.sweep_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REVOCATION_SWEEP_SECONDS must be positive"
            )));
        }
        if self.environment == Environment::Prod {
            use secrecy::ExposeSecret;
            if self.token.secret.expose_secret() == DEV_TOKEN_SECRET {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be changed in production"
                )));
            }
        }
        Ok(())
    }
}

fn notification_from_env() -> Result<Option<NotificationConfig>, AppError> {
    let Ok(smtp_host) = env::var("SMTP_HOST") else {
        return Ok(None);
    };

    Ok(Some(NotificationConfig {
        admin_email: get_env("ADMIN_EMAIL", None, false)?,
        sender: get_env("SMTP_SENDER", None, false)?,
        smtp_host,
        smtp_user: get_env("SMTP_USER", None, false)?,
        smtp_password: Secret::new(get_env("SMTP_PASSWORD", None, false)?),
    }))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), false)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}
