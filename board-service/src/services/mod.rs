pub mod account;
pub mod authenticator;
pub mod email;
pub mod error;
pub mod jwt;
pub mod messages;
pub mod metrics;
pub mod policy;
pub mod redis;
pub mod revocation;
pub mod store;

pub use account::AccountService;
pub use authenticator::{extract_bearer, AccountRequirement, Authenticator, Identity, VerifiedToken};
pub use email::{AdminNotifier, MockNotifier, NoopNotifier, SmtpNotifier};
pub use error::ServiceError;
pub use jwt::{SessionClaims, SessionTokenCodec, TokenError};
pub use messages::MessageService;
pub use policy::AuthorizationPolicy;
pub use self::redis::RedisStore;
pub use revocation::{InMemoryRevocationLedger, RevocationLedger};
pub use store::{MemoryStore, MessageStore, UserStore};
