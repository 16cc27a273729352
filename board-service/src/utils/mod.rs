pub mod password;
pub mod validation;

pub use password::{CredentialError, CredentialHasher, Password, StoredCredential};
pub use validation::{check_password_strength, is_valid_email, BoardJson};
