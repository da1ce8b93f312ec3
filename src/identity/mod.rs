//! Credential model and the storage contract every identity backend honours.
//!
//! A backend owns users and their password hashes. The rest of the service
//! only ever sees [`User`] values and the [`IdentityBackend`] trait, so the
//! in-memory and relational stores are interchangeable once constructed.

pub mod memory;
pub mod password;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryBackend;
pub use self::password::PasswordHasher;
pub use self::postgres::PostgresBackend;

pub const DEFAULT_USERNAME_MIN_LENGTH: usize = 3;

/// A correctly identified principal. The password never leaves the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("User already exists")]
    UserAlreadyExist,
    #[error("Username too short")]
    UsernameTooShort { min: usize },
    #[error("Missing username or password")]
    MissingCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("challenge delivery failed: {0}")]
    Delivery(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Registration rules a backend applies before persisting a user.
#[derive(Clone, Copy, Debug)]
pub struct UsernamePolicy {
    min_length: usize,
}

impl UsernamePolicy {
    #[must_use]
    pub const fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// # Errors
    /// Returns `ProviderError::UsernameTooShort` when the username is shorter than the minimum.
    pub fn check(&self, username: &str) -> Result<(), ProviderError> {
        if username.chars().count() < self.min_length {
            return Err(ProviderError::UsernameTooShort {
                min: self.min_length,
            });
        }
        Ok(())
    }
}

impl Default for UsernamePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME_MIN_LENGTH)
    }
}

/// Capabilities a storage engine must provide to identify, register and
/// recover users.
///
/// Lookups return `Ok(None)` for unknown users; only storage failures and
/// the registration outcomes in [`ProviderError`] are errors.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Check a username/password pair. Unknown users and wrong passwords
    /// both yield `Ok(None)`.
    async fn identify(&self, username: &str, password: &str)
        -> Result<Option<User>, ProviderError>;

    async fn register_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        is_superuser: bool,
    ) -> Result<(), ProviderError>;

    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, ProviderError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ProviderError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ProviderError>;

    /// Replace the stored hash. Setting the same password twice is harmless.
    async fn set_password_for_user(&self, user: &User, password: &str)
        -> Result<(), ProviderError>;

    /// Deliver a minted password-reset token to the user out of band.
    async fn send_reset_password_challenge(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(), ProviderError>;

    /// Liveness probe; never fails, reports `false` on any underlying error.
    async fn is_connection_alive(&self) -> bool;

    /// Release pooled resources. Called once when the server stops.
    async fn close(&self);
}

/// Lightweight email sanity check applied before registration.
pub fn valid_email(email: &str) -> bool {
    regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
