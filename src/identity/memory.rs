//! In-memory identity backend for demos and tests.
//!
//! Users live in a map keyed by username and vanish with the process. Reset
//! challenges are not delivered anywhere; they are recorded so tests and
//! local operators can pick the token up.

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};
use ulid::Ulid;

use super::{IdentityBackend, PasswordHasher, ProviderError, User, UsernamePolicy};

const BOOTSTRAP_PASSWORD_LENGTH: usize = 12;

#[derive(Clone, Debug)]
struct StoredUser {
    user: User,
    password_hash: String,
}

/// A password-reset token handed to the backend for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetChallenge {
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug)]
pub struct MemoryBackend {
    users: RwLock<HashMap<String, StoredUser>>,
    challenges: Mutex<Vec<ResetChallenge>>,
    hasher: PasswordHasher,
    policy: UsernamePolicy,
    closed: AtomicBool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(hasher: PasswordHasher, policy: UsernamePolicy) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            challenges: Mutex::new(Vec::new()),
            hasher,
            policy,
            closed: AtomicBool::new(false),
        }
    }

    /// Create a superuser with a random password and return that password.
    ///
    /// # Errors
    /// Returns an error if the user cannot be registered.
    pub async fn bootstrap_superuser(
        &self,
        username: &str,
        email: &str,
    ) -> Result<String, ProviderError> {
        let password: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(BOOTSTRAP_PASSWORD_LENGTH)
            .map(char::from)
            .collect();
        self.register_user(username, &password, email, true).await?;
        info!(username, "bootstrap superuser created");
        Ok(password)
    }

    /// Reset challenges recorded so far, oldest first.
    pub async fn reset_challenges(&self) -> Vec<ResetChallenge> {
        self.challenges.lock().await.clone()
    }

    /// Remove and return the most recent reset challenge.
    pub async fn pop_reset_challenge(&self) -> Option<ResetChallenge> {
        self.challenges.lock().await.pop()
    }
}

#[async_trait]
impl IdentityBackend for MemoryBackend {
    #[instrument(skip(self, password))]
    async fn identify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, ProviderError> {
        if username.is_empty() || password.is_empty() {
            return Err(ProviderError::MissingCredentials);
        }

        let stored = self.users.read().await.get(username).cloned();
        let Some(stored) = stored else {
            self.hasher.verify_dummy(password);
            debug!("unknown username");
            return Ok(None);
        };

        if self.hasher.verify(password, &stored.password_hash) {
            Ok(Some(stored.user))
        } else {
            debug!("password mismatch");
            Ok(None)
        }
    }

    #[instrument(skip(self, password))]
    async fn register_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        is_superuser: bool,
    ) -> Result<(), ProviderError> {
        self.policy.check(username)?;
        let password_hash = self.hasher.hash(password)?;

        let mut users = self.users.write().await;
        if users.contains_key(username) || users.values().any(|s| s.user.email == email) {
            return Err(ProviderError::UserAlreadyExist);
        }

        let user = User {
            user_id: Ulid::new().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            is_superuser,
        };
        users.insert(
            username.to_string(),
            StoredUser {
                user,
                password_hash,
            },
        );

        Ok(())
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, ProviderError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|stored| stored.user.user_id == user_id)
            .map(|stored| stored.user.clone()))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ProviderError> {
        Ok(self
            .users
            .read()
            .await
            .get(username)
            .map(|stored| stored.user.clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ProviderError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|stored| stored.user.email == email)
            .map(|stored| stored.user.clone()))
    }

    #[instrument(skip(self, user, password), fields(username = %user.username))]
    async fn set_password_for_user(
        &self,
        user: &User,
        password: &str,
    ) -> Result<(), ProviderError> {
        let password_hash = self.hasher.hash(password)?;
        if let Some(stored) = self.users.write().await.get_mut(&user.username) {
            stored.password_hash = password_hash;
        }
        Ok(())
    }

    #[instrument(skip(self, user, token), fields(username = %user.username))]
    async fn send_reset_password_challenge(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(), ProviderError> {
        self.challenges.lock().await.push(ResetChallenge {
            username: user.username.clone(),
            email: user.email.clone(),
            token: token.to_string(),
        });
        debug!("reset challenge recorded");
        Ok(())
    }

    async fn is_connection_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.users.write().await.clear();
    }
}
