//! Relational identity backend on top of a Postgres connection pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, error, info_span, instrument, Instrument, Span};
use url::Url;
use uuid::Uuid;

use super::{IdentityBackend, PasswordHasher, ProviderError, User, UsernamePolicy};
use crate::mail::{EmailMessage, EmailSender};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const LIVENESS_TIMEOUT_SECONDS: u64 = 2;

const USER_COLUMNS: &str = "id, username, email, is_superuser";

pub struct PostgresBackend {
    pool: PgPool,
    hasher: PasswordHasher,
    policy: UsernamePolicy,
    sender: Arc<dyn EmailSender>,
    public_url: Url,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("pool_size", &self.pool.size())
            .field("policy", &self.policy)
            .field("public_url", &self.public_url.as_str())
            .finish_non_exhaustive()
    }
}

impl PostgresBackend {
    /// Open a pool against `dsn` and make sure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or the schema cannot be applied.
    pub async fn connect(
        dsn: &str,
        hasher: PasswordHasher,
        policy: UsernamePolicy,
        sender: Arc<dyn EmailSender>,
        public_url: Url,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let backend = Self::from_pool(pool, hasher, policy, sender, public_url);

        if let Err(err) = backend.apply_schema().await {
            // The pool is already open; release it before bailing out.
            backend.pool.close().await;
            return Err(err).context("Failed to apply database schema");
        }

        Ok(backend)
    }

    #[must_use]
    pub fn from_pool(
        pool: PgPool,
        hasher: PasswordHasher,
        policy: UsernamePolicy,
        sender: Arc<dyn EmailSender>,
        public_url: Url,
    ) -> Self {
        Self {
            pool,
            hasher,
            policy,
            sender,
            public_url,
        }
    }

    /// # Errors
    /// Returns an error if the schema statements fail.
    pub async fn apply_schema(&self) -> Result<(), ProviderError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(query_span("CREATE", "schema.sql"))
            .await?;
        Ok(())
    }

    async fn fetch_user(&self, query: &str, value: &str) -> Result<Option<User>, ProviderError> {
        let row = sqlx::query(query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> Result<User, ProviderError> {
    let id: Uuid = row.try_get("id")?;
    Ok(User {
        user_id: id.to_string(),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        is_superuser: row.try_get("is_superuser")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[async_trait]
impl IdentityBackend for PostgresBackend {
    #[instrument(skip(self, password))]
    async fn identify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, ProviderError> {
        if username.is_empty() || password.is_empty() {
            return Err(ProviderError::MissingCredentials);
        }

        let query = "SELECT id, username, email, is_superuser, password FROM users WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        let Some(row) = row else {
            self.hasher.verify_dummy(password);
            debug!("unknown username");
            return Ok(None);
        };

        let stored_hash: String = row.try_get("password")?;
        if self.hasher.verify(password, &stored_hash) {
            user_from_row(&row).map(Some)
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

        let query = r"
            INSERT INTO users
                (id, username, email, password, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
        ";
        match sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(username)
            .bind(email)
            .bind(&password_hash)
            .bind(is_superuser)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(ProviderError::UserAlreadyExist),
            Err(err) => {
                error!("Error inserting user: {}", err);
                Err(err.into())
            }
        }
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, ProviderError> {
        let Ok(id) = Uuid::parse_str(user_id) else {
            return Ok(None);
        };

        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ProviderError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        self.fetch_user(&query, username).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ProviderError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.fetch_user(&query, email).await
    }

    #[instrument(skip(self, user, password), fields(username = %user.username))]
    async fn set_password_for_user(
        &self,
        user: &User,
        password: &str,
    ) -> Result<(), ProviderError> {
        let password_hash = self.hasher.hash(password)?;

        let query = "UPDATE users SET password = $1, updated_at = now() WHERE username = $2";
        sqlx::query(query)
            .bind(&password_hash)
            .bind(&user.username)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;

        Ok(())
    }

    #[instrument(skip(self, user, token), fields(username = %user.username))]
    async fn send_reset_password_challenge(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(), ProviderError> {
        let message =
            EmailMessage::password_reset(&user.email, &user.username, token, &self.public_url)
                .map_err(|e| ProviderError::Delivery(e.to_string()))?;

        // Senders may block on network I/O.
        let sender = Arc::clone(&self.sender);
        tokio::task::spawn_blocking(move || sender.send(&message))
            .await
            .map_err(|e| ProviderError::Delivery(e.to_string()))?
            .map_err(|e| ProviderError::Delivery(e.to_string()))
    }

    async fn is_connection_alive(&self) -> bool {
        let probe = async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        };

        match timeout(Duration::from_secs(LIVENESS_TIMEOUT_SECONDS), probe).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                error!("Failed to ping database: {}", err);
                false
            }
            Err(_) => {
                error!("Database ping timed out");
                false
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_unique_identity_columns() {
        assert!(SCHEMA_SQL.contains("username text NOT NULL UNIQUE"));
        assert!(SCHEMA_SQL.contains("email text NOT NULL UNIQUE"));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
