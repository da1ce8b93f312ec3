use crate::{
    api::{self, AppState, TokenPolicy},
    cli::commands::backend::Backend,
    identity::{IdentityBackend, MemoryBackend, PasswordHasher, PostgresBackend, UsernamePolicy},
    mail::LogEmailSender,
    token::{TokenIssuer, TokenVerifier},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{path::Path, path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

const BOOTSTRAP_SUPERUSER: &str = "root";
const BOOTSTRAP_SUPERUSER_EMAIL: &str = "root@localhost";

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend: Backend,
    pub username_min_length: usize,
    pub public_url: Url,
    pub frontend_origin: Option<String>,
    pub jwt_issuer: String,
    pub jwt_private_key_path: PathBuf,
    pub jwt_public_key_path: PathBuf,
    pub session_ttl: Duration,
    pub password_reset_ttl: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if key material cannot be loaded, the backend cannot be
/// acquired, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let frontend_origin = args
        .frontend_origin
        .as_deref()
        .map(api::frontend_origin)
        .transpose()?;

    let private_pem = read_private_key(&args.jwt_private_key_path)?;
    let issuer = TokenIssuer::from_pem(private_pem.expose_secret().as_bytes())
        .context("Failed to load JWT private key")?;

    let public_pem = std::fs::read(&args.jwt_public_key_path).with_context(|| {
        format!(
            "Failed to read JWT public key: {}",
            args.jwt_public_key_path.display()
        )
    })?;
    let verifier = TokenVerifier::from_pem(&public_pem)
        .context("Failed to load JWT public key")?
        .with_issuer(&args.jwt_issuer);

    let backend = acquire_backend(&args).await?;

    let state = Arc::new(AppState {
        backend: Arc::clone(&backend),
        issuer,
        verifier,
        policy: TokenPolicy {
            issuer: args.jwt_issuer,
            session_ttl: args.session_ttl,
            password_reset_ttl: args.password_reset_ttl,
        },
    });

    let served = api::new(args.port, state, frontend_origin).await;

    // Released whether serving succeeded or not.
    backend.close().await;
    crate::cli::telemetry::shutdown_tracer();

    served
}

async fn acquire_backend(args: &Args) -> Result<Arc<dyn IdentityBackend>> {
    let hasher = PasswordHasher::new().context("Failed to configure password hashing")?;
    let policy = UsernamePolicy::new(args.username_min_length);

    match &args.backend {
        Backend::Memory => {
            let backend = MemoryBackend::new(hasher, policy);
            let password = backend
                .bootstrap_superuser(BOOTSTRAP_SUPERUSER, BOOTSTRAP_SUPERUSER_EMAIL)
                .await
                .context("Failed to create bootstrap superuser")?;
            warn!("in-memory backend: users are lost when the process exits");
            // stdout only, kept out of the logs
            println!("Superuser created: {BOOTSTRAP_SUPERUSER}:{password}");
            Ok(Arc::new(backend))
        }
        Backend::Postgres { dsn } => {
            let backend = PostgresBackend::connect(
                dsn,
                hasher,
                policy,
                Arc::new(LogEmailSender),
                args.public_url.clone(),
            )
            .await?;
            info!("Connected to database");
            Ok(Arc::new(backend))
        }
    }
}

fn read_private_key(path: &Path) -> Result<SecretString> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JWT private key: {}", path.display()))?;
    Ok(SecretString::from(pem))
}

fn log_startup_args(args: &Args) {
    let backend = match &args.backend {
        Backend::Memory => "memory",
        Backend::Postgres { .. } => "postgres",
    };
    debug!(
        port = args.port,
        backend,
        username_min_length = args.username_min_length,
        public_url = %args.public_url,
        frontend_origin = args.frontend_origin.as_deref().unwrap_or("-"),
        jwt_issuer = %args.jwt_issuer,
        jwt_private_key = %args.jwt_private_key_path.display(),
        jwt_public_key = %args.jwt_public_key_path.display(),
        session_ttl_seconds = args.session_ttl.as_secs(),
        password_reset_ttl_seconds = args.password_reset_ttl.as_secs(),
        "Startup args"
    );
}
