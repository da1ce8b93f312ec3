//! `Authorization` header negotiation.
//!
//! Flow Overview: split the header into scheme and value, then either check a
//! Basic username/password pair against the backend or verify a Bearer token
//! and resolve its subject. The caller states its [`Intent`]; changing a
//! password needs proof of the current password (Basic) or a password-reset
//! token, and a session token is never enough for it.

use base64ct::{Base64, Encoding};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::identity::{IdentityBackend, ProviderError, User};
use crate::token::{Claims, Scope, TokenVerifier};

pub const MISSING_HEADER: &str = "Missing authorization header";
pub const BAD_AUTHORIZATION: &str = "Bad authorization";
pub const BAD_CREDENTIALS: &str = "Invalid username or password";
pub const BAD_TOKEN: &str = "Invalid or expired token";
pub const NOT_A_SESSION_TOKEN: &str = "Token does not identify a user session";
pub const NO_SUCH_USER: &str = "No such user";
pub const NEEDS_RESET_TOKEN: &str = "Use a password-reset token or basic auth.";

#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credential: missing, garbled, expired, wrong scheme, or
    /// naming a user that does not exist.
    #[error("{0}")]
    Unauthorized(&'static str),
    /// A valid credential that lacks the scope the action needs.
    #[error("{0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// What the caller wants to do with the credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Access,
    PasswordModification,
}

/// How the request proved its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Grant {
    /// The caller typed the current password.
    Basic,
    /// Decoded bearer token claims, unmodified.
    Bearer(Claims),
}

#[derive(Clone, Debug)]
pub struct Authenticated {
    pub user: User,
    pub grant: Grant,
}

impl Authenticated {
    /// Token claims; empty for Basic authentication.
    #[must_use]
    pub const fn claims(&self) -> Option<&Claims> {
        match &self.grant {
            Grant::Basic => None,
            Grant::Bearer(claims) => Some(claims),
        }
    }

    /// Basic credentials always qualify; bearers only with a reset token.
    #[must_use]
    pub const fn can_change_password(&self) -> bool {
        match &self.grant {
            Grant::Basic => true,
            Grant::Bearer(claims) => claims.password_reset_for.is_some(),
        }
    }
}

/// Resolve the user behind an `Authorization` header value.
///
/// # Errors
/// Returns `AuthError::Unauthorized` for missing or unusable credentials,
/// `AuthError::Forbidden` when a valid session token is presented for a
/// password change, and `AuthError::Provider` for backend failures.
#[instrument(skip_all, fields(intent = ?intent))]
pub async fn authenticate(
    authorization: Option<&str>,
    backend: &dyn IdentityBackend,
    verifier: &TokenVerifier,
    intent: Intent,
) -> Result<Authenticated, AuthError> {
    let header = authorization
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::Unauthorized(MISSING_HEADER))?;

    let (scheme, value) = split_header(header)?;

    match scheme {
        "Basic" => basic(value, backend).await,
        "Bearer" => bearer(value, backend, verifier, intent).await,
        _ => {
            debug!("unsupported authorization scheme");
            Err(AuthError::Unauthorized(BAD_AUTHORIZATION))
        }
    }
}

fn split_header(header: &str) -> Result<(&str, &str), AuthError> {
    match header.split_once(' ') {
        Some((scheme, value))
            if !scheme.is_empty()
                && !value.is_empty()
                && !value.contains(char::is_whitespace) =>
        {
            Ok((scheme, value))
        }
        _ => Err(AuthError::Unauthorized(BAD_AUTHORIZATION)),
    }
}

fn decode_basic(value: &str) -> Option<(String, String)> {
    let decoded = Base64::decode_vec(value).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

async fn basic(value: &str, backend: &dyn IdentityBackend) -> Result<Authenticated, AuthError> {
    let (username, password) =
        decode_basic(value).ok_or(AuthError::Unauthorized(BAD_AUTHORIZATION))?;

    match backend.identify(&username, &password).await {
        Ok(Some(user)) => Ok(Authenticated {
            user,
            grant: Grant::Basic,
        }),
        Ok(None) | Err(ProviderError::MissingCredentials) => {
            Err(AuthError::Unauthorized(BAD_CREDENTIALS))
        }
        Err(err) => Err(err.into()),
    }
}

async fn bearer(
    value: &str,
    backend: &dyn IdentityBackend,
    verifier: &TokenVerifier,
    intent: Intent,
) -> Result<Authenticated, AuthError> {
    let claims = verifier.verify(value).map_err(|err| {
        debug!("bearer rejected: {}", err);
        AuthError::Unauthorized(BAD_TOKEN)
    })?;

    let user = match (intent, claims.scope()) {
        (Intent::PasswordModification, Ok(Scope::PasswordReset { username })) => {
            backend.get_user_by_username(username).await?
        }
        (Intent::PasswordModification, _) => {
            return Err(AuthError::Forbidden(NEEDS_RESET_TOKEN));
        }
        (Intent::Access, Ok(Scope::Session { user_id })) => {
            backend.get_user_by_id(user_id).await?
        }
        (Intent::Access, _) => return Err(AuthError::Unauthorized(NOT_A_SESSION_TOKEN)),
    };

    let user = user.ok_or(AuthError::Unauthorized(NO_SUCH_USER))?;

    Ok(Authenticated {
        user,
        grant: Grant::Bearer(claims),
    })
}
