//! ES256 bearer token minting and verification.
//!
//! Two payload shapes are issued: session tokens (`sub` = user id) and
//! password-reset tokens (`password_reset_for` = username). Verification is
//! pinned to ES256 and treats a token as expired from its `exp` second on.

mod claims;

pub use self::claims::{Claims, Scope};

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, get_current_timestamp, Algorithm, DecodingKey,
    EncodingKey, Header, Validation,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use ulid::Ulid;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PASSWORD_RESET_TTL: Duration = Duration::from_secs(12 * 60 * 60);

const ALGORITHM: Algorithm = Algorithm::ES256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid key material: {0}")]
    Key(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token must carry exactly one of sub or password_reset_for")]
    Scope,
}

/// A freshly signed token together with the claims it carries.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Signs tokens with the private half of an ES256 key pair.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &ALGORITHM)
            .field("key", &"***")
            .finish()
    }
}

impl TokenIssuer {
    /// Load a PKCS#8 PEM encoded P-256 private key.
    ///
    /// # Errors
    /// Returns `TokenError::Key` if the PEM is not a usable EC private key.
    pub fn from_pem(pem: &[u8]) -> Result<Self, TokenError> {
        let key = EncodingKey::from_ec_pem(pem).map_err(|e| TokenError::Key(e.to_string()))?;
        Ok(Self { key })
    }

    /// Mint a session token for `user_id`.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the payload cannot be signed.
    pub fn issue_session_token(
        &self,
        issuer: &str,
        user_id: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.sign(Claims {
            iss: issuer.to_string(),
            sub: Some(user_id.to_string()),
            exp: expiry(ttl),
            jti: Ulid::new().to_string(),
            password_reset_for: None,
        })
    }

    /// Mint a token that authorizes one password change for `username`.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if the payload cannot be signed.
    pub fn issue_password_reset_token(
        &self,
        issuer: &str,
        username: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.sign(Claims {
            iss: issuer.to_string(),
            sub: None,
            exp: expiry(ttl),
            jti: Ulid::new().to_string(),
            password_reset_for: Some(username.to_string()),
        })
    }

    fn sign(&self, claims: Claims) -> Result<IssuedToken, TokenError> {
        let token = encode(&Header::new(ALGORITHM), &claims, &self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, claims })
    }
}

/// Verifies tokens with the public half of the key pair.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &ALGORITHM)
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Load an SPKI PEM encoded P-256 public key.
    ///
    /// # Errors
    /// Returns `TokenError::Key` if the PEM is not a usable EC public key.
    pub fn from_pem(pem: &[u8]) -> Result<Self, TokenError> {
        let key = DecodingKey::from_ec_pem(pem).map_err(|e| TokenError::Key(e.to_string()))?;

        // Only ES256 is accepted, whatever the header claims.
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self { key, validation })
    }

    /// Additionally require the `iss` claim to equal `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Check signature, shape, and expiry, and return the claims.
    ///
    /// # Errors
    /// Returns `TokenError::Expired` once `exp` is reached, `TokenError::Scope`
    /// for payloads that are neither session nor reset tokens, and
    /// `TokenError::Invalid` for anything else that fails to decode.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("token rejected: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;
        let claims = data.claims;

        // The library accepts `exp == now`; a token is dead at its exp second.
        if claims.exp <= get_current_timestamp() {
            return Err(TokenError::Expired);
        }

        claims.scope()?;
        Ok(claims)
    }
}

fn expiry(ttl: Duration) -> u64 {
    get_current_timestamp().saturating_add(ttl.as_secs())
}
