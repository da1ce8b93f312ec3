//! Argon2id password hashing shared by every backend.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash,
    PasswordHasher as _, PasswordVerifier as _, Version,
};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

use super::ProviderError;

/// Hashes passwords into PHC strings and verifies them in constant time.
///
/// Keeps a hash of a random throwaway password around so that lookups for
/// unknown users can burn the same amount of work as a real verification.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Hasher with the Argon2id defaults (19 MiB, 2 passes, 1 lane).
    ///
    /// # Errors
    /// Returns an error if the throwaway hash cannot be computed.
    pub fn new() -> Result<Self, ProviderError> {
        Self::from_argon2(Argon2::default())
    }

    /// Hasher with explicit cost parameters (memory in KiB).
    ///
    /// # Errors
    /// Returns an error if the parameters are rejected by Argon2.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, ProviderError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| ProviderError::Hashing(e.to_string()))?;
        Self::from_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Result<Self, ProviderError> {
        let throwaway: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let dummy_hash = hash_with(&argon2, &throwaway)?;
        Ok(Self { argon2, dummy_hash })
    }

    /// # Errors
    /// Returns an error if Argon2 fails to produce a hash.
    pub fn hash(&self, password: &str) -> Result<String, ProviderError> {
        hash_with(&self.argon2, password)
    }

    /// Compare a candidate password against a stored PHC string.
    /// Malformed stored hashes never match.
    #[must_use]
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        PasswordHash::new(stored_hash).is_ok_and(|parsed| {
            self.argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }

    /// Spend one verification worth of work without a real user.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("algorithm", &"argon2id")
            .finish_non_exhaustive()
    }
}

fn hash_with(argon2: &Argon2<'static>, password: &str) -> Result<String, ProviderError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ProviderError::Hashing(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("s3cr3t").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("s3cr3t", &hash));
        assert!(!hasher.verify("wrong", &hash));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = hasher();
        let first = hasher.hash("s3cr3t").unwrap();
        let second = hasher.hash("s3cr3t").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("s3cr3t", &second));
    }

    #[test]
    fn malformed_stored_hash_never_matches() {
        let hasher = hasher();
        assert!(!hasher.verify("s3cr3t", "s3cr3t"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn invalid_params_are_rejected() {
        assert!(matches!(
            PasswordHasher::with_params(1, 1, 1),
            Err(ProviderError::Hashing(_))
        ));
    }
}
