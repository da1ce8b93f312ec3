use serde::{Deserialize, Serialize};

use super::TokenError;

/// Decoded bearer token payload.
///
/// Session tokens carry `sub`, password-reset tokens carry
/// `password_reset_for`. A payload with both or neither is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry (seconds since epoch, UTC)
    pub exp: u64,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_for: Option<String>,
}

/// What a token is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Ordinary authenticated access for the user with this id.
    Session { user_id: &'a str },
    /// One password change for the user with this username.
    PasswordReset { username: &'a str },
}

impl Claims {
    /// # Errors
    /// Returns `TokenError::Scope` unless exactly one of `sub` and
    /// `password_reset_for` is present.
    pub fn scope(&self) -> Result<Scope<'_>, TokenError> {
        match (self.sub.as_deref(), self.password_reset_for.as_deref()) {
            (Some(user_id), None) => Ok(Scope::Session { user_id }),
            (None, Some(username)) => Ok(Scope::PasswordReset { username }),
            _ => Err(TokenError::Scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: Option<&str>, password_reset_for: Option<&str>) -> Claims {
        Claims {
            iss: "tessera.test".to_string(),
            sub: sub.map(ToString::to_string),
            exp: 0,
            jti: "01J0000000000000000000000".to_string(),
            password_reset_for: password_reset_for.map(ToString::to_string),
        }
    }

    #[test]
    fn session_scope() {
        let claims = claims(Some("uid-1"), None);
        assert_eq!(claims.scope().ok(), Some(Scope::Session { user_id: "uid-1" }));
    }

    #[test]
    fn password_reset_scope() {
        let claims = claims(None, Some("alice"));
        assert_eq!(
            claims.scope().ok(),
            Some(Scope::PasswordReset { username: "alice" })
        );
    }

    #[test]
    fn ambiguous_or_empty_scope_is_rejected() {
        assert!(matches!(
            claims(Some("uid-1"), Some("alice")).scope(),
            Err(TokenError::Scope)
        ));
        assert!(matches!(claims(None, None).scope(), Err(TokenError::Scope)));
    }

    #[test]
    fn reset_payload_has_no_sub_field() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(claims(None, Some("alice")))?;
        assert!(value.get("sub").is_none());
        assert_eq!(value["password_reset_for"], "alice");
        Ok(())
    }
}
