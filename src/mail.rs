//! Out-of-band delivery of password-reset challenges.
//!
//! Backends that talk to real users render a message and hand it to an
//! [`EmailSender`]. The sender decides how to deliver (SMTP, API, etc.) and
//! returns `Ok`/`Err`; callers only log failures.
use anyhow::Result;
use serde_json::json;
use tracing::info;
use url::Url;

pub const PASSWORD_RESET_TEMPLATE: &str = "password_reset";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

impl EmailMessage {
    /// Build the password-reset message carrying a recovery link.
    ///
    /// # Errors
    /// Returns an error if the recovery link cannot be built from `public_url`.
    pub fn password_reset(
        to_email: &str,
        username: &str,
        token: &str,
        public_url: &Url,
    ) -> Result<Self> {
        let mut link = public_url.join("/password_recoveries/")?;
        link.query_pairs_mut().append_pair("token", token);

        Ok(Self {
            to_email: to_email.to_string(),
            template: PASSWORD_RESET_TEMPLATE.to_string(),
            payload_json: json!({
                "username": username,
                "reset_url": link.as_str(),
            })
            .to_string(),
        })
    }
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error describing why it failed.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the recipient and template instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            "email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn password_reset_message_links_to_recovery() {
        let public_url = Url::parse("https://id.example.com/").unwrap();
        let message =
            EmailMessage::password_reset("alice@example.com", "alice", "a.b.c", &public_url)
                .unwrap();

        assert_eq!(message.to_email, "alice@example.com");
        assert_eq!(message.template, PASSWORD_RESET_TEMPLATE);

        let payload: serde_json::Value = serde_json::from_str(&message.payload_json).unwrap();
        assert_eq!(payload["username"], "alice");
        assert_eq!(
            payload["reset_url"],
            "https://id.example.com/password_recoveries/?token=a.b.c"
        );
    }

    #[test]
    fn log_sender_accepts_messages() {
        let public_url = Url::parse("http://localhost:8140").unwrap();
        let message =
            EmailMessage::password_reset("bob@example.com", "bob", "t", &public_url).unwrap();
        assert!(LogEmailSender.send(&message).is_ok());
    }
}
