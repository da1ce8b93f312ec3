//! # Tessera (Identity Provider)
//!
//! `tessera` identifies users and hands out short-lived ES256 JSON Web Tokens
//! that other services verify offline with the public key.
//!
//! ## Credentials
//!
//! Requests authenticate with either `Basic` (username and password) or
//! `Bearer` (a token this service signed). Two token shapes exist:
//!
//! - **Session tokens** carry the user id in `sub` and grant ordinary access.
//! - **Password-reset tokens** carry `password_reset_for` and only authorize
//!   setting a new password for that username.
//!
//! A session token alone never allows a password change; the caller must
//! prove the current password (Basic) or hold a reset token.
//!
//! ## Storage
//!
//! Users live behind the [`identity::IdentityBackend`] trait. An in-memory
//! store serves demos and tests, a Postgres store serves production.

pub mod api;
pub mod auth;
pub mod cli;
pub mod identity;
pub mod mail;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
