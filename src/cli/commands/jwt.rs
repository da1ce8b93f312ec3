use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::{path::PathBuf, time::Duration};

pub const ARG_JWT_ISSUER: &str = "jwt-issuer";
pub const ARG_JWT_PRIVATE_KEY: &str = "jwt-private-key";
pub const ARG_JWT_PUBLIC_KEY: &str = "jwt-public-key";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_PASSWORD_RESET_TTL_SECONDS: &str = "password-reset-ttl-seconds";

#[derive(Debug)]
pub struct Options {
    pub issuer: String,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub session_ttl: Duration,
    pub password_reset_ttl: Duration,
}

impl Options {
    /// # Errors
    /// Returns an error if a required token argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let issuer = matches
            .get_one::<String>(ARG_JWT_ISSUER)
            .cloned()
            .context("missing required argument: --jwt-issuer")?;
        let private_key_path = matches
            .get_one::<PathBuf>(ARG_JWT_PRIVATE_KEY)
            .cloned()
            .context("missing required argument: --jwt-private-key")?;
        let public_key_path = matches
            .get_one::<PathBuf>(ARG_JWT_PUBLIC_KEY)
            .cloned()
            .context("missing required argument: --jwt-public-key")?;
        let session_ttl = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(3600);
        let password_reset_ttl = matches
            .get_one::<u64>(ARG_PASSWORD_RESET_TTL_SECONDS)
            .copied()
            .unwrap_or(43_200);

        Ok(Self {
            issuer,
            private_key_path,
            public_key_path,
            session_ttl: Duration::from_secs(session_ttl),
            password_reset_ttl: Duration::from_secs(password_reset_ttl),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_ISSUER)
                .long(ARG_JWT_ISSUER)
                .help("Value of the `iss` claim in every token")
                .env("TESSERA_JWT_ISSUER")
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_PRIVATE_KEY)
                .long(ARG_JWT_PRIVATE_KEY)
                .help("Path to the PKCS#8 PEM encoded P-256 private key used to sign tokens")
                .env("TESSERA_JWT_PRIVATE_KEY")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_JWT_PUBLIC_KEY)
                .long(ARG_JWT_PUBLIC_KEY)
                .help("Path to the PEM encoded P-256 public key used to verify tokens")
                .env("TESSERA_JWT_PUBLIC_KEY")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token lifetime in seconds")
                .env("TESSERA_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_RESET_TTL_SECONDS)
                .long(ARG_PASSWORD_RESET_TTL_SECONDS)
                .help("Password-reset token lifetime in seconds")
                .env("TESSERA_PASSWORD_RESET_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
