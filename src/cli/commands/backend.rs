use anyhow::{Context, Result};
use clap::{builder::PossibleValuesParser, Arg, ArgMatches, Command};
use url::Url;

use crate::identity::DEFAULT_USERNAME_MIN_LENGTH;

pub const ARG_BACKEND: &str = "backend";
pub const ARG_DSN: &str = "dsn";
pub const ARG_USERNAME_MIN_LENGTH: &str = "username-min-length";
pub const ARG_PUBLIC_URL: &str = "public-url";

pub const BACKEND_MEMORY: &str = "memory";
pub const BACKEND_POSTGRES: &str = "postgres";

/// Which identity store to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Postgres { dsn: String },
}

#[derive(Debug)]
pub struct Options {
    pub backend: Backend,
    pub username_min_length: usize,
    pub public_url: Url,
}

impl Options {
    /// # Errors
    /// Returns an error if `--dsn` is missing for the postgres backend or
    /// `--public-url` is not a URL.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let backend = match matches
            .get_one::<String>(ARG_BACKEND)
            .map(String::as_str)
            .unwrap_or(BACKEND_MEMORY)
        {
            BACKEND_POSTGRES => Backend::Postgres {
                dsn: matches
                    .get_one::<String>(ARG_DSN)
                    .cloned()
                    .context("missing required argument: --dsn")?,
            },
            _ => Backend::Memory,
        };

        let username_min_length = matches
            .get_one::<usize>(ARG_USERNAME_MIN_LENGTH)
            .copied()
            .unwrap_or(DEFAULT_USERNAME_MIN_LENGTH);

        let public_url = matches
            .get_one::<String>(ARG_PUBLIC_URL)
            .map_or("http://localhost:8140", String::as_str);
        let public_url =
            Url::parse(public_url).with_context(|| format!("Invalid public URL: {public_url}"))?;

        Ok(Self {
            backend,
            username_min_length,
            public_url,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND)
                .short('b')
                .long(ARG_BACKEND)
                .help("Identity backend")
                .env("TESSERA_BACKEND")
                .default_value(BACKEND_MEMORY)
                .value_parser(PossibleValuesParser::new([BACKEND_MEMORY, BACKEND_POSTGRES])),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string, required by the postgres backend")
                .env("TESSERA_DSN")
                .required_if_eq(ARG_BACKEND, BACKEND_POSTGRES),
        )
        .arg(
            Arg::new(ARG_USERNAME_MIN_LENGTH)
                .long(ARG_USERNAME_MIN_LENGTH)
                .help("Shortest username accepted at registration")
                .env("TESSERA_USERNAME_MIN_LENGTH")
                .default_value("3")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_PUBLIC_URL)
                .long(ARG_PUBLIC_URL)
                .help("Public base URL used to build password recovery links")
                .env("TESSERA_PUBLIC_URL")
                .default_value("http://localhost:8140"),
        )
}
