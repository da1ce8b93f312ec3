use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub const SUBCOMMAND: &str = "keygen";
pub const ARG_PRIVATE_KEY_OUT: &str = "private-key-out";
pub const ARG_PUBLIC_KEY_OUT: &str = "public-key-out";
pub const ARG_FORCE: &str = "force";

#[derive(Debug)]
pub struct Options {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub force: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if an output path is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            private_key_path: matches
                .get_one::<PathBuf>(ARG_PRIVATE_KEY_OUT)
                .cloned()
                .context("missing required argument: --private-key-out")?,
            public_key_path: matches
                .get_one::<PathBuf>(ARG_PUBLIC_KEY_OUT)
                .cloned()
                .context("missing required argument: --public-key-out")?,
            force: matches.get_flag(ARG_FORCE),
        })
    }
}

/// `tessera keygen`: write a fresh P-256 key pair for token signing.
#[must_use]
pub fn with_subcommand(command: Command) -> Command {
    command.subcommand_negates_reqs(true).subcommand(
        Command::new(SUBCOMMAND)
            .about("Generate a P-256 key pair usable with --jwt-private-key/--jwt-public-key")
            .arg(
                Arg::new(ARG_PRIVATE_KEY_OUT)
                    .long(ARG_PRIVATE_KEY_OUT)
                    .help("Where to write the PKCS#8 PEM private key")
                    .default_value("private.pem")
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new(ARG_PUBLIC_KEY_OUT)
                    .long(ARG_PUBLIC_KEY_OUT)
                    .help("Where to write the PEM public key")
                    .default_value("public.pem")
                    .value_parser(clap::value_parser!(PathBuf)),
            )
            .arg(
                Arg::new(ARG_FORCE)
                    .long(ARG_FORCE)
                    .help("Overwrite existing key files")
                    .action(ArgAction::SetTrue),
            ),
    )
}
