//! Map validated CLI matches to an [`Action`].

use crate::cli::actions::{keygen, server::Args, Action};
use crate::cli::commands::{backend, jwt, ARG_FRONTEND_ORIGIN, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a keygen or server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches(crate::cli::commands::keygen::SUBCOMMAND) {
        let opts = crate::cli::commands::keygen::Options::parse(sub)?;
        return Ok(Action::Keygen(keygen::Args {
            private_key_path: opts.private_key_path,
            public_key_path: opts.public_key_path,
            force: opts.force,
        }));
    }

    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8140);

    let backend_opts = backend::Options::parse(matches)?;
    let jwt_opts = jwt::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        backend: backend_opts.backend,
        username_min_length: backend_opts.username_min_length,
        public_url: backend_opts.public_url,
        frontend_origin: matches.get_one::<String>(ARG_FRONTEND_ORIGIN).cloned(),
        jwt_issuer: jwt_opts.issuer,
        jwt_private_key_path: jwt_opts.private_key_path,
        jwt_public_key_path: jwt_opts.public_key_path,
        session_ttl: jwt_opts.session_ttl,
        password_reset_ttl: jwt_opts.password_reset_ttl,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::time::Duration;

    #[test]
    fn builds_a_memory_server_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("TESSERA_BACKEND", None::<&str>),
                ("TESSERA_FRONTEND_ORIGIN", None),
                ("TESSERA_PUBLIC_URL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec![
                    "tessera",
                    "--port",
                    "9000",
                    "--jwt-issuer",
                    "tessera.test",
                    "--jwt-private-key",
                    "/tmp/private.pem",
                    "--jwt-public-key",
                    "/tmp/public.pem",
                    "--session-ttl-seconds",
                    "60",
                ]);

                let Action::Server(args) = handler(&matches)? else {
                    bail!("expected a server action");
                };
                assert_eq!(args.port, 9000);
                assert_eq!(args.backend, backend::Backend::Memory);
                assert_eq!(args.jwt_issuer, "tessera.test");
                assert_eq!(args.session_ttl, Duration::from_secs(60));
                assert_eq!(args.password_reset_ttl, Duration::from_secs(43_200));
                assert_eq!(args.public_url.as_str(), "http://localhost:8140/");
                assert!(args.frontend_origin.is_none());
                Ok(())
            },
        )
    }

    #[test]
    fn builds_a_postgres_server_action() -> Result<()> {
        let matches = crate::cli::commands::new().get_matches_from(vec![
            "tessera",
            "--backend",
            "postgres",
            "--dsn",
            "postgres://tessera@localhost:5432/tessera",
            "--jwt-issuer",
            "tessera.test",
            "--jwt-private-key",
            "/tmp/private.pem",
            "--jwt-public-key",
            "/tmp/public.pem",
        ]);

        let Action::Server(args) = handler(&matches)? else {
            bail!("expected a server action");
        };
        assert_eq!(
            args.backend,
            backend::Backend::Postgres {
                dsn: "postgres://tessera@localhost:5432/tessera".to_string()
            }
        );
        Ok(())
    }

    #[test]
    fn builds_a_keygen_action() -> Result<()> {
        let matches = crate::cli::commands::new().get_matches_from(vec![
            "tessera",
            "keygen",
            "--private-key-out",
            "/tmp/k.pem",
            "--force",
        ]);

        let Action::Keygen(args) = handler(&matches)? else {
            bail!("expected a keygen action");
        };
        assert_eq!(args.private_key_path, std::path::PathBuf::from("/tmp/k.pem"));
        assert_eq!(args.public_key_path, std::path::PathBuf::from("public.pem"));
        assert!(args.force);
        Ok(())
    }

    #[test]
    fn invalid_public_url_is_an_error() {
        let matches = crate::cli::commands::new().get_matches_from(vec![
            "tessera",
            "--public-url",
            "not a url",
            "--jwt-issuer",
            "tessera.test",
            "--jwt-private-key",
            "/tmp/private.pem",
            "--jwt-public-key",
            "/tmp/public.pem",
        ]);

        let result = handler(&matches);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("Invalid public URL"));
        }
    }
}
