use anyhow::{bail, Context, Result};
use rcgen::{KeyPair, PKCS_ECDSA_P256_SHA256};
use std::{fs::OpenOptions, io::Write, path::Path, path::PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub force: bool,
}

/// Generate an ES256 key pair and write both halves as PEM.
///
/// # Errors
/// Returns an error if a target exists and `force` is not set, or a file
/// cannot be written.
pub fn execute(args: &Args) -> Result<()> {
    if !args.force {
        for path in [&args.private_key_path, &args.public_key_path] {
            if path.exists() {
                bail!("{} already exists, use --force to overwrite", path.display());
            }
        }
    }

    let key_pair =
        KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).context("Failed to generate key pair")?;

    write_pem(&args.private_key_path, &key_pair.serialize_pem(), 0o600)?;
    write_pem(&args.public_key_path, &key_pair.public_key_pem(), 0o644)?;

    info!(
        private_key = %args.private_key_path.display(),
        public_key = %args.public_key_path.display(),
        "key pair written"
    );
    println!(
        "Wrote {} and {}",
        args.private_key_path.display(),
        args.public_key_path.display()
    );

    Ok(())
}

fn write_pem(path: &Path, pem: &str, mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(pem.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}
