use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, trace, warn};

use crate::config::{Config, Domain};
use crate::error::{ProvisionError, Result};
use crate::utils::dkim::KeyGenerator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    Generated(PathBuf),
    Existing(PathBuf),
}

impl KeyStatus {
    pub fn private_key(&self) -> &PathBuf {
        match self {
            KeyStatus::Generated(path) | KeyStatus::Existing(path) => path,
        }
    }
}

/// Makes sure `domain` has a key pair under `<base>/keys/<domain>`.
///
/// Whether the private key file exists is the only thing consulted; the
/// tables play no part. A failed generation leaves no private key behind so
/// the next run tries again.
pub fn ensure_key(
    config: &Config,
    domain: &Domain,
    generator: &dyn KeyGenerator,
) -> Result<KeyStatus> {
    let key_dir = config.key_dir(domain);
    fs::create_dir_all(&key_dir)
        .map_err(|e| ProvisionError::io("create directory", &key_dir, e))?;

    let private_key = config.private_key_path(domain);
    if private_key.is_file() {
        trace!(%domain, path = %private_key.display(), "private key exists, skipping");
        return Ok(KeyStatus::Existing(private_key));
    }

    let spec = config.key_spec(domain);
    info!(%domain, selector = %spec.selector, bits = spec.size.bits(), "generating DKIM key");
    match generator.generate_keypair(&spec, &key_dir) {
        Ok(_) if private_key.is_file() => Ok(KeyStatus::Generated(private_key)),
        Ok(_) => Err(ProvisionError::MissingKeyFile {
            domain: domain.to_string(),
            path: private_key,
        }),
        Err(e) => {
            if let Err(cleanup) = discard_partial_key(&private_key) {
                warn!(
                    %domain,
                    path = %private_key.display(),
                    error = %cleanup,
                    "could not remove partial private key, delete it before the next run"
                );
            }
            Err(e)
        }
    }
}

fn discard_partial_key(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
