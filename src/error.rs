use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to {action} `{}`", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid domain `{0}`")]
    InvalidDomain(String),
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
    #[error("unsupported key size {0}, expected 1024, 2048 or 4096")]
    UnsupportedKeySize(u32),
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::errors::Error),
    #[error("PKCS#1 error: {0}")]
    Pkcs1(#[from] rsa::pkcs1::Error),
    #[error("SPKI error: {0}")]
    Spki(#[from] rsa::pkcs8::spki::Error),
    #[error("key generation for `{domain}` did not produce `{}`", .path.display())]
    MissingKeyFile { domain: String, path: PathBuf },
    #[error("could not determine the host name")]
    Hostname(#[source] io::Error),
}

impl ProvisionError {
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Problems with the command line; reported together with the usage text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("option `{0}` requires a value")]
    MissingValue(&'static str),
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("invalid value `{value}` for `{option}`: {reason}")]
    InvalidValue {
        option: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;
