//! Run configuration and the small value types shared by every component.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ProvisionError;

pub const DEFAULT_BASE_DIR: &str = "/tmp/docker-mailserver/opendkim";
pub const DEFAULT_SELECTOR: &str = "mail";

pub const KEY_TABLE: &str = "KeyTable";
pub const SIGNING_TABLE: &str = "SigningTable";
pub const TRUSTED_HOSTS: &str = "TrustedHosts";

/// A mail domain, kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Domain(String);

impl Domain {
    pub fn new(raw: &str) -> Result<Self, ProvisionError> {
        // Used as a directory name under `keys/`.
        let unusable = matches!(raw, "" | "." | "..") || raw.contains('/');
        if unusable || raw.chars().any(char::is_whitespace) {
            return Err(ProvisionError::InvalidDomain(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector(String);

impl Selector {
    pub fn new(raw: &str) -> Result<Self, ProvisionError> {
        let bad = |c: char| c.is_whitespace() || c == '/' || c == ':';
        if raw.is_empty() || raw.chars().any(bad) {
            return Err(ProvisionError::InvalidSelector(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self(DEFAULT_SELECTOR.to_string())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RSA modulus length accepted by the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySize {
    Bits1024,
    #[default]
    Bits2048,
    Bits4096,
}

impl KeySize {
    pub fn bits(self) -> usize {
        match self {
            KeySize::Bits1024 => 1024,
            KeySize::Bits2048 => 2048,
            KeySize::Bits4096 => 4096,
        }
    }
}

impl TryFrom<u32> for KeySize {
    type Error = ProvisionError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            1024 => Ok(KeySize::Bits1024),
            2048 => Ok(KeySize::Bits2048),
            4096 => Ok(KeySize::Bits4096),
            other => Err(ProvisionError::UnsupportedKeySize(other)),
        }
    }
}

impl FromStr for KeySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits: u32 = s.parse().map_err(|_| "not a number".to_string())?;
        KeySize::try_from(bits).map_err(|e| e.to_string())
    }
}

impl fmt::Display for KeySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// Parameters for a single key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub domain: Domain,
    pub selector: Selector,
    pub size: KeySize,
}

impl KeySpec {
    /// `<selector>._domainkey.<domain>`, the lookup key shared by both tables.
    pub fn record_name(&self) -> String {
        format!("{}._domainkey.{}", self.selector, self.domain)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub selector: Selector,
    pub key_size: KeySize,
    /// Comma separated list that replaces domain discovery when set.
    pub domain_override: Option<String>,
    /// Scratch file holding the resolved domains for the current run.
    pub domain_list: PathBuf,
}

impl Config {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            selector: Selector::default(),
            key_size: KeySize::default(),
            domain_override: None,
            domain_list: default_domain_list(),
        }
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.base_dir.join("keys")
    }

    pub fn key_dir(&self, domain: &Domain) -> PathBuf {
        self.keys_dir().join(domain.as_str())
    }

    pub fn private_key_path(&self, domain: &Domain) -> PathBuf {
        self.key_dir(domain).join(format!("{}.private", self.selector))
    }

    pub fn key_table(&self) -> PathBuf {
        self.base_dir.join(KEY_TABLE)
    }

    pub fn signing_table(&self) -> PathBuf {
        self.base_dir.join(SIGNING_TABLE)
    }

    pub fn trusted_hosts(&self) -> PathBuf {
        self.base_dir.join(TRUSTED_HOSTS)
    }

    pub fn key_spec(&self, domain: &Domain) -> KeySpec {
        KeySpec {
            domain: domain.clone(),
            selector: self.selector.clone(),
            size: self.key_size,
        }
    }
}

pub fn default_domain_list() -> PathBuf {
    std::env::temp_dir().join("vhost.dkim")
}
