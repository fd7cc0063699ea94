//! Decides whether this run provisions OpenDKIM or hands over to Rspamd.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::warn;

pub const DEFAULT_DELEGATE: &str = "/usr/local/bin/rspamd-dkim";

/// Which signers the deployment has switched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSettings {
    pub opendkim_enabled: bool,
    pub rspamd_enabled: bool,
    /// Rspamd's own key provisioning entry point.
    pub delegate: PathBuf,
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self {
            opendkim_enabled: true,
            rspamd_enabled: false,
            delegate: PathBuf::from(DEFAULT_DELEGATE),
        }
    }
}

impl SignerSettings {
    /// Reads `ENABLE_OPENDKIM`, `ENABLE_RSPAMD` and `RSPAMD_DKIM_BIN`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            opendkim_enabled: lookup("ENABLE_OPENDKIM")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.opendkim_enabled),
            rspamd_enabled: lookup("ENABLE_RSPAMD")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.rspamd_enabled),
            delegate: lookup("RSPAMD_DKIM_BIN")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.delegate),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    DelegateTo {
        entry_point: PathBuf,
        args: Vec<OsString>,
    },
}

/// `args` are the arguments after the program name, forwarded untouched
/// when Rspamd owns DKIM.
pub fn check_signer(settings: &SignerSettings, args: &[OsString]) -> GuardOutcome {
    match (settings.rspamd_enabled, settings.opendkim_enabled) {
        (true, false) => GuardOutcome::DelegateTo {
            entry_point: settings.delegate.clone(),
            args: args.to_vec(),
        },
        (true, true) => {
            warn!("both OpenDKIM and Rspamd are enabled, Rspamd takes precedence for DKIM signing");
            GuardOutcome::Proceed
        }
        _ => GuardOutcome::Proceed,
    }
}

/// Runs the delegate to completion and returns its exit code. A delegate
/// killed by a signal reports 1.
pub fn run_delegate(entry_point: &Path, args: &[OsString]) -> io::Result<i32> {
    let status = Command::new(entry_point).args(args).status()?;
    Ok(status.code().unwrap_or(1))
}
