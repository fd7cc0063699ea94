//! Command line: `clap` flags for the environment, followed by the
//! space separated `keysize`/`selector`/`domain`/`help` words.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{default_domain_list, Config, KeySize, Selector, DEFAULT_BASE_DIR};
use crate::error::UsageError;
use crate::resolver::sources::{
    AccountDomains, HostDomain, DEFAULT_ACCOUNTS_FILE, DEFAULT_VIRTUAL_FILE,
};

pub const USAGE: &str = "\
Creates DKIM keys and configures OpenDKIM for the mail domains of this server.

Usage: dkim-provision [FLAGS] [keysize <n>] [selector <s>] [domain <list>] [help]

Options:
    keysize <n>       bit length of generated keys: 1024, 2048 or 4096 (default: 2048)
    selector <s>      DKIM selector (default: mail)
    domain <list>     comma separated domains to key instead of discovering them
    help              print this text

Flags:
    --config-dir <dir>      OpenDKIM config directory [env: DKIM_CONFIG_DIR]
    --accounts-file <file>  mail accounts file [env: DKIM_ACCOUNTS_FILE]
    --virtual-file <file>   virtual aliases file [env: DKIM_VIRTUAL_FILE]
    --domain-list <file>    scratch file for resolved domains [env: DKIM_DOMAIN_LIST]
    --override-hostname <h> host name used to derive the server domain [env: OVERRIDE_HOSTNAME]

Examples:
    dkim-provision
    dkim-provision keysize 4096 selector 2024 domain example.com,example.org

Keys already present are kept. Delete a domain's key directory to regenerate it.
";

#[derive(Debug, Parser)]
#[command(name = "dkim-provision")]
#[command(about = "Creates DKIM keys and configures OpenDKIM")]
pub struct Cli {
    /// OpenDKIM config directory
    #[arg(long, env = "DKIM_CONFIG_DIR", default_value = DEFAULT_BASE_DIR)]
    pub config_dir: PathBuf,

    /// Mail accounts file (`user@domain|hash` rows)
    #[arg(long, env = "DKIM_ACCOUNTS_FILE", default_value = DEFAULT_ACCOUNTS_FILE)]
    pub accounts_file: PathBuf,

    /// Virtual aliases file (`alias@domain target` rows)
    #[arg(long, env = "DKIM_VIRTUAL_FILE", default_value = DEFAULT_VIRTUAL_FILE)]
    pub virtual_file: PathBuf,

    /// Scratch file for the resolved domain list
    #[arg(long, env = "DKIM_DOMAIN_LIST")]
    pub domain_list: Option<PathBuf>,

    /// Host name used instead of the system one
    #[arg(long, env = "OVERRIDE_HOSTNAME")]
    pub override_hostname: Option<String>,

    /// keysize <n> | selector <s> | domain <list> | help
    #[arg(value_name = "OPTION", trailing_var_arg = true, allow_hyphen_values = true)]
    pub options: Vec<String>,
}

impl Cli {
    pub fn config(&self, options: RunOptions) -> Config {
        Config {
            base_dir: self.config_dir.clone(),
            selector: options.selector,
            key_size: options.key_size,
            domain_override: options.domains,
            domain_list: self.domain_list.clone().unwrap_or_else(default_domain_list),
        }
    }

    pub fn host_domain(&self) -> HostDomain {
        HostDomain {
            override_hostname: self.override_hostname.clone(),
        }
    }

    pub fn account_domains(&self) -> AccountDomains {
        AccountDomains {
            accounts_file: self.accounts_file.clone(),
            virtual_file: self.virtual_file.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub key_size: KeySize,
    pub selector: Selector,
    pub domains: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Help,
}

/// Walks the option words left to right; `help` wins as soon as it is seen.
pub fn parse_options(tokens: &[String]) -> Result<Command, UsageError> {
    let mut options = RunOptions::default();
    let mut tokens = tokens.iter();

    while let Some(token) = tokens.next() {
        match token.as_str() {
            "keysize" => {
                let value = value_for("keysize", tokens.next())?;
                options.key_size = value.parse().map_err(|reason| UsageError::InvalidValue {
                    option: "keysize",
                    value: value.to_string(),
                    reason,
                })?;
            }
            "selector" => {
                let value = value_for("selector", tokens.next())?;
                options.selector = Selector::new(value).map_err(|e| UsageError::InvalidValue {
                    option: "selector",
                    value: value.to_string(),
                    reason: e.to_string(),
                })?;
            }
            "domain" => {
                options.domains = Some(value_for("domain", tokens.next())?.to_string());
            }
            "help" => return Ok(Command::Help),
            other => return Err(UsageError::UnknownOption(other.to_string())),
        }
    }
    Ok(Command::Run(options))
}

fn value_for<'a>(option: &'static str, value: Option<&'a String>) -> Result<&'a str, UsageError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.as_str()),
        _ => Err(UsageError::MissingValue(option)),
    }
}
