//! Where domains come from when no explicit list is given.

use std::path::PathBuf;

use mailparse::MailAddr;
use tracing::{debug, warn};

use crate::error::{ProvisionError, Result};
use crate::utils::utils::{domain_from_fqdn, read_valid_lines};

pub const DEFAULT_ACCOUNTS_FILE: &str = "/tmp/docker-mailserver/postfix-accounts.cf";
pub const DEFAULT_VIRTUAL_FILE: &str = "/tmp/docker-mailserver/postfix-virtual.cf";

/// Produces raw domain strings; the resolver validates and de-duplicates.
pub trait DomainSource {
    fn name(&self) -> &'static str;
    fn domains(&self) -> Result<Vec<String>>;
}

/// The mail domain of this host, taken from its fully qualified name.
#[derive(Debug, Clone, Default)]
pub struct HostDomain {
    pub override_hostname: Option<String>,
}

impl DomainSource for HostDomain {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn domains(&self) -> Result<Vec<String>> {
        let fqdn = match &self.override_hostname {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => hostname::get()
                .map_err(ProvisionError::Hostname)?
                .to_string_lossy()
                .into_owned(),
        };
        match domain_from_fqdn(&fqdn) {
            Some(domain) => Ok(vec![domain.to_string()]),
            None => {
                warn!(hostname = %fqdn, "host name is not fully qualified, no domain derived from it");
                Ok(Vec::new())
            }
        }
    }
}

/// Domains of provisioned mailboxes and aliases.
///
/// Reads Postfix style account rows (`user@domain|hash`) and virtual alias
/// rows (`alias@domain target...`). Missing files contribute nothing.
#[derive(Debug, Clone)]
pub struct AccountDomains {
    pub accounts_file: PathBuf,
    pub virtual_file: PathBuf,
}

impl Default for AccountDomains {
    fn default() -> Self {
        Self {
            accounts_file: PathBuf::from(DEFAULT_ACCOUNTS_FILE),
            virtual_file: PathBuf::from(DEFAULT_VIRTUAL_FILE),
        }
    }
}

impl DomainSource for AccountDomains {
    fn name(&self) -> &'static str {
        "mail accounts"
    }

    fn domains(&self) -> Result<Vec<String>> {
        let mut domains = Vec::new();

        for line in read_valid_lines(&self.accounts_file)? {
            let address = line.split('|').next().unwrap_or_default();
            match account_domain(address) {
                Some(domain) => domains.push(domain),
                None => warn!(entry = address, "skipping malformed account entry"),
            }
        }

        for line in read_valid_lines(&self.virtual_file)? {
            let alias = line.split_whitespace().next().unwrap_or_default();
            if let Some((_, domain)) = alias.rsplit_once('@') {
                if !domain.is_empty() {
                    domains.push(domain.to_string());
                }
            }
        }

        debug!(count = domains.len(), "collected account domains");
        Ok(domains)
    }
}

fn account_domain(address: &str) -> Option<String> {
    let list = mailparse::addrparse(address.trim()).ok()?;
    list.iter().find_map(|addr| match addr {
        MailAddr::Single(info) => info
            .addr
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_string())
            .filter(|domain| !domain.is_empty()),
        MailAddr::Group(_) => None,
    })
}
