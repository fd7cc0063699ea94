//! One provisioning run, from domain resolution to ownership fix-up.

use tracing::{info, warn};

use crate::config::{Config, Domain};
use crate::error::Result;
use crate::resolver::domain_resolver::{read_domain_list, remove_domain_list, resolve_domains};
use crate::resolver::sources::DomainSource;
use crate::storage::dkim_tables::{ensure_scaffolding, DkimTables};
use crate::storage::key_store::{ensure_key, KeyStatus};
use crate::utils::dkim::KeyGenerator;
use crate::utils::ownership::{normalize_ownership, Owner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing to key; the config directory was not touched.
    NoDomains,
    Completed(RunReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub domains: Vec<Domain>,
    pub keys_generated: usize,
    pub keys_existing: usize,
    pub rows_added: usize,
    pub ownership_changes: usize,
}

/// Resolves the domains, then gives each one a key pair and its table rows.
///
/// Every step per domain is idempotent, so an error part way through leaves
/// earlier domains fully provisioned and a re-run picks up where this one
/// stopped.
pub fn run(
    config: &Config,
    sources: &[&dyn DomainSource],
    generator: &dyn KeyGenerator,
) -> Result<RunOutcome> {
    let resolved = resolve_domains(config, sources)?;
    if resolved.is_empty() {
        warn!("no domains found, not generating any DKIM keys");
        remove_domain_list(&config.domain_list)?;
        return Ok(RunOutcome::NoDomains);
    }
    info!(count = resolved.len(), "resolved domains");

    // The volume's owner, read before this run creates any directory.
    let owner = Owner::of_nearest_existing(&config.base_dir)?;
    ensure_scaffolding(config)?;
    let mut tables = DkimTables::open(config)?;
    let mut report = RunReport::default();

    for domain in read_domain_list(&config.domain_list)? {
        match ensure_key(config, &domain, generator)? {
            KeyStatus::Generated(_) => report.keys_generated += 1,
            KeyStatus::Existing(_) => report.keys_existing += 1,
        }
        let synced = tables.sync_domain(config, &domain)?;
        report.rows_added += usize::from(synced.key_row_added) + usize::from(synced.signing_row_added);
        report.domains.push(domain);
    }

    remove_domain_list(&config.domain_list)?;
    report.ownership_changes = normalize_ownership(&config.base_dir, owner)?;

    info!(
        domains = report.domains.len(),
        generated = report.keys_generated,
        existing = report.keys_existing,
        rows_added = report.rows_added,
        "DKIM provisioning finished"
    );
    Ok(RunOutcome::Completed(report))
}
