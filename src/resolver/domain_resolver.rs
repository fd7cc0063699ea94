use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::{Config, Domain};
use crate::error::{ProvisionError, Result};
use crate::resolver::sources::DomainSource;
use crate::utils::utils::read_valid_lines;

/// Works out which domains need keys and records them, one per line, in
/// `config.domain_list`.
///
/// An explicit override wins outright and no source is consulted. Otherwise
/// every source contributes and the results are merged. Either way blank
/// lines and comments are dropped and duplicates collapse to one entry.
pub fn resolve_domains(config: &Config, sources: &[&dyn DomainSource]) -> Result<Vec<Domain>> {
    let raw: Vec<String> = match &config.domain_override {
        Some(list) => {
            debug!(list = %list, "using domain override");
            list.split(',').map(str::to_string).collect()
        }
        None => {
            let mut raw = Vec::new();
            for source in sources {
                let found = source.domains()?;
                debug!(source = source.name(), count = found.len(), "queried domain source");
                raw.extend(found);
            }
            raw
        }
    };

    let list = &config.domain_list;
    write_list(list, raw.iter().map(String::as_str))?;

    let domains = canonical_domains(read_valid_lines(list)?);
    write_list(list, domains.iter().map(Domain::as_str))?;
    Ok(domains)
}

/// Reads back the list written by [`resolve_domains`].
pub fn read_domain_list(path: &Path) -> Result<Vec<Domain>> {
    Ok(canonical_domains(read_valid_lines(path)?))
}

/// Removes the scratch list. Already gone is fine.
pub fn remove_domain_list(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(ProvisionError::io("remove", path, e))
        }
        _ => Ok(()),
    }
}

fn canonical_domains(lines: Vec<String>) -> Vec<Domain> {
    let mut unique = BTreeSet::new();
    for line in lines {
        match Domain::new(&line) {
            Ok(domain) => {
                unique.insert(domain);
            }
            Err(e) => warn!(error = %e, "ignoring domain entry"),
        }
    }
    unique.into_iter().collect()
}

fn write_list<'a>(path: &Path, lines: impl Iterator<Item = &'a str>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ProvisionError::io("create directory", parent, e))?;
    }
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content).map_err(|e| ProvisionError::io("write", path, e))
}
