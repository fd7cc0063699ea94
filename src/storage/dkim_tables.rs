//! The three OpenDKIM lookup tables.
//!
//! Each table is a flat text file with one row per line. Rows are only ever
//! appended, and only when the exact same line is not already present, so a
//! run can be repeated any number of times without duplicating entries.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::config::{Config, Domain};
use crate::error::{ProvisionError, Result};

pub const DEFAULT_TRUSTED_HOSTS: [&str; 2] = ["127.0.0.1", "localhost"];

/// An append-only table file with the rows it held when opened, plus
/// whatever was appended through it since.
#[derive(Debug)]
pub struct LineTable {
    path: PathBuf,
    rows: HashSet<String>,
    needs_newline: bool,
}

impl LineTable {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ProvisionError::io("read", &path, e)),
        };
        let rows = content.lines().map(|l| l.trim().to_string()).collect();
        let needs_newline = !content.is_empty() && !content.ends_with('\n');
        Ok(Self {
            path,
            rows,
            needs_newline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, row: &str) -> bool {
        self.rows.contains(row.trim())
    }

    /// Appends `row` unless an identical line exists. Returns whether the
    /// file was written.
    pub fn ensure_row(&mut self, row: &str) -> Result<bool> {
        if self.contains(row) {
            trace!(table = %self.path.display(), row, "row already present");
            return Ok(false);
        }

        let mut line = String::with_capacity(row.len() + 2);
        if self.needs_newline {
            line.push('\n');
        }
        line.push_str(row);
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| ProvisionError::io("append to", &self.path, e))?;

        self.needs_newline = false;
        self.rows.insert(row.trim().to_string());
        debug!(table = %self.path.display(), row, "appended row");
        Ok(true)
    }
}

/// Key table and signing table, opened once per run.
#[derive(Debug)]
pub struct DkimTables {
    pub key_table: LineTable,
    pub signing_table: LineTable,
}

/// Rows added for one domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub key_row_added: bool,
    pub signing_row_added: bool,
}

impl DkimTables {
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            key_table: LineTable::open(config.key_table())?,
            signing_table: LineTable::open(config.signing_table())?,
        })
    }

    /// Makes sure both rows for `domain` exist. Rows written for other
    /// selectors in earlier runs are kept.
    pub fn sync_domain(&mut self, config: &Config, domain: &Domain) -> Result<SyncResult> {
        let key_row = key_table_row(config, domain);
        let signing_row = signing_table_row(config, domain);
        Ok(SyncResult {
            key_row_added: self.key_table.ensure_row(&key_row)?,
            signing_row_added: self.signing_table.ensure_row(&signing_row)?,
        })
    }
}

/// `<selector>._domainkey.<domain> <domain>:<selector>:<private-key-path>`
pub fn key_table_row(config: &Config, domain: &Domain) -> String {
    let spec = config.key_spec(domain);
    format!(
        "{} {}:{}:{}",
        spec.record_name(),
        domain,
        config.selector,
        config.private_key_path(domain).display()
    )
}

/// `*@<domain> <selector>._domainkey.<domain>`
pub fn signing_table_row(config: &Config, domain: &Domain) -> String {
    format!("*@{} {}", domain, config.key_spec(domain).record_name())
}

/// Creates the base directory and the three table files. Existing files are
/// opened for append only, so their contents and mtime stay as they were.
/// `TrustedHosts` is seeded with the loopback defaults while it is empty.
pub fn ensure_scaffolding(config: &Config) -> Result<()> {
    fs::create_dir_all(&config.base_dir)
        .map_err(|e| ProvisionError::io("create directory", &config.base_dir, e))?;

    for path in [config.key_table(), config.signing_table()] {
        touch(&path)?;
    }

    let trusted = config.trusted_hosts();
    touch(&trusted)?;
    let len = fs::metadata(&trusted)
        .map_err(|e| ProvisionError::io("stat", &trusted, e))?
        .len();
    if len == 0 {
        let mut content = DEFAULT_TRUSTED_HOSTS.join("\n");
        content.push('\n');
        fs::write(&trusted, content).map_err(|e| ProvisionError::io("write", &trusted, e))?;
        info!(path = %trusted.display(), "seeded trusted hosts");
    }
    Ok(())
}

fn touch(path: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
        .map_err(|e| ProvisionError::io("create", path, e))
}
