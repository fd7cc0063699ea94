use std::fs;
use std::io;
use std::path::Path;

use crate::error::ProvisionError;

/// Lines that carry data: trimmed, without blanks and `#` comments.
pub fn valid_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Reads `path` through [`valid_lines`]. A missing file reads as empty.
pub fn read_valid_lines(path: &Path) -> Result<Vec<String>, ProvisionError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(valid_lines(&content).map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ProvisionError::io("read", path, e)),
    }
}

/// Mail domain of a host name: `mail.example.com` gives `example.com`,
/// a bare `example.com` is already the domain, `localhost` has none.
pub fn domain_from_fqdn(fqdn: &str) -> Option<&str> {
    let fqdn = fqdn.trim().trim_end_matches('.');
    match fqdn.matches('.').count() {
        0 => None,
        1 => Some(fqdn),
        _ => fqdn.split_once('.').map(|(_, rest)| rest),
    }
}
