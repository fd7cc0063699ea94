use std::fs;
use std::io;
use std::os::unix::fs::{lchown, MetadataExt};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ProvisionError, Result};

/// Numeric owner and group a config tree is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// Owner of `path`, or of its closest ancestor that exists. Must be taken
    /// before anything below `path` is created, otherwise a freshly created
    /// directory would hand its owner (the current user) to the whole tree.
    pub fn of_nearest_existing(path: &Path) -> Result<Self> {
        for candidate in path.ancestors() {
            let candidate = if candidate.as_os_str().is_empty() {
                Path::new(".")
            } else {
                candidate
            };
            match fs::metadata(candidate) {
                Ok(meta) => {
                    return Ok(Self {
                        uid: meta.uid(),
                        gid: meta.gid(),
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ProvisionError::io("stat", candidate, e)),
            }
        }
        Err(ProvisionError::io(
            "stat",
            path,
            io::Error::from(io::ErrorKind::NotFound),
        ))
    }
}

/// Gives `root` and every entry below it the numeric owner and group of
/// `owner`. Returns how many entries were changed.
pub fn normalize_ownership(root: &Path, owner: Owner) -> Result<usize> {
    let Owner { uid, gid } = owner;

    let mut changed = 0;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ProvisionError::io("walk", &path, e.into())
        })?;
        let entry_meta = entry
            .metadata()
            .map_err(|e| ProvisionError::io("stat", entry.path(), e.into()))?;
        if entry_meta.uid() == uid && entry_meta.gid() == gid {
            continue;
        }
        lchown(entry.path(), Some(uid), Some(gid))
            .map_err(|e| ProvisionError::io("chown", entry.path(), e))?;
        changed += 1;
    }

    debug!(root = %root.display(), uid, gid, changed, "normalized ownership");
    Ok(changed)
}
