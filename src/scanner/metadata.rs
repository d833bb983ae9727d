use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::model::MetadataRecord;
use crate::platform::{entry_kind, permission_bits};

/// Stats `path` without following symlinks, so links are reported as links.
pub fn resolve(path: &Path) -> io::Result<MetadataRecord> {
    let meta = fs::symlink_metadata(path)?;
    Ok(MetadataRecord {
        path: path.to_path_buf(),
        size: meta.len(),
        kind: entry_kind(meta.file_type()),
        permissions: permission_bits(&meta),
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    })
}
