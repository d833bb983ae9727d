use std::borrow::Cow;
use std::fs::{FileType, Metadata};
use std::path::Path;

use crate::model::FsEntryKind;

pub fn entry_kind(file_type: FileType) -> FsEntryKind {
    if file_type.is_symlink() {
        FsEntryKind::Symlink
    } else if file_type.is_dir() {
        FsEntryKind::Dir
    } else if file_type.is_file() {
        FsEntryKind::File
    } else {
        FsEntryKind::Other
    }
}

/// Permission bits (`mode & 0o777`).
#[cfg(unix)]
pub fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

// No mode bits off unix; approximate from the read-only attribute.
#[cfg(not(unix))]
pub fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}

/// Raw path bytes, unchanged even when they are not valid UTF-8.
#[cfg(unix)]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
        Cow::Owned(text) => Cow::Owned(text.into_bytes()),
    }
}
