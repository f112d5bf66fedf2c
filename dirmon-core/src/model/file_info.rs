//! `src/model/file_info.rs`
//! ============================================================
//! Attribute values of one directory child.
//!
//! Every field is optional: a record can have some attributes loaded and
//! others still pending. Which fields are meaningful is tracked by the
//! owning [`File`](super::file::File) through its loaded attribute set.

use std::{
    fs::{FileType, Metadata},
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytesize::ByteSize;
use chrono::{DateTime, Local, TimeZone};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::attributes::FileAttributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Dir,
    File,
    Symlink,
    Other,
}

impl FileKind {
    #[must_use]
    pub fn from_file_type(ftype: FileType) -> Self {
        if ftype.is_symlink() {
            Self::Symlink
        } else if ftype.is_dir() {
            Self::Dir
        } else if ftype.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dir => write!(f, "Dir"),
            Self::File => write!(f, "File"),
            Self::Symlink => write!(f, "Symlink"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Recursive totals below a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepCounts {
    pub directories: u64,
    pub files: u64,
    pub unreadable: u64,
    pub total_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    // INFO
    pub kind: Option<FileKind>,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
    pub permissions: Option<u32>,

    // MIME_TYPE
    pub mime_type: Option<CompactString>,

    // LINK_INFO
    pub link_target: Option<PathBuf>,

    // DIRECTORY_ITEM_COUNT
    pub item_count: Option<u64>,

    // DEEP_COUNTS
    pub deep_counts: Option<DeepCounts>,
}

impl FileInfo {
    /// INFO fields from an `lstat` result.
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        let kind = FileKind::from_file_type(meta.file_type());

        Self {
            kind: Some(kind),
            size: Some(if kind == FileKind::Dir { 0 } else { meta.len() }),
            modified: Some(meta.modified().unwrap_or(UNIX_EPOCH)),
            permissions: Some(permission_bits(meta)),
            ..Self::default()
        }
    }

    /// Copy the fields covered by `attrs` from `other`.
    pub fn merge(&mut self, other: &Self, attrs: FileAttributes) {
        if attrs.contains(FileAttributes::INFO) {
            self.kind = other.kind;
            self.size = other.size;
            self.modified = other.modified;
            self.permissions = other.permissions;
        }

        if attrs.contains(FileAttributes::MIME_TYPE) {
            self.mime_type.clone_from(&other.mime_type);
        }

        if attrs.contains(FileAttributes::LINK_INFO) {
            self.link_target.clone_from(&other.link_target);
        }

        if attrs.contains(FileAttributes::DIRECTORY_ITEM_COUNT) {
            self.item_count = other.item_count;
        }

        if attrs.contains(FileAttributes::DEEP_COUNTS) {
            self.deep_counts = other.deep_counts;
        }
    }

    /// Same field-wise comparison restricted to `attrs`.
    #[must_use]
    pub fn differs_in(&self, other: &Self, attrs: FileAttributes) -> bool {
        let mut projected = self.clone();
        projected.merge(other, attrs);

        projected != *self
    }

    #[inline]
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == Some(FileKind::Dir)
    }

    #[must_use]
    pub fn size_human(&self) -> Option<String> {
        self.size.map(|s| ByteSize::b(s).to_string())
    }

    #[expect(clippy::cast_possible_wrap, reason = "Expected")]
    #[must_use]
    pub fn format_date(&self, fmt: &str) -> Option<String> {
        let modified = self.modified?;
        let dur: Duration = modified.duration_since(UNIX_EPOCH).unwrap_or_default();

        Local
            .timestamp_opt(dur.as_secs() as i64, dur.subsec_nanos())
            .single()
            .map(|dt: DateTime<Local>| dt.format(fmt).to_string())
    }
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() { 0o444 } else { 0o644 }
}
