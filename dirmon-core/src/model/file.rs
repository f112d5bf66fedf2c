//! `src/model/file.rs`
//! ============================================================
//! File entity: one child of a [`Directory`].
//!
//! Entities are shared as `Arc<File>`. The engine never swaps a record out
//! for a fresh one while the child still exists; refreshes mutate the state
//! behind the lock so every holder observes the new values.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use compact_str::CompactString;
use parking_lot::RwLock;

use super::{attributes::FileAttributes, file_info::FileInfo, uri::Uri};
use crate::directory::engine::Directory;

/// Mutable part of a [`File`].
#[derive(Debug, Clone, Default)]
struct FileState {
    info: FileInfo,
    /// Attributes whose values in `info` are current.
    loaded: FileAttributes,
    /// Attributes the backend could not produce; not retried until invalidated.
    failed: FileAttributes,
    /// Set once the child disappeared from its directory.
    is_gone: bool,
}

pub struct File {
    key: CompactString,
    uri: Uri,
    directory: Weak<Directory>,
    state: RwLock<FileState>,
}

impl File {
    pub(crate) fn new(
        key: CompactString,
        uri: Uri,
        directory: Weak<Directory>,
        info: FileInfo,
        loaded: FileAttributes,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            uri,
            directory,
            state: RwLock::new(FileState {
                info,
                loaded,
                failed: FileAttributes::empty(),
                is_gone: false,
            }),
        })
    }

    /// Identity within the owning directory: the child name for real
    /// directories, the hit URI for search directories.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name (last path segment).
    #[must_use]
    pub fn name(&self) -> String {
        self.uri.file_name().unwrap_or_else(|| self.key.to_string())
    }

    #[inline]
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Owning directory, if it is still alive.
    #[must_use]
    pub fn directory(&self) -> Option<Arc<Directory>> {
        self.directory.upgrade()
    }

    #[must_use]
    pub fn info(&self) -> FileInfo {
        self.state.read().info.clone()
    }

    #[must_use]
    pub fn loaded_attributes(&self) -> FileAttributes {
        self.state.read().loaded
    }

    /// Attributes the backend could not produce. They count as ready, so a
    /// caller that needs the values checks here.
    #[must_use]
    pub fn failed_attributes(&self) -> FileAttributes {
        self.state.read().failed
    }

    /// All of `attrs` hold current values.
    #[must_use]
    pub fn has_attributes(&self, attrs: FileAttributes) -> bool {
        self.state.read().loaded.satisfies(attrs)
    }

    /// Nothing more can be fetched for `attrs`: loaded or known to fail.
    #[must_use]
    pub fn is_ready_for(&self, attrs: FileAttributes) -> bool {
        let state = self.state.read();

        (state.loaded | state.failed).satisfies(attrs)
    }

    /// Part of `attrs` neither loaded nor known to fail.
    #[must_use]
    pub fn missing(&self, attrs: FileAttributes) -> FileAttributes {
        let state = self.state.read();

        (state.loaded | state.failed).missing(attrs)
    }

    #[must_use]
    pub fn is_gone(&self) -> bool {
        self.state.read().is_gone
    }

    /// Dotfiles and editor backups (`name~`) are hidden.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        let name = self.name();

        name.starts_with('.') || name.ends_with('~')
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.state.read().info.is_dir()
    }

    /// Same entity, not merely the same name.
    #[inline]
    #[must_use]
    pub fn ptr_eq(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// Store fresh values for `attrs`. Returns `true` when a visible value
    /// changed or the attributes were not loaded before.
    pub(crate) fn apply(&self, info: &FileInfo, attrs: FileAttributes) -> bool {
        let mut state = self.state.write();

        let newly_loaded = !state.loaded.satisfies(attrs);
        let changed = state.info.differs_in(info, attrs);

        state.info.merge(info, attrs);
        state.loaded |= attrs;
        state.failed.remove(attrs);
        state.is_gone = false;

        newly_loaded || changed
    }

    pub(crate) fn mark_failed(&self, attrs: FileAttributes) {
        let mut state = self.state.write();

        let loaded = state.loaded;
        state.failed |= attrs.difference(loaded);
    }

    /// Forget `attrs` so the next request fetches them again. Values stay in
    /// place until replaced.
    pub(crate) fn invalidate(&self, attrs: FileAttributes) {
        let mut state = self.state.write();

        state.loaded.remove(attrs);
        state.failed.remove(attrs);
    }

    pub(crate) fn mark_gone(&self) {
        self.state.write().is_gone = true;
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();

        f.debug_struct("File")
            .field("key", &self.key)
            .field("uri", &self.uri.as_str())
            .field("loaded", &state.loaded)
            .field("failed", &state.failed)
            .field("is_gone", &state.is_gone)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn detached(name: &str) -> Arc<File> {
        let uri = Uri::from_path(Path::new("/data")).unwrap().child(name).unwrap();

        File::new(
            name.into(),
            uri,
            Weak::new(),
            FileInfo::default(),
            FileAttributes::empty(),
        )
    }

    #[test]
    fn apply_reports_first_load_and_changes() {
        let file = detached("a.txt");
        let info = FileInfo {
            size: Some(4),
            ..FileInfo::default()
        };

        assert!(file.apply(&info, FileAttributes::INFO));
        assert!(!file.apply(&info, FileAttributes::INFO));

        let bigger = FileInfo {
            size: Some(8),
            ..FileInfo::default()
        };
        assert!(file.apply(&bigger, FileAttributes::INFO));
        assert_eq!(file.info().size, Some(8));
    }

    #[test]
    fn failed_attributes_count_as_ready_but_not_loaded() {
        let file = detached("b.txt");
        file.mark_failed(FileAttributes::DEEP_COUNTS);

        assert!(file.is_ready_for(FileAttributes::DEEP_COUNTS));
        assert!(!file.has_attributes(FileAttributes::DEEP_COUNTS));

        file.invalidate(FileAttributes::DEEP_COUNTS);
        assert!(!file.is_ready_for(FileAttributes::DEEP_COUNTS));
    }

    #[test]
    fn mark_failed_leaves_loaded_attributes_alone() {
        let file = detached("c.txt");
        file.apply(&FileInfo::default(), FileAttributes::INFO);

        file.mark_failed(FileAttributes::INFO | FileAttributes::MIME_TYPE);

        assert_eq!(file.loaded_attributes(), FileAttributes::INFO);
        assert_eq!(file.failed_attributes(), FileAttributes::MIME_TYPE);
        assert!(file.is_ready_for(FileAttributes::INFO | FileAttributes::MIME_TYPE));
    }

    #[test]
    fn hidden_covers_dotfiles_and_backups() {
        assert!(detached(".profile").is_hidden());
        assert!(detached("notes.txt~").is_hidden());
        assert!(!detached("notes.txt").is_hidden());
    }

    #[test]
    fn detached_file_has_no_directory() {
        assert!(detached("c").directory().is_none());
    }
}
