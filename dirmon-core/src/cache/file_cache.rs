//! `src/cache/file_cache.rs`
//! ============================================================================
//! # File Entity Cache
//!
//! Known children of one directory, keyed by entity key, in listing order.
//! Reconciliation against a fresh listing is diff based: surviving children
//! keep their `Arc<File>` and are updated in place.

use std::sync::Arc;

use ahash::AHashSet;
use compact_str::CompactString;
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    backend::traits::FileRecord,
    model::{attributes::FileAttributes, file::File},
};

/// Outcome of [`FileCache::reconcile`].
#[derive(Debug, Default)]
pub struct Reconciled {
    pub added: Vec<Arc<File>>,
    /// Survivors whose values were refreshed.
    pub refreshed: Vec<Arc<File>>,
    pub removed: Vec<Arc<File>>,
}

#[derive(Debug, Default)]
pub struct FileCache {
    files: IndexMap<CompactString, Arc<File>, ahash::RandomState>,
}

impl FileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<File>> {
        self.files.get(key)
    }

    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    /// True only for the very entity stored here, not a look-alike.
    #[must_use]
    pub fn contains(&self, file: &Arc<File>) -> bool {
        self.files
            .get(file.key())
            .is_some_and(|cached| File::ptr_eq(cached, file))
    }

    /// Insert a new entity. Returns `false` and leaves the cache untouched
    /// when the key is already present.
    pub fn insert(&mut self, file: Arc<File>) -> bool {
        if self.files.contains_key(file.key()) {
            return false;
        }

        self.files.insert(CompactString::new(file.key()), file);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<Arc<File>> {
        let removed = self.files.shift_remove(key);

        if let Some(file) = &removed {
            file.mark_gone();
        }

        removed
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<File>> {
        self.files.values()
    }

    #[must_use]
    pub fn files(&self) -> Vec<Arc<File>> {
        self.files.values().cloned().collect()
    }

    /// Forget `attrs` on every entity.
    pub fn invalidate_all(&self, attrs: FileAttributes) {
        for file in self.files.values() {
            file.invalidate(attrs);
        }
    }

    /// True when every entity is ready for `attrs`.
    #[must_use]
    pub fn all_ready_for(&self, attrs: FileAttributes) -> bool {
        attrs.is_empty() || self.files.values().all(|f| f.is_ready_for(attrs))
    }

    /// Bring the cache in line with a complete listing.
    ///
    /// `make` builds entities for children seen for the first time. Records
    /// carry INFO, which is applied in place to survivors.
    ///
    /// Keys in `settled` changed after the listing was taken; the cache is
    /// newer than the listing for them and is left as it is.
    pub fn reconcile<F>(
        &mut self,
        listing: Vec<FileRecord>,
        settled: &AHashSet<CompactString>,
        mut make: F,
    ) -> Reconciled
    where
        F: FnMut(FileRecord) -> Arc<File>,
    {
        let mut out = Reconciled::default();
        let mut seen: AHashSet<CompactString> = settled.clone();
        seen.reserve(listing.len());

        for record in listing {
            if !seen.insert(record.key.clone()) {
                continue;
            }

            if let Some(existing) = self.files.get(record.key.as_str()) {
                existing.apply(&record.info, record.loaded);
                out.refreshed.push(Arc::clone(existing));
            } else {
                let file = make(record);
                self.files.insert(CompactString::new(file.key()), Arc::clone(&file));
                out.added.push(file);
            }
        }

        let stale: Vec<CompactString> = self
            .files
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();

        for key in stale {
            if let Some(file) = self.remove(&key) {
                out.removed.push(file);
            }
        }

        debug!(
            marker = "FILE_CACHE",
            operation_type = "reconcile",
            added = out.added.len(),
            refreshed = out.refreshed.len(),
            removed = out.removed.len(),
            "Reconciled cache against listing"
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Weak};

    use super::*;
    use crate::model::{file_info::FileInfo, uri::Uri};

    fn record(name: &str, size: u64) -> FileRecord {
        let uri = Uri::from_path(Path::new("/data")).unwrap().child(name).unwrap();

        FileRecord {
            key: name.into(),
            uri,
            info: FileInfo {
                size: Some(size),
                ..FileInfo::default()
            },
            loaded: FileAttributes::INFO,
        }
    }

    fn make(rec: FileRecord) -> Arc<File> {
        File::new(rec.key, rec.uri, Weak::new(), rec.info, rec.loaded)
    }

    #[test]
    fn reconcile_preserves_identity_of_survivors() {
        let mut cache = FileCache::new();
        cache.reconcile(vec![record("a", 1), record("b", 2)], &AHashSet::new(), make);
        let a_before = Arc::clone(cache.get("a").unwrap());

        let diff = cache.reconcile(vec![record("a", 10), record("c", 3)], &AHashSet::new(), make);

        let a_after = cache.get("a").unwrap();
        assert!(File::ptr_eq(&a_before, a_after));
        assert_eq!(a_before.info().size, Some(10));

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].key(), "c");
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.removed[0].is_gone());
        assert!(!cache.contains_key("b"));
    }

    #[test]
    fn contains_checks_identity_not_name() {
        let mut cache = FileCache::new();
        cache.reconcile(vec![record("a", 1)], &AHashSet::new(), make);

        let impostor = make(record("a", 1));
        assert!(!cache.contains(&impostor));
        assert!(cache.contains(cache.get("a").unwrap()));
    }

    #[test]
    fn insert_refuses_duplicates() {
        let mut cache = FileCache::new();

        assert!(cache.insert(make(record("x", 1))));
        assert!(!cache.insert(make(record("x", 2))));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("x").unwrap().info().size, Some(1));
    }

    #[test]
    fn settled_keys_keep_their_live_state() {
        let mut cache = FileCache::new();
        cache.reconcile(vec![record("a", 1), record("b", 2)], &AHashSet::new(), make);

        // Since the listing was taken: "b" was deleted, "new" was created
        cache.remove("b");
        cache.insert(make(record("new", 5)));
        let settled: AHashSet<CompactString> = ["b".into(), "new".into()].into_iter().collect();

        let diff = cache.reconcile(vec![record("a", 1), record("b", 2)], &settled, make);

        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(cache.contains_key("new"));
        assert!(!cache.contains_key("b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn readiness_tracks_loaded_attributes() {
        let mut cache = FileCache::new();
        cache.reconcile(vec![record("a", 1), record("b", 2)], &AHashSet::new(), make);

        assert!(cache.all_ready_for(FileAttributes::INFO));
        assert!(!cache.all_ready_for(FileAttributes::MIME_TYPE));
        assert!(!cache.get("a").unwrap().is_ready_for(FileAttributes::MIME_TYPE));
    }
}
