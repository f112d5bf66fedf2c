//! `src/directory/events.rs`
//!
//! What monitors receive, and the per-directory batch that coalesces changes
//! between two flushes.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{error::CoreError, model::file::File};

#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    /// Sent once per registration, when the listing is complete and every
    /// entity carries the monitored attributes.
    Ready(Vec<Arc<File>>),
    FilesAdded(Vec<Arc<File>>),
    FilesChanged(Vec<Arc<File>>),
    FilesRemoved(Vec<Arc<File>>),
    DoneLoading,
    LoadError(CoreError),
}

impl DirectoryEvent {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::FilesAdded(_) => "files_added",
            Self::FilesChanged(_) => "files_changed",
            Self::FilesRemoved(_) => "files_removed",
            Self::DoneLoading => "done_loading",
            Self::LoadError(_) => "load_error",
        }
    }

    /// Files carried by the event, if any.
    #[must_use]
    pub fn files(&self) -> &[Arc<File>] {
        match self {
            Self::Ready(files)
            | Self::FilesAdded(files)
            | Self::FilesChanged(files)
            | Self::FilesRemoved(files) => files,
            Self::DoneLoading | Self::LoadError(_) => &[],
        }
    }
}

/// Entities are tracked by pointer: a child that is removed and re-created
/// under the same name is two different entities.
fn identity(file: &Arc<File>) -> usize {
    Arc::as_ptr(file) as usize
}

#[derive(Default)]
pub(crate) struct PendingBatch {
    added: IndexMap<usize, Arc<File>>,
    changed: IndexMap<usize, Arc<File>>,
    removed: IndexMap<usize, Arc<File>>,
    pub done_loading: bool,
    pub load_error: Option<CoreError>,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.removed.is_empty()
            && !self.done_loading
            && self.load_error.is_none()
    }

    pub fn add(&mut self, file: &Arc<File>) {
        self.added.insert(identity(file), Arc::clone(file));
    }

    /// Ignored for entities already queued as added.
    pub fn change(&mut self, file: &Arc<File>) {
        let id = identity(file);

        if !self.added.contains_key(&id) {
            self.changed.insert(id, Arc::clone(file));
        }
    }

    /// An entity added within the same batch cancels out entirely.
    pub fn remove(&mut self, file: &Arc<File>) {
        let id = identity(file);
        self.changed.shift_remove(&id);

        if self.added.shift_remove(&id).is_none() {
            self.removed.insert(id, Arc::clone(file));
        }
    }

    /// Drop change entries matching `pred`; they will be queued again later.
    pub fn defer_changes(&mut self, mut pred: impl FnMut(&Arc<File>) -> bool) {
        self.changed.retain(|_, f| !pred(f));
    }

    /// Turn the batch into events for one monitor.
    pub fn events_for(&self, monitor_hidden_files: bool) -> Vec<DirectoryEvent> {
        let mut events = Vec::with_capacity(5);

        let sets = [
            (&self.added, DirectoryEvent::FilesAdded as fn(Vec<Arc<File>>) -> DirectoryEvent),
            (&self.changed, DirectoryEvent::FilesChanged),
            (&self.removed, DirectoryEvent::FilesRemoved),
        ];

        for (set, make) in sets {
            let files = visible(set.values(), monitor_hidden_files);
            if !files.is_empty() {
                events.push(make(files));
            }
        }

        if let Some(err) = &self.load_error {
            events.push(DirectoryEvent::LoadError(err.clone()));
        }

        if self.done_loading {
            events.push(DirectoryEvent::DoneLoading);
        }

        events
    }
}

/// Apply a monitor's hidden-file policy.
pub(crate) fn visible<'a>(
    files: impl IntoIterator<Item = &'a Arc<File>>,
    monitor_hidden_files: bool,
) -> Vec<Arc<File>> {
    files
        .into_iter()
        .filter(|f| monitor_hidden_files || !f.is_hidden())
        .cloned()
        .collect()
}
