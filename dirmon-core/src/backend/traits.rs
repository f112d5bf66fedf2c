//! `src/backend/traits.rs`
//!
//! The seam between the directory engine and whatever produces its entities.
//! The engine only ever talks to `dyn Backend`; which implementation a
//! directory gets is decided once, by URI scheme, when it is created.

use std::{any::Any, sync::Arc};

use async_trait::async_trait;
use compact_str::CompactString;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{CoreError, CoreResult},
    model::{attributes::FileAttributes, file_info::FileInfo, uri::Uri},
    search::query::Query,
};

/// One child as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub key: CompactString,
    pub uri: Uri,
    pub info: FileInfo,
    /// Attributes `info` already carries (normally `INFO`).
    pub loaded: FileAttributes,
}

/// Result of a `stat`: some attributes may load while others fail.
#[derive(Debug, Clone, Default)]
pub struct StatOutcome {
    pub info: FileInfo,
    pub loaded: FileAttributes,
    pub failed: FileAttributes,
}

/// Raw change reported by a watch, keyed by entity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Created(CompactString),
    Changed(CompactString),
    Deleted(CompactString),
    /// A child surfaced with its INFO already fetched.
    Found(FileRecord),
    /// Events were lost or the directory itself changed; re-list.
    Rescan,
}

impl BackendEvent {
    /// Entity key the event is about, if it concerns a single child.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Created(key) | Self::Changed(key) | Self::Deleted(key) => Some(key),
            Self::Found(record) => Some(&record.key),
            Self::Rescan => None,
        }
    }
}

/// Live watch. Dropping it stops the underlying watcher.
pub struct WatchHandle {
    pub events: mpsc::UnboundedReceiver<BackendEvent>,
    _guard: Box<dyn Any + Send>,
}

impl WatchHandle {
    pub fn new(events: mpsc::UnboundedReceiver<BackendEvent>, guard: impl Any + Send) -> Self {
        Self {
            events,
            _guard: Box::new(guard),
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Enumerate every child. Transient failures are retried internally;
    /// cancellation yields [`CoreError::Cancelled`].
    async fn list(&self, cancel: CancellationToken) -> CoreResult<Vec<FileRecord>>;

    /// Fetch `attrs` for one child. `Err` means the child itself is
    /// unreachable (e.g. deleted); per-attribute failures go in the outcome.
    async fn stat(&self, uri: &Uri, attrs: FileAttributes) -> CoreResult<StatOutcome>;

    /// Subscribe to external changes. `Ok(None)` when the backend has no
    /// live updates, `Err` when watching was attempted and failed; the
    /// engine works without live updates in both cases.
    fn watch(&self) -> CoreResult<Option<WatchHandle>>;

    /// Bind a query. Only meaningful for search backends.
    fn set_query(&self, _query: Query) -> CoreResult<()> {
        Err(CoreError::invalid_state("not a search directory"))
    }
}

/// Chooses the backend for a freshly created directory.
pub trait BackendFactory: Send + Sync + 'static {
    fn create(&self, uri: &Uri, config: &Config) -> CoreResult<Arc<dyn Backend>>;
}

/// Default factory: `file` → [`VfsBackend`](super::vfs::VfsBackend),
/// `x-baul-search` → [`SearchBackend`](super::search::SearchBackend).
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemeBackendFactory;

impl BackendFactory for SchemeBackendFactory {
    fn create(&self, uri: &Uri, config: &Config) -> CoreResult<Arc<dyn Backend>> {
        if uri.is_search() {
            return Ok(Arc::new(super::search::SearchBackend::new(
                uri.clone(),
                config.clone(),
            )));
        }

        let path = uri
            .to_file_path()
            .ok_or_else(|| CoreError::UnsupportedScheme(uri.scheme().into()))?;

        Ok(Arc::new(super::vfs::VfsBackend::new(
            path,
            uri.clone(),
            config.clone(),
        )))
    }
}
