//! Shared fixtures: an in-memory backend with call accounting, and helpers
//! to observe directory events.

#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use compact_str::CompactString;
use dirmon_core::{
    Config, CoreError, CoreResult, DirectoryEvent, DirectoryRegistry, FileAttributes, Uri,
    backend::{Backend, BackendEvent, BackendFactory, FileRecord, StatOutcome, WatchHandle},
    model::{FileInfo, FileKind},
};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

pub const MOCK_ROOT: &str = "/mock/dir";

pub struct MockBackend {
    root: Uri,
    entries: Mutex<Vec<(CompactString, u64)>>,
    pub list_calls: AtomicUsize,
    pub stat_calls: Mutex<Vec<(CompactString, FileAttributes)>>,
    pub fail_list: AtomicBool,
    /// Take the listing's snapshot before the delay instead of after it.
    pub snapshot_first: AtomicBool,
    list_delay: Duration,
    stat_delay: Duration,
    events: Mutex<Option<UnboundedSender<BackendEvent>>>,
}

impl MockBackend {
    pub fn new(names: &[&str]) -> Arc<Self> {
        Self::with_delays(names, Duration::from_millis(20), Duration::from_millis(5))
    }

    pub fn with_delays(names: &[&str], list_delay: Duration, stat_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            root: Uri::from_path(Path::new(MOCK_ROOT)).unwrap(),
            entries: Mutex::new(
                names
                    .iter()
                    .enumerate()
                    .map(|(i, n)| (CompactString::new(n), i as u64 * 10))
                    .collect(),
            ),
            list_calls: AtomicUsize::new(0),
            stat_calls: Mutex::new(Vec::new()),
            fail_list: AtomicBool::new(false),
            snapshot_first: AtomicBool::new(false),
            list_delay,
            stat_delay,
            events: Mutex::new(None),
        })
    }

    pub fn root(&self) -> Uri {
        self.root.clone()
    }

    pub fn add_entry(&self, name: &str, size: u64) {
        self.entries.lock().push((CompactString::new(name), size));
    }

    pub fn remove_entry(&self, name: &str) {
        self.entries.lock().retain(|(n, _)| n != name);
    }

    pub fn set_size(&self, name: &str, size: u64) {
        for entry in self.entries.lock().iter_mut() {
            if entry.0 == name {
                entry.1 = size;
            }
        }
    }

    /// Inject a change as if the watcher had seen it.
    pub fn emit(&self, event: BackendEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            tx.send(event).unwrap();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.events.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn stat_count(&self) -> usize {
        self.stat_calls.lock().len()
    }

    pub fn record(&self, name: &str, size: u64) -> FileRecord {
        FileRecord {
            key: CompactString::new(name),
            uri: self.root.child(name).unwrap(),
            info: Self::info_for(size),
            loaded: FileAttributes::INFO,
        }
    }

    fn info_for(size: u64) -> FileInfo {
        FileInfo {
            kind: Some(FileKind::File),
            size: Some(size),
            ..FileInfo::default()
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list(&self, cancel: CancellationToken) -> CoreResult<Vec<FileRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let early = self
            .snapshot_first
            .load(Ordering::SeqCst)
            .then(|| self.entries.lock().clone());

        tokio::select! {
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            () = tokio::time::sleep(self.list_delay) => {}
        }

        if self.fail_list.load(Ordering::SeqCst) {
            return Err(CoreError::PermissionDenied(MOCK_ROOT.into()));
        }

        let entries = early.unwrap_or_else(|| self.entries.lock().clone());
        entries
            .into_iter()
            .map(|(name, size)| -> CoreResult<FileRecord> {
                Ok(FileRecord {
                    uri: self.root.child(&name)?,
                    key: name,
                    info: Self::info_for(size),
                    loaded: FileAttributes::INFO,
                })
            })
            .collect()
    }

    async fn stat(&self, uri: &Uri, attrs: FileAttributes) -> CoreResult<StatOutcome> {
        let name = CompactString::from(uri.file_name().unwrap_or_default());
        self.stat_calls.lock().push((name.clone(), attrs));

        tokio::time::sleep(self.stat_delay).await;

        let size = self
            .entries
            .lock()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, size)| *size)
            .ok_or_else(|| CoreError::NotFound(name.clone()))?;

        let mut info = Self::info_for(size);
        if attrs.contains(FileAttributes::MIME_TYPE) {
            info.mime_type = Some(CompactString::const_new("text/plain"));
        }
        if attrs.contains(FileAttributes::DIRECTORY_ITEM_COUNT) {
            info.item_count = Some(0);
        }

        Ok(StatOutcome {
            info,
            loaded: attrs | FileAttributes::INFO,
            failed: FileAttributes::empty(),
        })
    }

    fn watch(&self) -> CoreResult<Option<WatchHandle>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);

        Ok(Some(WatchHandle::new(rx, ())))
    }
}

pub struct MockFactory(pub Arc<MockBackend>);

impl BackendFactory for MockFactory {
    fn create(&self, _uri: &Uri, _config: &Config) -> CoreResult<Arc<dyn Backend>> {
        Ok(Arc::clone(&self.0) as Arc<dyn Backend>)
    }
}

pub fn mock_registry(backend: &Arc<MockBackend>) -> DirectoryRegistry {
    DirectoryRegistry::with_factory(Arc::new(MockFactory(Arc::clone(backend))), Config::default())
}

/// What a monitor saw, plus whether every file carried `attrs` at the time
/// of delivery.
#[derive(Debug, Clone)]
pub struct Seen {
    pub event: DirectoryEvent,
    pub complete: bool,
}

pub fn recorder(
    attrs: FileAttributes,
) -> (
    impl Fn(&DirectoryEvent) + Send + Sync + 'static,
    UnboundedReceiver<Seen>,
) {
    let (tx, rx) = mpsc::unbounded_channel();

    let callback = move |event: &DirectoryEvent| {
        let complete = event.files().iter().all(|f| f.has_attributes(attrs));
        let _ = tx.send(Seen {
            event: event.clone(),
            complete,
        });
    };

    (callback, rx)
}

pub async fn next_seen(rx: &mut UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a directory event")
        .expect("recorder dropped")
}

/// Skip events until one of `kind` arrives.
pub async fn wait_for(rx: &mut UnboundedReceiver<Seen>, kind: &str) -> Seen {
    loop {
        let seen = next_seen(rx).await;
        if seen.event.kind() == kind {
            return seen;
        }
    }
}

/// Let spawned work and any pending flushes run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}
