//! ``src/backend/vfs.rs``
//!
//! # `VfsBackend`: real directories on the local filesystem
//!
//! Listing goes through `tokio::fs`, per-child attributes are fetched on
//! demand, and live updates come from `notify`. When the native watcher
//! cannot be set up (network shares, exotic filesystems) the backend falls
//! back to polling, and failing that, runs without a watch.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Instant,
};

use async_trait::async_trait;
use compact_str::CompactString;
use notify::{
    Config as NotifyConfig, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode,
    Watcher,
    event::{ModifyKind, RenameMode},
};
use tokio::{fs as TokioFs, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use super::{
    retry::with_retry,
    traits::{Backend, BackendEvent, FileRecord, StatOutcome, WatchHandle},
};
use crate::{
    config::{Config, RetryPolicy, WatchConfig},
    error::{CoreError, CoreResult},
    model::{
        attributes::FileAttributes,
        file_info::{DeepCounts, FileInfo, FileKind},
        uri::Uri,
    },
};

pub struct VfsBackend {
    path: PathBuf,
    uri: Uri,
    retry: RetryPolicy,
    watch: WatchConfig,
}

impl VfsBackend {
    #[must_use]
    pub fn new(path: PathBuf, uri: Uri, config: Config) -> Self {
        Self {
            path,
            uri,
            retry: config.retry,
            watch: config.watch,
        }
    }

    async fn read_once(&self, cancel: &CancellationToken) -> CoreResult<Vec<FileRecord>> {
        let location = self.path.to_string_lossy();

        let meta = TokioFs::metadata(&self.path)
            .await
            .map_err(|e| CoreError::from_io(&location, e))?;

        if !meta.is_dir() {
            return Err(CoreError::NotADirectory(location.as_ref().into()));
        }

        let mut read_dir = TokioFs::read_dir(&self.path)
            .await
            .map_err(|e| CoreError::from_io(&location, e))?;

        let mut records: Vec<FileRecord> = Vec::new();

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| CoreError::from_io(&location, e))?
        {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let uri = self.uri.child(&name)?;

            let (info, loaded) = match entry.metadata().await {
                Ok(meta) => (FileInfo::from_metadata(&meta), FileAttributes::INFO),

                // Vanished between readdir and lstat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,

                Err(e) => {
                    debug!("Failed to stat {:?} during listing: {}", entry.path(), e);
                    (FileInfo::default(), FileAttributes::empty())
                }
            };

            records.push(FileRecord {
                key: CompactString::new(&name),
                uri,
                info,
                loaded,
            });
        }

        Ok(records)
    }
}

#[async_trait]
impl Backend for VfsBackend {
    fn name(&self) -> &'static str {
        "vfs"
    }

    #[instrument(skip(self, cancel), fields(path = %self.path.display()))]
    async fn list(&self, cancel: CancellationToken) -> CoreResult<Vec<FileRecord>> {
        let start = Instant::now();
        let location = self.path.to_string_lossy().into_owned();

        let records = with_retry(&self.retry, &location, &cancel, || self.read_once(&cancel)).await?;

        info!(
            marker = "PERF_DIRECTORY_SCAN",
            operation_type = "vfs_list",
            entries = records.len(),
            duration_us = start.elapsed().as_micros(),
            "Directory listing completed"
        );

        Ok(records)
    }

    async fn stat(&self, uri: &Uri, attrs: FileAttributes) -> CoreResult<StatOutcome> {
        let path = uri
            .to_file_path()
            .ok_or_else(|| CoreError::invalid_uri(uri.as_str(), "not a local path"))?;

        stat_path(&path, attrs, &self.retry).await
    }

    fn watch(&self) -> CoreResult<Option<WatchHandle>> {
        if !self.watch.enabled {
            return Ok(None);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let dir = self.path.clone();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for mapped in map_event(&dir, &event) {
                    let _ = tx.send(mapped);
                }
            }
            Err(e) => {
                warn!("Watcher error on {}: {}", dir.display(), e);
                let _ = tx.send(BackendEvent::Rescan);
            }
        };

        if !self.watch.force_polling {
            match RecommendedWatcher::new(handler.clone(), NotifyConfig::default())
                .and_then(|mut w| w.watch(&self.path, RecursiveMode::NonRecursive).map(|()| w))
            {
                Ok(watcher) => {
                    debug!("Native watch established on {}", self.path.display());
                    return Ok(Some(WatchHandle::new(rx, watcher)));
                }
                Err(e) => {
                    info!(
                        "Native watch unavailable on {} ({}), falling back to polling",
                        self.path.display(),
                        e
                    );
                }
            }
        }

        let poll_config = NotifyConfig::default()
            .with_poll_interval(self.watch.poll_interval)
            .with_compare_contents(false);

        match PollWatcher::new(handler, poll_config)
            .and_then(|mut w| w.watch(&self.path, RecursiveMode::NonRecursive).map(|()| w))
        {
            Ok(watcher) => Ok(Some(WatchHandle::new(rx, watcher))),
            Err(e) => Err(CoreError::watch(
                &self.path.to_string_lossy(),
                &e.to_string(),
            )),
        }
    }
}

/// Fetch `attrs` for the object at `path`. INFO failures are fatal for the
/// whole call; the other attributes fail individually.
pub async fn stat_path(
    path: &Path,
    attrs: FileAttributes,
    retry: &RetryPolicy,
) -> CoreResult<StatOutcome> {
    let location = path.to_string_lossy().into_owned();
    let cancel = CancellationToken::new();

    let meta = with_retry(retry, &location, &cancel, || async {
        TokioFs::symlink_metadata(path)
            .await
            .map_err(|e| CoreError::from_io(&location, e))
    })
    .await?;

    let base = FileInfo::from_metadata(&meta);
    let kind = base.kind.unwrap_or(FileKind::Other);

    let mut out = StatOutcome {
        info: base,
        loaded: FileAttributes::INFO,
        failed: FileAttributes::empty(),
    };

    if attrs.contains(FileAttributes::MIME_TYPE) {
        out.info.mime_type = Some(guess_mime(path, kind));
        out.loaded |= FileAttributes::MIME_TYPE;
    }

    if attrs.contains(FileAttributes::LINK_INFO) {
        if kind == FileKind::Symlink {
            match TokioFs::read_link(path).await {
                Ok(target) => {
                    out.info.link_target = Some(target);
                    out.loaded |= FileAttributes::LINK_INFO;
                }
                Err(_) => out.failed |= FileAttributes::LINK_INFO,
            }
        } else {
            out.loaded |= FileAttributes::LINK_INFO;
        }
    }

    if attrs.contains(FileAttributes::DIRECTORY_ITEM_COUNT) {
        if kind == FileKind::Dir {
            match count_items(path).await {
                Ok(count) => {
                    out.info.item_count = Some(count);
                    out.loaded |= FileAttributes::DIRECTORY_ITEM_COUNT;
                }
                Err(_) => out.failed |= FileAttributes::DIRECTORY_ITEM_COUNT,
            }
        } else {
            out.loaded |= FileAttributes::DIRECTORY_ITEM_COUNT;
        }
    }

    if attrs.contains(FileAttributes::DEEP_COUNTS) {
        if kind == FileKind::Dir {
            let root = path.to_path_buf();

            match tokio::task::spawn_blocking(move || deep_counts(&root)).await {
                Ok(counts) => {
                    out.info.deep_counts = Some(counts);
                    out.loaded |= FileAttributes::DEEP_COUNTS;
                }
                Err(_) => out.failed |= FileAttributes::DEEP_COUNTS,
            }
        } else {
            out.loaded |= FileAttributes::DEEP_COUNTS;
        }
    }

    Ok(out)
}

fn guess_mime(path: &Path, kind: FileKind) -> CompactString {
    match kind {
        FileKind::Dir => CompactString::const_new("inode/directory"),
        FileKind::Other => CompactString::const_new("inode/x-special"),
        FileKind::File | FileKind::Symlink => {
            CompactString::new(mime_guess::from_path(path).first_or_octet_stream().essence_str())
        }
    }
}

async fn count_items(path: &Path) -> std::io::Result<u64> {
    let mut read_dir = TokioFs::read_dir(path).await?;
    let mut count: u64 = 0;

    while read_dir.next_entry().await?.is_some() {
        count += 1;
    }

    Ok(count)
}

fn deep_counts(root: &Path) -> DeepCounts {
    let mut counts = DeepCounts::default();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_dir() {
                    counts.directories += 1;
                } else {
                    counts.files += 1;
                    counts.total_size += entry.metadata().map_or(0, |m| m.len());
                }
            }
            Err(_) => counts.unreadable += 1,
        }
    }

    counts
}

/// Translate one `notify` event into child-level changes of `dir`.
fn map_event(dir: &Path, event: &Event) -> Vec<BackendEvent> {
    let child = |p: &Path| -> Option<CompactString> {
        (p.parent() == Some(dir))
            .then(|| p.file_name().and_then(OsStr::to_str).map(CompactString::new))
            .flatten()
    };

    if event.need_rescan() || event.paths.iter().any(|p| p == dir) {
        return vec![BackendEvent::Rescan];
    }

    let mut out = Vec::with_capacity(event.paths.len());

    match event.kind {
        EventKind::Create(_) => out.extend(event.paths.iter().filter_map(|p| child(p)).map(BackendEvent::Created)),

        EventKind::Remove(_) => out.extend(event.paths.iter().filter_map(|p| child(p)).map(BackendEvent::Deleted)),

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            out.extend(event.paths.iter().filter_map(|p| child(p)).map(BackendEvent::Deleted));
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            out.extend(event.paths.iter().filter_map(|p| child(p)).map(BackendEvent::Created));
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to, ..] = event.paths.as_slice() {
                out.extend(child(from).map(BackendEvent::Deleted));
                out.extend(child(to).map(BackendEvent::Created));
            }
        }

        EventKind::Modify(ModifyKind::Name(_)) => {
            for p in &event.paths {
                if let Some(name) = child(p) {
                    if p.symlink_metadata().is_ok() {
                        out.push(BackendEvent::Created(name));
                    } else {
                        out.push(BackendEvent::Deleted(name));
                    }
                }
            }
        }

        EventKind::Modify(_) => out.extend(event.paths.iter().filter_map(|p| child(p)).map(BackendEvent::Changed)),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }

    out
}
