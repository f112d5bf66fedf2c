//! `src/directory/engine.rs`
//! ============================================================================
//! # Directory: live view of one location
//!
//! A [`Directory`] owns the entity cache of one URI together with every
//! client registration against it, and drives its backend:
//!
//! - at most one listing is in flight; a reload requested meanwhile is queued
//!   and callbacks registered meanwhile are served by that listing
//! - attribute fetches are deduplicated: a request covered by a fetch already
//!   in flight issues nothing new
//! - change notifications are batched and flushed on the next runtime tick,
//!   one event per kind per flush
//!
//! ## Locking
//! `state` is a plain mutex, never held across `.await` or while client code
//! runs. Client code runs under `delivery`, a re-entrant lock that removal and
//! cancellation also take. After `monitor_remove` or `cancel_callback`
//! returns, nothing more reaches that registration, and both may be called
//! from inside a callback.

use std::{
    mem,
    sync::{Arc, Weak},
    time::Instant,
};

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use futures::{StreamExt, stream};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::{runtime::Handle, sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    events::{DirectoryEvent, PendingBatch, visible},
    registry::RegistryInner,
    registry_table::{CallbackId, ClientId, MonitorCallback, RegistryTable},
};
use crate::{
    backend::traits::{Backend, BackendEvent, FileRecord, StatOutcome},
    cache::file_cache::FileCache,
    config::Config,
    error::{CoreError, CoreResult},
    model::{attributes::FileAttributes, file::File, uri::Uri},
    search::query::Query,
};

/// Progress of the directory's listing.
#[derive(Debug, Clone)]
pub enum ListState {
    NotLoaded,
    Loading,
    Loaded,
    /// Last listing failed; the cache keeps what it had.
    Failed(CoreError),
}

struct DirectoryState {
    cache: FileCache,
    list_state: ListState,
    /// A listing completed at least once; later ones report survivors as changed.
    loaded_once: bool,
    reload_queued: bool,
    list_cancel: Option<CancellationToken>,
    /// Keys changed by live events since the running listing started.
    touched_while_listing: AHashSet<CompactString>,
    /// Attributes being fetched per entity key.
    stat_in_flight: AHashMap<CompactString, FileAttributes>,
    table: RegistryTable,
    pending: PendingBatch,
    flush_scheduled: bool,
    watch_task: Option<JoinHandle<()>>,
}

pub struct Directory {
    uri: Uri,
    backend: Arc<dyn Backend>,
    config: Config,
    runtime: Handle,
    registry: Weak<RegistryInner>,
    state: Mutex<DirectoryState>,
    delivery: ReentrantMutex<()>,
}

/// Work computed under the state lock, executed after it is released.
struct MonitorDelivery {
    client: ClientId,
    registration: u64,
    callback: MonitorCallback,
    events: Vec<DirectoryEvent>,
}

impl Directory {
    pub(crate) fn new(
        uri: Uri,
        backend: Arc<dyn Backend>,
        config: Config,
        runtime: Handle,
        registry: Weak<RegistryInner>,
    ) -> Arc<Self> {
        Arc::new(Self {
            uri,
            backend,
            config,
            runtime,
            registry,
            state: Mutex::new(DirectoryState {
                cache: FileCache::new(),
                list_state: ListState::NotLoaded,
                loaded_once: false,
                reload_queued: false,
                list_cancel: None,
                touched_while_listing: AHashSet::new(),
                stat_in_flight: AHashMap::new(),
                table: RegistryTable::default(),
                pending: PendingBatch::default(),
                flush_scheduled: false,
                watch_task: None,
            }),
            delivery: ReentrantMutex::new(()),
        })
    }

    #[inline]
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[must_use]
    pub fn list_state(&self) -> ListState {
        self.state.lock().list_state.clone()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.state.lock().list_state, ListState::Loaded)
    }

    /// The cache reflects a complete, current listing.
    #[must_use]
    pub fn are_all_files_seen(&self) -> bool {
        self.is_loaded()
    }

    #[must_use]
    pub fn is_not_empty(&self) -> bool {
        !self.state.lock().cache.is_empty()
    }

    /// True for this exact entity, not one that merely shares its name.
    #[must_use]
    pub fn contains_file(&self, file: &Arc<File>) -> bool {
        self.state.lock().cache.contains(file)
    }

    #[must_use]
    pub fn get_file(&self, key: &str) -> Option<Arc<File>> {
        self.state.lock().cache.get(key).cloned()
    }

    /// Snapshot of the known entities in listing order.
    #[must_use]
    pub fn file_list(&self) -> Vec<Arc<File>> {
        self.state.lock().cache.files()
    }

    #[must_use]
    pub fn monitor_count(&self) -> usize {
        self.state.lock().table.monitor_count()
    }

    // ------------------------------------------------------------------
    // One-shot requests
    // ------------------------------------------------------------------

    /// Invoke `callback` once `attrs` are settled for every known entity,
    /// and, with `wait_for_file_list`, once the listing is complete. A failed
    /// listing is reported to waiting callbacks as `Err`.
    ///
    /// Settled means loaded or known to fail: an attribute the backend could
    /// not produce does not hold the callback back, and its value stays
    /// unset. [`File::failed_attributes`] tells the two apart.
    ///
    /// The callback never runs before this returns.
    pub fn call_when_ready<F>(
        self: &Arc<Self>,
        attrs: FileAttributes,
        wait_for_file_list: bool,
        callback: F,
    ) -> CallbackId
    where
        F: FnOnce(CoreResult<Vec<Arc<File>>>) + Send + 'static,
    {
        let id = {
            let mut state = self.state.lock();

            // A fresh request retries a failed listing
            if wait_for_file_list && matches!(state.list_state, ListState::Failed(_)) {
                state.list_state = ListState::NotLoaded;
            }

            state
                .table
                .add_callback(attrs, wait_for_file_list, Box::new(callback))
        };

        debug!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "call_when_ready",
            uri = %self.uri,
            attrs = ?attrs,
            wait_for_file_list = wait_for_file_list,
            "Callback registered"
        );

        self.state_changed();
        id
    }

    /// Async form of [`Directory::call_when_ready`].
    pub async fn ready(
        self: &Arc<Self>,
        attrs: FileAttributes,
        wait_for_file_list: bool,
    ) -> CoreResult<Vec<Arc<File>>> {
        let (tx, rx) = oneshot::channel();

        self.call_when_ready(attrs, wait_for_file_list, move |result| {
            let _ = tx.send(result);
        });

        rx.await.map_err(|_| CoreError::Cancelled)?
    }

    /// Idempotent. Once this returns the callback will not run.
    pub fn cancel_callback(&self, id: CallbackId) {
        let _delivery = self.delivery.lock();
        let mut state = self.state.lock();

        if state.table.cancel_callback(id) {
            debug!(
                marker = "DIRECTORY_ENGINE",
                operation_type = "cancel_callback",
                uri = %self.uri,
                "Callback cancelled"
            );
            Self::cancel_listing_if_unwanted(&mut state);
        }
    }

    // ------------------------------------------------------------------
    // Monitors
    // ------------------------------------------------------------------

    /// Register (or replace) `client`'s monitor. The callback first receives
    /// [`DirectoryEvent::Ready`], then incremental events.
    pub fn monitor_add<F>(
        self: &Arc<Self>,
        client: ClientId,
        monitor_hidden_files: bool,
        attrs: FileAttributes,
        callback: F,
    ) where
        F: Fn(&DirectoryEvent) + Send + Sync + 'static,
    {
        let first = {
            let mut state = self.state.lock();

            if matches!(state.list_state, ListState::Failed(_)) {
                state.list_state = ListState::NotLoaded;
            }

            state
                .table
                .add_monitor(client, monitor_hidden_files, attrs, Arc::new(callback))
        };

        info!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "monitor_add",
            uri = %self.uri,
            client = ?client,
            attrs = ?attrs,
            "Monitor registered"
        );

        if first {
            self.start_watch();
        }

        self.state_changed();
    }

    /// Idempotent. Once this returns no event reaches `client`, including
    /// events already queued.
    pub fn monitor_remove(&self, client: ClientId) {
        let _delivery = self.delivery.lock();

        let watch = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            if !state.table.remove_monitor(client) {
                return;
            }

            if state.table.monitor_count() == 0 {
                // Unwatched contents go stale; the next interested client re-lists
                if matches!(state.list_state, ListState::Loaded) {
                    state.list_state = ListState::NotLoaded;
                }
                Self::cancel_listing_if_unwanted(state);
                state.watch_task.take()
            } else {
                None
            }
        };

        if let Some(task) = watch {
            task.abort();
            debug!("Stopped watching {}", self.uri);
        }

        info!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "monitor_remove",
            uri = %self.uri,
            client = ?client,
            "Monitor removed"
        );
    }

    // ------------------------------------------------------------------
    // Reloads
    // ------------------------------------------------------------------

    /// Forget every loaded attribute and list again. Surviving entities keep
    /// their identity and are reported as changed.
    pub fn force_reload(self: &Arc<Self>) {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            state.cache.invalidate_all(FileAttributes::ALL);

            if matches!(state.list_state, ListState::Loading) {
                state.reload_queued = true;
            } else {
                self.start_listing(state);
            }
        }

        info!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "force_reload",
            uri = %self.uri,
            "Reload requested"
        );

        self.state_changed();
    }

    /// Bind a query to a search directory and re-run it.
    pub fn set_search_query(self: &Arc<Self>, query: Query) -> CoreResult<()> {
        if !self.uri.is_search() {
            return Err(CoreError::invalid_state("not a search directory"));
        }

        self.backend.set_query(query)?;
        self.force_reload();

        Ok(())
    }

    fn request_listing(self: &Arc<Self>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if matches!(state.list_state, ListState::Loading) {
            state.reload_queued = true;
        } else {
            self.start_listing(state);
        }
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Re-evaluate what the registrations need and start the I/O for it.
    fn state_changed(self: &Arc<Self>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.table.wants_file_list() && matches!(state.list_state, ListState::NotLoaded) {
            self.start_listing(state);
        }

        // Stats wait for the listing to settle
        if !matches!(state.list_state, ListState::Loading) {
            let mut wanted = state.table.wanted();
            if state.table.monitor_count() > 0 {
                wanted |= FileAttributes::INFO;
            }

            let jobs = Self::claim_stats(state, wanted);
            if !jobs.is_empty() {
                self.spawn_stats(jobs);
            }
        }

        if state.table.has_callbacks()
            || state.table.has_unready_monitors()
            || !state.pending.is_empty()
        {
            self.schedule_flush(state);
        }
    }

    /// Collect the fetches needed for `wanted` that nobody issued yet and
    /// record them as in flight.
    fn claim_stats(
        state: &mut DirectoryState,
        wanted: FileAttributes,
    ) -> Vec<(Arc<File>, FileAttributes)> {
        if wanted.is_empty() {
            return Vec::new();
        }

        let in_flight = &mut state.stat_in_flight;
        let mut jobs = Vec::new();

        for file in state.cache.iter() {
            let busy = in_flight.get(file.key()).copied().unwrap_or_default();
            let need = file.missing(wanted).difference(busy);

            if need.is_empty() {
                continue;
            }

            *in_flight.entry(CompactString::new(file.key())).or_default() |= need;
            jobs.push((Arc::clone(file), need));
        }

        jobs
    }

    fn cancel_listing_if_unwanted(state: &mut DirectoryState) {
        if state.table.wants_file_list() || state.reload_queued {
            return;
        }

        if let Some(cancel) = &state.list_cancel {
            cancel.cancel();
        }
    }

    fn schedule_flush(self: &Arc<Self>, state: &mut DirectoryState) {
        if state.flush_scheduled {
            return;
        }
        state.flush_scheduled = true;

        let dir = Arc::clone(self);
        let delay = self.config.engine.notify_delay;

        self.runtime.spawn(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }

            dir.flush();
        });
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    fn start_listing(self: &Arc<Self>, state: &mut DirectoryState) {
        let cancel = CancellationToken::new();
        state.list_cancel = Some(cancel.clone());
        state.list_state = ListState::Loading;
        state.touched_while_listing.clear();

        debug!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "list_start",
            uri = %self.uri,
            backend = self.backend.name(),
            "Listing started"
        );

        let dir = Arc::clone(self);
        self.runtime.spawn(async move {
            let started = Instant::now();
            let result = dir.backend.list(cancel).await;
            dir.listing_done(result, started);
        });
    }

    fn listing_done(self: &Arc<Self>, result: CoreResult<Vec<FileRecord>>, started: Instant) {
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.list_cancel = None;
            let touched = mem::take(&mut state.touched_while_listing);

            match result {
                Ok(records) => {
                    // Live events seen during the listing are newer than it
                    let weak = Arc::downgrade(self);
                    let reconciled = state.cache.reconcile(records, &touched, |r| {
                        File::new(r.key, r.uri, weak.clone(), r.info, r.loaded)
                    });

                    for file in &reconciled.added {
                        state.pending.add(file);
                    }
                    if state.loaded_once {
                        for file in &reconciled.refreshed {
                            state.pending.change(file);
                        }
                    }
                    for file in &reconciled.removed {
                        state.pending.remove(file);
                    }

                    state.list_state = ListState::Loaded;
                    state.loaded_once = true;
                    state.pending.done_loading = true;

                    info!(
                        marker = "DIRECTORY_ENGINE",
                        operation_type = "list_done",
                        uri = %self.uri,
                        entries = state.cache.len(),
                        added = reconciled.added.len(),
                        removed = reconciled.removed.len(),
                        touched = touched.len(),
                        duration_us = started.elapsed().as_micros(),
                        "Listing completed"
                    );
                }

                Err(err) if err.is_cancelled() => {
                    debug!("Listing of {} cancelled", self.uri);
                    state.list_state = ListState::NotLoaded;
                }

                Err(err) => {
                    warn!(
                        marker = "DIRECTORY_ENGINE",
                        operation_type = "list_failed",
                        uri = %self.uri,
                        "Listing failed: {}",
                        err
                    );

                    state.list_state = ListState::Failed(err.clone());
                    state.pending.load_error = Some(err);
                }
            }

            if state.reload_queued {
                state.reload_queued = false;
                self.start_listing(state);
            }

            self.schedule_flush(state);
        }

        self.state_changed();
    }

    // ------------------------------------------------------------------
    // Attribute fetches
    // ------------------------------------------------------------------

    fn spawn_stats(self: &Arc<Self>, jobs: Vec<(Arc<File>, FileAttributes)>) {
        debug!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "stat_batch",
            uri = %self.uri,
            count = jobs.len(),
            "Fetching attributes"
        );

        let dir = Arc::clone(self);
        let concurrency = self.config.engine.stat_concurrency.max(1);

        self.runtime.spawn(async move {
            let backend = Arc::clone(&dir.backend);

            let mut results = stream::iter(jobs)
                .map(|(file, attrs)| {
                    let backend = Arc::clone(&backend);
                    async move {
                        let result = backend.stat(file.uri(), attrs).await;
                        (file, attrs, result)
                    }
                })
                .buffer_unordered(concurrency);

            while let Some((file, attrs, result)) = results.next().await {
                dir.stat_done(&file, attrs, result);
            }

            dir.state_changed();
        });
    }

    fn stat_done(
        self: &Arc<Self>,
        file: &Arc<File>,
        attrs: FileAttributes,
        result: CoreResult<StatOutcome>,
    ) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(busy) = state.stat_in_flight.get_mut(file.key()) {
            busy.remove(attrs);
            if busy.is_empty() {
                state.stat_in_flight.remove(file.key());
            }
        }

        if !state.cache.contains(file) {
            return;
        }

        match result {
            Ok(outcome) => {
                let changed = file.apply(&outcome.info, outcome.loaded);
                // Whatever did not load counts as failed until invalidated
                file.mark_failed(attrs);

                if changed || !outcome.failed.is_empty() {
                    state.pending.change(file);
                }
            }

            Err(CoreError::NotFound(_)) => {
                state.cache.remove(file.key());
                state.pending.remove(file);
            }

            Err(err) => {
                debug!("Fetching {:?} for {} failed: {}", attrs, file.uri(), err);
                file.mark_failed(attrs);
                state.pending.change(file);
            }
        }

        self.schedule_flush(state);
    }

    // ------------------------------------------------------------------
    // Watching
    // ------------------------------------------------------------------

    fn start_watch(self: &Arc<Self>) {
        let mut handle = match self.backend.watch() {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!("{} has no live updates", self.uri);
                return;
            }
            Err(err) => {
                warn!(
                    "Continuing without live updates on {}: {}",
                    self.uri,
                    err.trace()
                );
                return;
            }
        };

        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            while let Some(event) = handle.events.recv().await {
                let Some(dir) = weak.upgrade() else { break };
                dir.handle_backend_event(event);
            }
        });

        let mut state = self.state.lock();

        // Raced with the last monitor_remove
        if state.table.monitor_count() == 0 {
            task.abort();
            return;
        }

        if let Some(previous) = state.watch_task.replace(task) {
            previous.abort();
        }
    }

    fn handle_backend_event(self: &Arc<Self>, event: BackendEvent) {
        debug!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "backend_event",
            uri = %self.uri,
            event = ?event,
            "Backend event"
        );

        if let Some(key) = event.key() {
            let mut state = self.state.lock();
            if matches!(state.list_state, ListState::Loading) {
                state.touched_while_listing.insert(CompactString::new(key));
            }
        }

        match event {
            BackendEvent::Created(key) | BackendEvent::Changed(key) => self.refresh_child(key),

            BackendEvent::Found(record) => {
                {
                    let mut guard = self.state.lock();
                    let state = &mut *guard;

                    if let Some(file) = state.cache.get(&record.key).cloned() {
                        if file.apply(&record.info, record.loaded) {
                            state.pending.change(&file);
                        }
                    } else {
                        let file = File::new(
                            record.key,
                            record.uri,
                            Arc::downgrade(self),
                            record.info,
                            record.loaded,
                        );
                        state.cache.insert(Arc::clone(&file));
                        state.pending.add(&file);
                    }

                    self.schedule_flush(state);
                }
                self.state_changed();
            }

            BackendEvent::Deleted(key) => {
                {
                    let mut guard = self.state.lock();
                    let state = &mut *guard;

                    if let Some(file) = state.cache.remove(&key) {
                        state.pending.remove(&file);
                        self.schedule_flush(state);
                    }
                }
                self.state_changed();
            }

            BackendEvent::Rescan => self.request_listing(),
        }
    }

    /// Re-fetch a known child, or pick up a new one.
    fn refresh_child(self: &Arc<Self>, key: CompactString) {
        if let Some(file) = self.get_file(&key) {
            file.invalidate(FileAttributes::ALL);
            self.state_changed();
            return;
        }

        let uri = match self.uri.child(&key) {
            Ok(uri) => uri,
            Err(err) => {
                debug!("Ignoring event for {:?}: {}", key, err);
                return;
            }
        };

        let dir = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = dir.backend.stat(&uri, FileAttributes::INFO).await;

            match result {
                Ok(outcome) => {
                    let mut guard = dir.state.lock();
                    let state = &mut *guard;

                    if !state.cache.contains_key(&key) {
                        let file =
                            File::new(key, uri, Arc::downgrade(&dir), outcome.info, outcome.loaded);
                        state.cache.insert(Arc::clone(&file));
                        state.pending.add(&file);
                        dir.schedule_flush(state);
                    }
                }
                // Gone again before we got to it
                Err(CoreError::NotFound(_)) => {}
                Err(err) => debug!("Cannot stat new child {}: {}", uri, err),
            }

            dir.state_changed();
        });
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    fn flush(self: &Arc<Self>) {
        let _delivery = self.delivery.lock();

        let (callbacks, monitors) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.flush_scheduled = false;

            let callbacks = Self::ready_callbacks(state);

            let mut batch = mem::take(&mut state.pending);
            let in_flight = &state.stat_in_flight;
            // Re-queued by the fetch once it lands, with the new values
            batch.defer_changes(|f| in_flight.contains_key(f.key()));

            let monitors = Self::monitor_deliveries(state, &batch);

            (callbacks, monitors)
        };

        for (id, result) in callbacks {
            // Re-checked per callback: an earlier one may have cancelled it
            let Some(pending) = self.state.lock().table.take_callback(id) else {
                continue;
            };
            (pending.callback)(result);
        }

        for delivery in monitors {
            for event in &delivery.events {
                let live = self
                    .state
                    .lock()
                    .table
                    .is_live(delivery.client, delivery.registration);
                if !live {
                    break;
                }

                (delivery.callback)(event);
            }
        }
    }

    fn ready_callbacks(state: &DirectoryState) -> Vec<(CallbackId, CoreResult<Vec<Arc<File>>>)> {
        let cache = &state.cache;
        let list_state = &state.list_state;
        let mut snapshot: Option<Vec<Arc<File>>> = None;

        state.table.matching(|cb| {
            if cb.wait_for_file_list {
                match list_state {
                    ListState::Failed(err) => return Some(Err(err.clone())),
                    ListState::Loaded => {}
                    ListState::NotLoaded | ListState::Loading => return None,
                }
            }

            if !cache.all_ready_for(cb.attrs) {
                return None;
            }

            Some(Ok(snapshot.get_or_insert_with(|| cache.files()).clone()))
        })
    }

    fn monitor_deliveries(state: &mut DirectoryState, batch: &PendingBatch) -> Vec<MonitorDelivery> {
        let loaded = matches!(state.list_state, ListState::Loaded);
        let cache = &state.cache;
        let mut out = Vec::new();

        for (client, monitor) in state.table.monitors_mut() {
            let events = if monitor.ready_sent {
                batch.events_for(monitor.monitor_hidden_files)
            } else if loaded && cache.all_ready_for(monitor.attrs) {
                monitor.ready_sent = true;
                vec![DirectoryEvent::Ready(visible(
                    cache.iter(),
                    monitor.monitor_hidden_files,
                ))]
            } else if let Some(err) = &batch.load_error {
                vec![DirectoryEvent::LoadError(err.clone())]
            } else {
                continue;
            };

            if events.is_empty() {
                continue;
            }

            out.push(MonitorDelivery {
                client: *client,
                registration: monitor.registration,
                callback: Arc::clone(&monitor.callback),
                events,
            });
        }

        out
    }
}

impl Drop for Directory {
    fn drop(&mut self) {
        let state = self.state.get_mut();

        if let Some(task) = state.watch_task.take() {
            task.abort();
        }
        if let Some(cancel) = state.list_cancel.take() {
            cancel.cancel();
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.forget(&self.uri);
        }

        debug!(
            marker = "DIRECTORY_ENGINE",
            operation_type = "directory_dropped",
            uri = %self.uri,
            "Directory released"
        );
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("uri", &self.uri)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}
