//! `src/search/engine.rs`
//! ============================================================================
//! # `SearchEngine`: query driven hit producer
//!
//! State machine: `Idle → Running → Finished`, and `Running → Idle` on
//! [`SearchEngine::stop`]. Results are delivered only as deltas
//! (`HitsAdded` / `HitsSubtracted`) so subscribers converge incrementally.
//! A rerun keeps the previous result set and subtracts what no longer
//! matches once the walk completes.
//!
//! Delivery runs under a re-entrant lock that `stop` also takes, so once
//! `stop` returns no listener is invoked for that run, even if the walker
//! already queued more hits. Calling `stop` from inside a listener is fine.

use std::{
    mem,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use ahash::AHashSet;
use indexmap::IndexSet;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::query::Query;
use crate::{
    config::SearchConfig,
    error::{CoreError, CoreResult},
    model::uri::Uri,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone)]
pub enum SearchEvent {
    HitsAdded(Vec<Uri>),
    HitsSubtracted(Vec<Uri>),
    /// The run could not complete; always followed by `Finished`.
    Error(CoreError),
    Finished,
}

pub type SearchListener = Arc<dyn Fn(&SearchEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

struct EngineState {
    status: SearchState,
    query: Option<Query>,
    /// Bumped by every start/stop; stale runs compare and bail.
    generation: u64,
    cancel: Option<CancellationToken>,
    /// Result set as seen by subscribers.
    hits: IndexSet<Uri>,
    /// Hits confirmed by the current run.
    seen_this_run: AHashSet<Uri>,
    listeners: Vec<(ListenerId, SearchListener)>,
}

struct Shared {
    state: Mutex<EngineState>,
    delivery: ReentrantMutex<()>,
    config: SearchConfig,
}

pub struct SearchEngine {
    shared: Arc<Shared>,
}

impl SearchEngine {
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState {
                    status: SearchState::Idle,
                    query: None,
                    generation: 0,
                    cancel: None,
                    hits: IndexSet::new(),
                    seen_this_run: AHashSet::new(),
                    listeners: Vec::new(),
                }),
                delivery: ReentrantMutex::new(()),
                config,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> SearchState {
        self.shared.state.lock().status
    }

    #[must_use]
    pub fn query(&self) -> Option<Query> {
        self.shared.state.lock().query.clone()
    }

    /// Current result set, in delivery order.
    #[must_use]
    pub fn hits(&self) -> Vec<Uri> {
        self.shared.state.lock().hits.iter().cloned().collect()
    }

    pub fn subscribe(&self, listener: SearchListener) -> ListenerId {
        let id = ListenerId(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed));
        self.shared.state.lock().listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        let _delivery = self.shared.delivery.lock();
        self.shared.state.lock().listeners.retain(|(l, _)| *l != id);
    }

    /// Replace the query. Rejected while a run is in progress.
    pub fn set_query(&self, query: Query) -> CoreResult<()> {
        let mut state = self.shared.state.lock();

        if state.status == SearchState::Running {
            return Err(CoreError::invalid_state("cannot change the query of a running search"));
        }

        state.query = Some(query);
        Ok(())
    }

    /// Begin a run. Must be called within a Tokio runtime.
    pub fn start(&self) -> CoreResult<()> {
        let (generation, query, cancel) = {
            let mut state = self.shared.state.lock();

            if state.status == SearchState::Running {
                return Err(CoreError::invalid_state("search already running"));
            }

            let query = state
                .query
                .clone()
                .ok_or_else(|| CoreError::invalid_state("no query set"))?;

            state.generation += 1;
            state.status = SearchState::Running;
            state.seen_this_run.clear();

            let cancel = CancellationToken::new();
            state.cancel = Some(cancel.clone());

            (state.generation, query, cancel)
        };

        info!(
            marker = "SEARCH_ENGINE",
            operation_type = "search_start",
            text = %query.text,
            location = %query.location,
            generation = generation,
            "Search started"
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.run(generation, query, cancel).await });

        Ok(())
    }

    /// Abort the current run. No listener is invoked for it once this returns.
    pub fn stop(&self) {
        self.shared.stop();
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl Shared {
    fn stop(&self) {
        let _delivery = self.delivery.lock();
        let mut state = self.state.lock();

        if state.status != SearchState::Running {
            return;
        }

        state.generation += 1;
        state.status = SearchState::Idle;

        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }

        debug!(
            marker = "SEARCH_ENGINE",
            operation_type = "search_stop",
            "Search stopped"
        );
    }

    async fn run(self: Arc<Self>, generation: u64, query: Query, cancel: CancellationToken) {
        let start = Instant::now();
        let (tx, mut rx) = mpsc::channel::<Vec<Uri>>(4);
        let batch_size = self.config.batch_size.max(1);
        let max_depth = self.config.max_depth;

        let walk_cancel = cancel.clone();
        let walker = tokio::task::spawn_blocking(move || {
            walk(&query, max_depth, batch_size, &tx, &walk_cancel)
        });

        while let Some(batch) = rx.recv().await {
            if !self.deliver_hits(generation, batch) {
                cancel.cancel();
            }
        }

        let outcome = match walker.await {
            Ok(result) => result,
            Err(e) => Err(CoreError::Other(compact_str::format_compact!(
                "search walker panicked: {e}"
            ))),
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                warn!("Search run failed: {}", e);
                self.deliver(generation, &SearchEvent::Error(e));
            }
        }

        self.finish(generation);

        info!(
            marker = "SEARCH_ENGINE",
            operation_type = "search_finished",
            generation = generation,
            duration_us = start.elapsed().as_micros(),
            "Search finished"
        );
    }

    /// Invoke listeners while `generation` is current and running.
    fn deliver(&self, generation: u64, event: &SearchEvent) -> bool {
        let _delivery = self.delivery.lock();

        let listeners = {
            let state = self.state.lock();
            if state.generation != generation || state.status != SearchState::Running {
                return false;
            }
            state.listeners.clone()
        };

        for (id, listener) in listeners {
            if !self.still_subscribed(generation, id, SearchState::Running) {
                return false;
            }
            listener(event);
        }

        true
    }

    fn still_subscribed(&self, generation: u64, id: ListenerId, status: SearchState) -> bool {
        let state = self.state.lock();

        state.generation == generation
            && state.status == status
            && state.listeners.iter().any(|(l, _)| *l == id)
    }

    fn deliver_hits(&self, generation: u64, batch: Vec<Uri>) -> bool {
        let _delivery = self.delivery.lock();

        let fresh: Vec<Uri> = {
            let mut state = self.state.lock();
            if state.generation != generation || state.status != SearchState::Running {
                return false;
            }

            let mut fresh = Vec::with_capacity(batch.len());
            for uri in batch {
                state.seen_this_run.insert(uri.clone());
                if state.hits.insert(uri.clone()) {
                    fresh.push(uri);
                }
            }
            fresh
        };

        if fresh.is_empty() {
            return true;
        }

        self.deliver(generation, &SearchEvent::HitsAdded(fresh))
    }

    fn finish(&self, generation: u64) {
        let _delivery = self.delivery.lock();

        let subtracted: Vec<Uri> = {
            let mut state = self.state.lock();
            if state.generation != generation || state.status != SearchState::Running {
                return;
            }

            let seen = mem::take(&mut state.seen_this_run);
            let (kept, gone): (IndexSet<Uri>, IndexSet<Uri>) =
                mem::take(&mut state.hits).into_iter().partition(|u| seen.contains(u));
            state.hits = kept;

            gone.into_iter().collect()
        };

        if !subtracted.is_empty() && !self.deliver(generation, &SearchEvent::HitsSubtracted(subtracted)) {
            return;
        }

        let listeners = {
            let mut state = self.state.lock();
            if state.generation != generation || state.status != SearchState::Running {
                return;
            }
            state.status = SearchState::Finished;
            state.cancel = None;
            state.listeners.clone()
        };

        for (id, listener) in listeners {
            if !self.still_subscribed(generation, id, SearchState::Finished) {
                return;
            }
            listener(&SearchEvent::Finished);
        }
    }
}

fn is_hidden_entry(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();

    name.starts_with('.') || name.ends_with('~')
}

/// Blocking walk below the query location, sending hits in batches.
fn walk(
    query: &Query,
    max_depth: Option<usize>,
    batch_size: usize,
    tx: &mpsc::Sender<Vec<Uri>>,
    cancel: &CancellationToken,
) -> CoreResult<()> {
    let root = query
        .location
        .to_file_path()
        .ok_or_else(|| CoreError::UnsupportedScheme(query.location.scheme().into()))?;

    let meta = std::fs::metadata(&root).map_err(|e| CoreError::from_io(&root.to_string_lossy(), e))?;
    if !meta.is_dir() {
        return Err(CoreError::NotADirectory(root.to_string_lossy().as_ref().into()));
    }

    if query.is_empty() {
        return Ok(());
    }

    let words = query.words();
    let show_hidden = query.show_hidden;

    let mut walker = WalkDir::new(&root).min_depth(1).follow_links(false);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut batch: Vec<Uri> = Vec::with_capacity(batch_size);

    let entries = walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || show_hidden || !is_hidden_entry(e));

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let Ok(entry) = entry else { continue };
        let path: &Path = entry.path();

        if !Query::name_matches(&words, &entry.file_name().to_string_lossy()) {
            continue;
        }

        if !query.mime_matches(path) {
            continue;
        }

        if let Ok(uri) = Uri::from_path(path) {
            batch.push(uri);
        }

        if batch.len() >= batch_size && tx.blocking_send(mem::take(&mut batch)).is_err() {
            return Err(CoreError::Cancelled);
        }
    }

    if !batch.is_empty() && tx.blocking_send(batch).is_err() {
        return Err(CoreError::Cancelled);
    }

    Ok(())
}
