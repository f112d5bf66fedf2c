//! `src/backend/search.rs`
//!
//! Backend for `x-baul-search` directories. The entities are the hits of a
//! [`SearchEngine`] run; their keys are the hit URIs and their attributes
//! come from the filesystem object each hit points to.

use std::sync::Arc;

use async_trait::async_trait;
use compact_str::CompactString;
use futures::{StreamExt, stream};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    traits::{Backend, BackendEvent, FileRecord, StatOutcome, WatchHandle},
    vfs::stat_path,
};
use crate::{
    config::Config,
    error::{CoreError, CoreResult},
    model::{attributes::FileAttributes, uri::Uri},
    search::{
        engine::{SearchEngine, SearchEvent},
        query::Query,
    },
};

pub struct SearchBackend {
    uri: Uri,
    config: Config,
    query: Mutex<Option<Query>>,
    /// Live side of the watch: hits are forwarded here as they are found.
    events: Mutex<Option<mpsc::UnboundedSender<BackendEvent>>>,
}

impl SearchBackend {
    #[must_use]
    pub fn new(uri: Uri, config: Config) -> Self {
        Self {
            uri,
            config,
            query: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn query(&self) -> Option<Query> {
        self.query.lock().clone()
    }

    fn forward(&self, event: BackendEvent) {
        let mut events = self.events.lock();

        // Watch dropped
        if events.as_ref().is_some_and(|tx| tx.send(event).is_err()) {
            *events = None;
        }
    }

    /// Stat a batch of hits for INFO. Hits that vanished in the meantime
    /// are left out.
    async fn records_for(&self, hits: Vec<Uri>) -> Vec<FileRecord> {
        let retry = &self.config.retry;

        stream::iter(hits)
            .map(|uri| async move {
                let path = uri.to_file_path()?;
                let outcome = stat_path(&path, FileAttributes::INFO, retry).await.ok()?;

                Some(FileRecord {
                    key: CompactString::new(uri.as_str()),
                    uri,
                    info: outcome.info,
                    loaded: outcome.loaded,
                })
            })
            .buffered(self.config.engine.stat_concurrency.max(1))
            .filter_map(|record| async move { record })
            .collect()
            .await
    }

    /// Run the engine to completion. Every batch of hits is forwarded to the
    /// watch as it arrives; the returned records are the final result set.
    async fn run_search(
        &self,
        query: Query,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<FileRecord>> {
        let engine = SearchEngine::new(self.config.search.clone());
        let (tx, mut rx) = mpsc::unbounded_channel::<SearchEvent>();

        let listener = engine.subscribe(Arc::new(move |event: &SearchEvent| {
            let _ = tx.send(event.clone());
        }));
        engine.set_query(query)?;
        engine.start()?;

        let mut records: IndexMap<CompactString, FileRecord> = IndexMap::new();
        let mut failure: Option<CoreError> = None;

        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => {
                    engine.unsubscribe(listener);
                    engine.stop();
                    return Err(CoreError::Cancelled);
                }
                event = rx.recv() => event,
            };

            match event {
                Some(SearchEvent::HitsAdded(hits)) => {
                    for record in self.records_for(hits).await {
                        self.forward(BackendEvent::Found(record.clone()));
                        records.insert(record.key.clone(), record);
                    }
                }
                Some(SearchEvent::HitsSubtracted(hits)) => {
                    for uri in hits {
                        let key = CompactString::new(uri.as_str());
                        records.shift_remove(&key);
                        self.forward(BackendEvent::Deleted(key));
                    }
                }
                Some(SearchEvent::Error(e)) => failure = Some(e),
                Some(SearchEvent::Finished) | None => break,
            }
        }

        engine.unsubscribe(listener);

        match failure {
            Some(e) => Err(e),
            None => Ok(records.into_values().collect()),
        }
    }
}

#[async_trait]
impl Backend for SearchBackend {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn list(&self, cancel: CancellationToken) -> CoreResult<Vec<FileRecord>> {
        let Some(query) = self.query() else {
            debug!("Search directory {} listed without a query", self.uri);
            return Ok(Vec::new());
        };

        let records = self.run_search(query, &cancel).await?;

        info!(
            marker = "SEARCH_BACKEND",
            operation_type = "list",
            location = %self.uri,
            hits = records.len(),
            "Search directory listed"
        );

        Ok(records)
    }

    async fn stat(&self, uri: &Uri, attrs: FileAttributes) -> CoreResult<StatOutcome> {
        let path = uri
            .to_file_path()
            .ok_or_else(|| CoreError::UnsupportedScheme(uri.scheme().into()))?;

        stat_path(&path, attrs, &self.config.retry).await
    }

    /// Hits of a running search, as they are found. The set is refreshed
    /// as a whole by re-running the query.
    fn watch(&self) -> CoreResult<Option<WatchHandle>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(tx);

        Ok(Some(WatchHandle::new(rx, ())))
    }

    fn set_query(&self, query: Query) -> CoreResult<()> {
        if query.location.is_search() {
            return Err(CoreError::invalid_uri(
                query.location.as_str(),
                "search location must be a real directory",
            ));
        }

        *self.query.lock() = Some(query);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn lists_hits_with_info() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("sub/report-2024.txt"), b"r").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"n").unwrap();

        let backend = SearchBackend::new(Uri::search(1), Config::default());
        backend
            .set_query(Query::new("report", Uri::from_path(temp_dir.path()).unwrap()))
            .unwrap();

        let records = backend.list(CancellationToken::new()).await.unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].key.ends_with("report-2024.txt"));
        assert!(records[0].loaded.contains(FileAttributes::INFO));
        assert_eq!(records[0].info.size, Some(1));
    }

    #[tokio::test]
    async fn no_query_lists_nothing() {
        let backend = SearchBackend::new(Uri::search(2), Config::default());

        assert!(backend.list(CancellationToken::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hits_are_forwarded_to_the_watch_while_listing() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a-report.txt", "b-report.txt", "c-report.txt", "other.txt"] {
            std::fs::write(temp_dir.path().join(name), b"x").unwrap();
        }

        let mut config = Config::default();
        config.search.batch_size = 1;
        let backend = SearchBackend::new(Uri::search(3), config);
        backend
            .set_query(Query::new("report", Uri::from_path(temp_dir.path()).unwrap()))
            .unwrap();
        let mut watch = backend.watch().unwrap().unwrap();

        let records = backend.list(CancellationToken::new()).await.unwrap();
        assert_eq!(records.len(), 3);

        let mut forwarded = Vec::new();
        while let Ok(event) = watch.events.try_recv() {
            match event {
                BackendEvent::Found(record) => forwarded.push(record),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(forwarded, records);
    }
}
