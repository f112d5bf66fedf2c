mod common;

use std::{sync::Arc, time::Duration};

use common::{next_seen, recorder, settle, wait_for};
use dirmon_core::{
    ClientId, Config, CoreError, DirectoryRegistry, FileAttributes, Uri,
    config::SearchConfig,
    search::{Query, SearchEngine, SearchEvent, SearchState},
};
use tempfile::TempDir;
use tokio::sync::mpsc;

fn home_with_talks() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    std::fs::create_dir_all(root.join("docs/2003")).unwrap();
    std::fs::create_dir_all(root.join("music")).unwrap();
    std::fs::write(root.join("docs/richard_hult_resume.odt"), b"r").unwrap();
    std::fs::write(root.join("docs/2003/GUADEC Richard Hult.pdf"), b"g").unwrap();
    std::fs::write(root.join("music/hult.ogg"), b"m").unwrap();
    std::fs::write(root.join("notes.txt"), b"n").unwrap();

    temp_dir
}

#[tokio::test]
async fn richard_hult_search_adds_hits_then_finishes_exactly_once() {
    let temp_dir = home_with_talks();
    let engine = SearchEngine::new(SearchConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.subscribe(Arc::new(move |event: &SearchEvent| {
        let _ = tx.send(event.clone());
    }));

    engine
        .set_query(Query::new("richard hult", Uri::from_path(temp_dir.path()).unwrap()))
        .unwrap();
    engine.start().unwrap();

    let mut added = 0;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();

        match event {
            SearchEvent::HitsAdded(hits) => {
                assert!(!hits.is_empty());
                added += hits.len();
            }
            SearchEvent::Finished => break,
            other => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!(added, 2);
    assert_eq!(engine.state(), SearchState::Finished);

    settle().await;
    assert!(rx.try_recv().is_err(), "more than one Finished");
}

#[tokio::test]
async fn start_then_stop_yields_no_events() {
    let temp_dir = home_with_talks();
    let engine = SearchEngine::new(SearchConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel::<SearchEvent>();
    engine.subscribe(Arc::new(move |event: &SearchEvent| {
        let _ = tx.send(event.clone());
    }));

    engine
        .set_query(Query::new("hult", Uri::from_path(temp_dir.path()).unwrap()))
        .unwrap();
    engine.start().unwrap();
    engine.stop();

    settle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn start_without_query_is_rejected() {
    let engine = SearchEngine::new(SearchConfig::default());

    assert!(matches!(engine.start(), Err(CoreError::InvalidState { .. })));
    assert_eq!(engine.state(), SearchState::Idle);
}

#[tokio::test]
async fn search_directory_lists_hits_as_entities() {
    let temp_dir = home_with_talks();
    let registry = DirectoryRegistry::new();
    let dir = registry.get_by_uri(&Uri::search(42)).unwrap();

    let (callback, mut rx) = recorder(FileAttributes::INFO);
    let client = ClientId::new();
    dir.monitor_add(client, false, FileAttributes::INFO, callback);

    dir.set_search_query(Query::new("hult", Uri::from_path(temp_dir.path()).unwrap()))
        .unwrap();

    let ready = wait_for(&mut rx, "ready").await;
    let mut names: Vec<String> = ready.event.files().iter().map(|f| f.name()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["GUADEC Richard Hult.pdf", "hult.ogg", "richard_hult_resume.odt"]
    );
    assert!(ready.complete);

    // Narrowing the query re-lists; vanished hits are reported as removed
    dir.set_search_query(Query::new("richard hult", Uri::from_path(temp_dir.path()).unwrap()))
        .unwrap();
    let removed = wait_for(&mut rx, "files_removed").await;
    assert_eq!(removed.event.files().len(), 1);
    assert_eq!(removed.event.files()[0].name(), "hult.ogg");

    dir.monitor_remove(client);
    settle().await;
    while let Ok(seen) = rx.try_recv() {
        assert_ne!(seen.event.kind(), "ready");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_hits_stream_into_the_directory_before_done_loading() {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..12 {
        std::fs::write(temp_dir.path().join(format!("hult-{i:02}.txt")), b"h").unwrap();
    }
    std::fs::write(temp_dir.path().join("unrelated.txt"), b"u").unwrap();

    let mut config = Config::default();
    config.search.batch_size = 1;
    let registry = DirectoryRegistry::with_config(config);
    let dir = registry.get_by_uri(&Uri::search(43)).unwrap();

    let (callback, mut rx) = recorder(FileAttributes::INFO);
    dir.monitor_add(ClientId::new(), false, FileAttributes::INFO, callback);
    assert!(wait_for(&mut rx, "ready").await.event.files().is_empty());

    dir.set_search_query(Query::new("hult", Uri::from_path(temp_dir.path()).unwrap()))
        .unwrap();

    let mut added: Vec<String> = Vec::new();
    loop {
        let seen = next_seen(&mut rx).await;
        match seen.event.kind() {
            "files_added" => {
                assert!(seen.complete);
                added.extend(seen.event.files().iter().map(|f| f.name()));
            }
            "done_loading" => break,
            _ => {}
        }
    }

    added.sort();
    let expected: Vec<String> = (0..12).map(|i| format!("hult-{i:02}.txt")).collect();
    assert_eq!(added, expected);
    assert_eq!(dir.file_list().len(), 12);
}

#[tokio::test]
async fn file_directory_rejects_a_search_query() {
    let temp_dir = TempDir::new().unwrap();
    let registry = DirectoryRegistry::new();
    let dir = registry
        .get_by_uri(&Uri::from_path(temp_dir.path()).unwrap())
        .unwrap();

    let result = dir.set_search_query(Query::new("x", Uri::from_path(temp_dir.path()).unwrap()));
    assert!(matches!(result, Err(CoreError::InvalidState { .. })));

    let (callback, mut rx) = recorder(FileAttributes::INFO);
    dir.monitor_add(ClientId::new(), false, FileAttributes::INFO, callback);
    let ready = next_seen(&mut rx).await;
    assert!(ready.event.files().is_empty());
}
