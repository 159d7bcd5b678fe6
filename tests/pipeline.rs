mod common;

use common::*;
use semindex::{
    EmbeddingState, IndexError, IndexOptions, MemoryStorage, NewRelationship, NewSymbol, SqliteStorage,
};
use semindex::core::content_hash;
use semindex::engine::chunker::chunk_text;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_unchanged_file_is_not_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    let file = root.join("lib.rs");
    fs::write(&file, "pub fn add(a: i32, b: i32) -> i32 { a + b }\n").unwrap();

    assert!(engine.index_file(&file, None).await.unwrap());
    let first = engine.get_file_info(&file).await.unwrap().unwrap();

    assert!(!engine.index_file(&file, None).await.unwrap());
    let second = engine.get_file_info(&file).await.unwrap().unwrap();

    assert_eq!(first.file_id, second.file_id);
    assert_eq!(first.indexed_at, second.indexed_at);
    assert_eq!(engine.get_index_stats().await.unwrap().files, 1);
}

#[tokio::test]
async fn test_changed_file_replaces_all_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    let file = root.join("notes.md");

    fs::write(&file, numbered_lines("old", 200)).unwrap();
    engine.index_file(&file, None).await.unwrap();
    let before = engine.get_file_chunks(&file).await.unwrap();
    assert!(before.len() > 1);

    fs::write(&file, "# fresh\nshort now\n").unwrap();
    assert!(engine.index_file(&file, None).await.unwrap());
    let after = engine.get_file_chunks(&file).await.unwrap();

    assert_eq!(after.len(), 1);
    assert!(after.iter().all(|c| !c.content.contains("old")));
    let indices: Vec<usize> = after.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indices, vec![0]);
    let stored = engine.get_file_info(&file).await.unwrap().unwrap();
    assert_eq!(stored.content_hash, semindex::core::content_hash(b"# fresh\nshort now\n"));
}

#[tokio::test]
async fn test_small_repository_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    let a = root.join("a.js");
    let b = root.join("b.md");
    fs::write(&a, numbered_lines("foo", 50)).unwrap();
    fs::write(&b, (1..=10).map(|i| format!("line {}\n", i)).collect::<String>()).unwrap();

    let report = engine.index_repository(&root, IndexOptions::default()).await.unwrap();
    assert_eq!(report.total_files, 2);
    assert_eq!(report.indexed_files, 2);
    assert_eq!(report.failed_files, 0);
    assert!(!report.cancelled);
    assert_eq!(engine.get_file_chunks(&a).await.unwrap().len(), 1);
    assert_eq!(engine.get_file_chunks(&b).await.unwrap().len(), 1);
    let b_before = engine.get_file_info(&b).await.unwrap().unwrap();

    fs::write(&a, numbered_lines("foo", 150)).unwrap();
    let report = engine.index_repository(&root, IndexOptions::default()).await.unwrap();
    assert_eq!(report.indexed_files, 1);
    assert_eq!(report.skipped_files, 1);
    assert!(engine.get_file_chunks(&a).await.unwrap().len() > 1);
    assert_eq!(engine.get_file_info(&b).await.unwrap().unwrap(), b_before);

    let top_k = 2;
    let results = engine.search_similar("foo", Some(top_k)).await.unwrap();
    assert!(!results.is_empty() && results.len() <= top_k);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    let allowed = [a.to_string_lossy().into_owned(), b.to_string_lossy().into_owned()];
    assert!(results.iter().all(|r| allowed.contains(&r.path)));
}

#[tokio::test]
async fn test_search_prefers_matching_words() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    fs::write(root.join("db.rs"), "open database connection pool").unwrap();
    fs::write(root.join("ui.rs"), "render button widget layout").unwrap();
    engine.index_repository(&root, IndexOptions::default()).await.unwrap();

    let results = engine.search_similar("database connection", None).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].path.ends_with("db.rs"));
    assert!(results[0].score > results[1].score);
    assert_eq!(results[0].start_line, 1);
    assert_eq!(results[0].embedding_state, EmbeddingState::Embedded);

    assert!(engine.search_similar("database", Some(0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_outage_tags_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = engine_with(
        Arc::new(MemoryStorage::new()),
        Arc::new(Unreachable),
        Box::new(ManualWatcher::default()),
        &root,
    );
    let file = root.join("main.rs");
    fs::write(&file, "fn main() {}\n").unwrap();

    assert!(engine.index_file(&file, None).await.unwrap());
    let chunks = engine.get_file_chunks(&file).await.unwrap();
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert_eq!(chunk.embedding_state, EmbeddingState::Fallback);
        assert_eq!(chunk.embedding.len(), DIM);
        assert!(chunk.embedding.iter().all(|x| *x == 0.0));
    }

    let results = engine.search_similar("main", None).await.unwrap();
    assert!(results.iter().all(|r| r.score == 0.0));
    assert!(results.iter().all(|r| r.embedding_state == EmbeddingState::Fallback));
}

#[tokio::test]
async fn test_bad_file_does_not_abort_scan() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    fs::write(root.join("good.rs"), "fn ok() {}").unwrap();
    fs::write(root.join("bad.rs"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
    fs::create_dir(root.join("node_modules")).unwrap();
    fs::write(root.join("node_modules/dep.js"), "module.exports = 1").unwrap();

    let report = engine.index_repository(&root, IndexOptions::default()).await.unwrap();
    assert_eq!(report.total_files, 2);
    assert_eq!(report.indexed_files, 1);
    assert_eq!(report.failed_files, 1);
    assert!(engine.get_file_info(&root.join("bad.rs")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);

    let err = engine.index_file(&root.join("ghost.rs"), None).await.unwrap_err();
    assert!(matches!(err, IndexError::FileRead { .. }));
}

#[tokio::test]
async fn test_supplied_content_wins_over_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    let file = root.join("draft.md");
    fs::write(&file, "on disk").unwrap();

    engine.index_file(&file, Some("unsaved buffer".to_string())).await.unwrap();
    let chunks = engine.get_file_chunks(&file).await.unwrap();
    assert_eq!(chunks[0].content, "unsaved buffer");
    assert_eq!(engine.get_file_info(&file).await.unwrap().unwrap().size, 14);
}

#[tokio::test]
async fn test_cancelled_scan_stops_between_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    for i in 0..5 {
        fs::write(root.join(format!("f{}.rs", i)), format!("fn f{}() {{}}", i)).unwrap();
    }

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = engine
        .index_repository(&root, IndexOptions { cancel: Some(cancel), ..Default::default() })
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.total_files, 5);
    assert_eq!(report.indexed_files, 0);
    assert_eq!(engine.get_index_stats().await.unwrap().files, 0);
}

#[tokio::test]
async fn test_prune_drops_vanished_and_ignored_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    fs::write(root.join("keep.rs"), "fn keep() {}").unwrap();
    fs::write(root.join("gone.rs"), "fn gone() {}").unwrap();
    fs::write(root.join("vendor.rs"), "fn vendored() {}").unwrap();
    engine.index_repository(&root, IndexOptions::default()).await.unwrap();

    fs::remove_file(root.join("gone.rs")).unwrap();
    let options = IndexOptions {
        ignore_patterns: Some(vec!["vendor".to_string()]),
        prune_missing: true,
        ..Default::default()
    };
    let report = engine.index_repository(&root, options).await.unwrap();

    assert_eq!(report.removed_files, 2);
    let files = engine.list_indexed_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("keep.rs"));
}

#[tokio::test]
async fn test_index_repository_rejects_non_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);
    let file = root.join("x.rs");
    fs::write(&file, "").unwrap();

    let err = engine.index_repository(&file, IndexOptions::default()).await.unwrap_err();
    assert!(matches!(err, IndexError::InvalidPath(_)));
}

#[tokio::test]
async fn test_sqlite_engine_maintenance() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let src = root.join("src");
    fs::create_dir(&src).unwrap();
    let storage = SqliteStorage::open(&root.join("db/index.db"), DIM).unwrap();
    let engine = engine_with(Arc::new(storage), Arc::new(BagOfWords), Box::new(ManualWatcher::default()), &root);

    let file = src.join("graph.rs");
    fs::write(&file, "struct Node;\nimpl Node { fn visit(&self) {} }\n").unwrap();
    fs::write(src.join("other.rs"), "fn other() {}").unwrap();
    let report = engine.index_repository(&src, IndexOptions::default()).await.unwrap();
    assert_eq!(report.indexed_files, 2);

    engine
        .put_symbols(
            &file,
            vec![
                NewSymbol { name: "Node".into(), kind: "struct".into(), start_line: 1, end_line: 1 },
                NewSymbol { name: "visit".into(), kind: "method".into(), start_line: 2, end_line: 2 },
            ],
            vec![NewRelationship { from: 1, to: 0, kind: "member_of".into() }],
        )
        .await
        .unwrap();

    let stats = engine.get_index_stats().await.unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.symbols, 2);
    assert_eq!(stats.relationships, 1);
    assert!(stats.total_size > 0);

    // Reindexing replaces the row, and its symbols go with it
    fs::write(&file, "struct Node;\n").unwrap();
    engine.index_file(&file, None).await.unwrap();
    let stats = engine.get_index_stats().await.unwrap();
    assert_eq!(stats.symbols, 0);
    assert_eq!(stats.relationships, 0);

    let results = engine.search_similar("node", Some(5)).await.unwrap();
    assert!(results[0].path.ends_with("graph.rs"));

    engine.clear_index().await.unwrap();
    engine.vacuum_index().await.unwrap();
    assert_eq!(engine.get_index_stats().await.unwrap().chunks, 0);

    engine.close().await.unwrap();
    assert!(matches!(engine.get_index_stats().await, Err(IndexError::Store(_))));
}

#[tokio::test]
async fn test_prune_keeps_file_restored_by_concurrent_writer() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let gate = Arc::new(Gated::new());
    let engine = Arc::new(engine_with(
        Arc::new(MemoryStorage::new()),
        gate.clone(),
        Box::new(ManualWatcher::default()),
        &root,
    ));
    let file = root.join("restored.rs");

    // Stored record, nothing on disk yet
    gate.release(1);
    engine.index_file(&file, Some("fn first() {}".to_string())).await.unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        let file = file.clone();
        tokio::spawn(async move { engine.index_file(&file, Some("fn second() {}".to_string())).await })
    };
    // The writer is inside the embedder, holding the path lock
    gate.entered.notified().await;

    let pruner = {
        let engine = Arc::clone(&engine);
        let root = root.clone();
        tokio::spawn(async move {
            engine
                .index_repository(&root, IndexOptions { prune_missing: true, ..Default::default() })
                .await
        })
    };
    // Let the pruner see the file missing and queue behind the writer
    tokio::time::sleep(Duration::from_millis(200)).await;

    fs::write(&file, "fn second() {}").unwrap();
    gate.release(16);

    assert!(writer.await.unwrap().unwrap());
    let report = pruner.await.unwrap().unwrap();

    assert_eq!(report.removed_files, 0);
    let record = engine.get_file_info(&file).await.unwrap().expect("record purged");
    assert_eq!(record.content_hash, content_hash(b"fn second() {}"));
}

#[tokio::test]
async fn test_path_locks_do_not_accumulate() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let engine = memory_engine(&root);

    for i in 0..50 {
        let file = root.join(format!("tmp{}.rs", i));
        fs::write(&file, format!("fn tmp{}() {{}}", i)).unwrap();
        engine.index_file(&file, None).await.unwrap();
        fs::remove_file(&file).unwrap();
        assert!(engine.remove_file(&file).await.unwrap());
    }

    assert_eq!(engine.get_index_stats().await.unwrap().files, 0);
    assert!(engine.state().path_locks.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_leave_one_consistent_version() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(&dir);
    let storage = SqliteStorage::open(&root.join(".db/index.db"), DIM).unwrap();
    let engine = Arc::new(engine_with(
        Arc::new(storage),
        Arc::new(Sluggish(Duration::from_millis(2))),
        Box::new(ManualWatcher::default()),
        &root,
    ));

    let draft = |tag: &str, lines: usize| -> String {
        (1..=lines).map(|i| format!("{} line {} of the {} draft\n", tag, i, tag)).collect()
    };
    let alpha = draft("alpha", 120);
    let beta = draft("beta", 240);
    let gamma = draft("gamma", 360);
    let file = root.join("shared.md");
    fs::write(&file, &gamma).unwrap();

    let mut writers = Vec::new();
    for content in [alpha.clone(), beta.clone()] {
        let engine = Arc::clone(&engine);
        let file = file.clone();
        writers.push(tokio::spawn(async move { engine.index_file(&file, Some(content)).await.map(|_| ()) }));
    }
    {
        let engine = Arc::clone(&engine);
        let root = root.clone();
        writers.push(tokio::spawn(async move {
            engine.index_repository(&root, IndexOptions::default()).await.map(|_| ())
        }));
    }
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let chunks = engine.get_file_chunks(&file).await.unwrap();
    let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());

    let stored: String = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n");
    assert!(
        [&alpha, &beta, &gamma].iter().any(|v| **v == stored),
        "chunks mix several versions"
    );
    assert_eq!(chunks.len(), chunk_text(&stored, engine.config().max_chunk_chars).len());

    let record = engine.get_file_info(&file).await.unwrap().unwrap();
    assert_eq!(record.content_hash, content_hash(stored.as_bytes()));
    assert_eq!(engine.list_indexed_files().await.unwrap().len(), 1);
    assert!(engine.state().path_locks.is_empty());
}
