//! Diff-sync and single-file scenarios.

use std::sync::Arc;

use super::support::{Harness, DIMENSIONS};
use crate::chunk::{chunk_document, ChunkConfig, ChunkStrategy};
use crate::embeddings::providers::MockProvider;
use crate::notice::Notice;
use crate::progress::SyncPhase;
use crate::vector_index::VectorIndex;

fn ids_for(manager: &super::support::Manager, path: &str) -> Vec<String> {
    manager
        .store()
        .get_all_for_path(path)
        .into_iter()
        .map(|(id, _)| id)
        .collect()
}

#[tokio::test]
async fn test_edit_then_delete_document() {
    let h = Harness::new();
    h.vault.insert("a.md", "# A\ntext1\n\n# B\ntext2");
    let mut manager = h.open().await;

    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!((summary.added, summary.updated, summary.deleted), (2, 0, 0));
    assert_eq!(ids_for(&manager, "a.md"), vec!["a.md#0", "a.md#1"]);
    assert_eq!(manager.index().get("a.md#0").unwrap().content, "# A\ntext1");
    assert_eq!(manager.index().get("a.md#1").unwrap().content, "# B\ntext2");

    h.vault.insert("a.md", "# A\ntext1x\n\n# B\ntext2");
    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!((summary.added, summary.updated, summary.deleted), (0, 1, 0));
    assert_eq!(manager.index().get("a.md#0").unwrap().content, "# A\ntext1x");

    h.vault.remove("a.md");
    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!((summary.added, summary.updated, summary.deleted), (0, 0, 2));
    assert!(manager.store().is_empty());
    assert_eq!(manager.index().count(), 0);
}

#[tokio::test]
async fn test_unchanged_vault_is_a_no_op() {
    let h = Harness::new();
    h.seed_notes(4);
    let mut manager = h.open().await;
    manager.diff_and_sync().await.unwrap();

    h.provider.reset_counters();
    let summary = manager.diff_and_sync().await.unwrap();

    assert_eq!((summary.added, summary.updated, summary.deleted), (0, 0, 0));
    assert!(summary.errors.is_empty());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_only_changed_chunks_are_reembedded() {
    let h = Harness::new();
    h.vault
        .insert("doc.md", "# One\nfirst part\n\n# Two\nsecond part\n\n# Three\nthird part");
    let mut manager = h.open().await;
    manager.diff_and_sync().await.unwrap();
    let before_first = manager.store().get("doc.md#0").unwrap().content_hash.clone();

    h.provider.reset_counters();
    h.vault
        .insert("doc.md", "# One\nfirst part\n\n# Two\nsecond part, revised\n\n# Three\nthird part");
    let summary = manager.diff_and_sync().await.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(h.provider.embedded_texts(), vec!["# Two\nsecond part, revised"]);
    assert_eq!(manager.store().get("doc.md#0").unwrap().content_hash, before_first);
}

#[tokio::test]
async fn test_store_matches_current_chunking() {
    let h = Harness::new();
    let text = "Intro line\n\n# Alpha\nalpha body\n\n## Beta\nbeta body\n\n# Gamma\ngamma body";
    h.vault.insert("notes/x.md", text);
    h.seed_notes(2);
    let mut manager = h.open().await;
    manager.diff_and_sync().await.unwrap();

    let config = ChunkConfig {
        strategy: ChunkStrategy::Structured,
        ..ChunkConfig::default()
    };
    let mut expected: Vec<String> = chunk_document("notes/x.md", text, &config)
        .into_iter()
        .map(|c| c.id)
        .collect();
    expected.sort();
    let mut stored = ids_for(&manager, "notes/x.md");
    stored.sort();

    assert_eq!(stored, expected);
    assert!(stored.contains(&"notes/x.md#-1".to_string()));
    assert_eq!(manager.index().count(), manager.store().len());

    // Shrinking the document drops the trailing sections.
    h.vault.insert("notes/x.md", "Intro line\n\n# Alpha\nalpha body");
    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!(summary.deleted, 2);
    assert_eq!(ids_for(&manager, "notes/x.md"), vec!["notes/x.md#-1", "notes/x.md#0"]);
    assert!(manager.index().get("notes/x.md#2").is_none());
}

#[tokio::test]
async fn test_read_failure_keeps_existing_chunks() {
    let h = Harness::new();
    h.vault.insert("a.md", "# A\nalpha");
    h.vault.insert("b.md", "# B\nbeta");
    let mut manager = h.open().await;
    manager.diff_and_sync().await.unwrap();

    h.vault.fail_reads("a.md");
    h.vault.insert("b.md", "# B\nbeta changed");
    let summary = manager.diff_and_sync().await.unwrap();

    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].path, "a.md");
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 0);
    assert!(manager.store().get("a.md#0").is_some());
    assert!(manager.index().get("a.md#0").is_some());
}

#[tokio::test]
async fn test_provider_failure_leaves_store_untouched() {
    let h = Harness::new();
    h.seed_notes(3);
    let mut manager = h.open().await;

    h.provider.fail_after_calls(0);
    assert!(manager.diff_and_sync().await.is_err());
    assert!(manager.store().is_empty());
    assert_eq!(manager.index().count(), 0);

    h.provider.clear_failures();
    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!(summary.added, 3);
}

#[tokio::test]
async fn test_transient_failures_are_retried_during_sync() {
    let h = Harness::new();
    h.seed_notes(3);
    let mut manager = h.open().await;

    h.provider.fail_transiently(1);
    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!(summary.added, 3);
}

#[tokio::test]
async fn test_sync_reports_phases_in_order() {
    let h = Harness::new();
    h.seed_notes(3);
    let mut manager = h.open().await;
    h.clear_events();

    manager.diff_and_sync().await.unwrap();

    assert_eq!(
        h.phases(),
        vec![
            SyncPhase::Scanning,
            SyncPhase::Processing,
            SyncPhase::Indexing,
            SyncPhase::Finalizing
        ]
    );
    let last_indexing = h
        .events()
        .into_iter()
        .filter(|e| e.phase == SyncPhase::Indexing)
        .last()
        .unwrap();
    assert_eq!(last_indexing.current_chunk, Some(3));
    assert_eq!(last_indexing.total_chunks, Some(3));
}

#[tokio::test]
async fn test_index_file_reuses_embeddings_when_ordinals_shift() {
    let h = Harness::new();
    h.vault.insert(
        "doc.md",
        "# S1\nalpha\n\n# S2\nbeta\n\n# S3\ngamma\n\n# S4\ndelta",
    );
    let mut manager = h.open().await;
    manager.diff_and_sync().await.unwrap();

    h.provider.reset_counters();
    h.vault.insert(
        "doc.md",
        "# S0\nzero\n\n# S1\nalpha\n\n# S2\nbeta\n\n# S3\ngamma\n\n# S4\ndelta",
    );
    let summary = manager.index_file("doc.md").await.unwrap();

    assert_eq!(summary.added, 1);
    assert_eq!(summary.updated, 4);
    assert_eq!(h.provider.embedded_texts(), vec!["# S0\nzero"]);
    assert_eq!(manager.index().count(), 5);
    assert_eq!(manager.index().get("doc.md#4").unwrap().content, "# S4\ndelta");
}

#[tokio::test]
async fn test_index_file_embeds_only_the_edited_chunk() {
    let h = Harness::new();
    h.vault.insert("doc.md", "# S1\nalpha\n\n# S2\nbeta\n\n# S3\ngamma");
    let mut manager = h.open().await;
    manager.index_file("doc.md").await.unwrap();
    assert_eq!(manager.index().count(), 3);

    h.provider.reset_counters();
    h.vault.insert("doc.md", "# S1\nalpha\n\n# S2\nbeta!\n");
    let summary = manager.index_file("doc.md").await.unwrap();

    assert_eq!(h.provider.embedded_texts(), vec!["# S2\nbeta!"]);
    assert_eq!((summary.added, summary.updated, summary.deleted), (0, 1, 1));
    assert_eq!(ids_for(&manager, "doc.md"), vec!["doc.md#0", "doc.md#1"]);
}

#[tokio::test]
async fn test_remove_file() {
    let h = Harness::new();
    h.vault.insert("a.md", "# A\none\n\n# B\ntwo");
    h.vault.insert("b.md", "# C\nthree");
    let mut manager = h.open().await;
    manager.diff_and_sync().await.unwrap();

    assert_eq!(manager.remove_file("a.md").unwrap(), 2);
    assert!(ids_for(&manager, "a.md").is_empty());
    assert!(manager.index().get("a.md#0").is_none());
    assert_eq!(manager.index().count(), 1);
    assert_eq!(manager.remove_file("a.md").unwrap(), 0);
}

#[tokio::test]
async fn test_query_after_sync() {
    let h = Harness::new();
    h.seed_notes(6);
    let mut manager = h.open().await;
    manager.diff_and_sync().await.unwrap();

    let hits = manager.query("subject3 marker3", 3).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.len() <= 3);
    assert_eq!(hits[0].file_path, "note03.md");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let h = Harness::new();
    h.seed_notes(5);
    {
        let mut manager = h.open().await;
        manager.diff_and_sync().await.unwrap();
    }

    let mut manager = h.open().await;
    h.provider.reset_counters();
    let summary = manager.diff_and_sync().await.unwrap();

    assert_eq!((summary.added, summary.updated, summary.deleted), (0, 0, 0));
    assert_eq!(manager.index().count(), 5);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_lost_chunk_store_recovered_from_index() {
    let h = Harness::new();
    h.seed_notes(4);
    {
        let mut manager = h.open().await;
        manager.diff_and_sync().await.unwrap();
    }
    std::fs::remove_file(h.temp.path().join("chunks.json")).unwrap();

    let mut manager = h.open().await;
    assert_eq!(manager.store().len(), 4);

    h.provider.reset_counters();
    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!(summary.added, 0);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_corrupted_index_resets_store_and_resyncs() {
    let h = Harness::new();
    h.seed_notes(3);
    {
        let mut manager = h.open().await;
        manager.diff_and_sync().await.unwrap();
    }
    std::fs::write(h.temp.path().join("index.json"), "{\"version\": 1, \"dimen").unwrap();

    let mut manager = h.open().await;
    assert!(h
        .notices()
        .iter()
        .any(|n| matches!(n, Notice::IndexCorrupted { .. })));
    assert!(manager.store().is_empty());
    assert!(manager.stats().requires_rebuild);

    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!(summary.added, 3);
    assert_eq!(manager.index().count(), 3);
}

#[tokio::test]
async fn test_dimension_change_resets_store() {
    let h = Harness::new();
    h.seed_notes(3);
    {
        let mut manager = h.open().await;
        manager.diff_and_sync().await.unwrap();
    }

    let wider = Arc::new(MockProvider::new(DIMENSIONS * 2));
    let mut manager = h.open_with(wider, 100).await;

    assert!(h.notices().iter().any(|n| matches!(
        n,
        Notice::DimensionChanged { previous, current, .. }
            if *previous == DIMENSIONS && *current == DIMENSIONS * 2
    )));
    assert!(manager.store().is_empty());
    assert_eq!(manager.index().dimension(), DIMENSIONS * 2);

    let summary = manager.diff_and_sync().await.unwrap();
    assert_eq!(summary.added, 3);
}
