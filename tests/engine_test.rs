// tests/engine_test.rs
// End-to-end engine behavior: ingest -> cluster -> abstract -> retrieve.

mod common;

use common::{setup_engine, test_config, MockEmbedder, MockSummarizer, TEST_DIM};
use engram::memory::traits::FragmentStore;

/// Three near-duplicate fragments on one topic, each with an explicit
/// embedding so pairwise cosine distances stay under the 0.3 eps.
fn deadline_embedder() -> MockEmbedder {
    let embedder = MockEmbedder::new(TEST_DIM);
    embedder.set(
        "the project deadline is friday",
        vec![1.0, 0.05, 0.0, 0.0],
    );
    embedder.set(
        "project deadline moved to friday",
        vec![0.95, 0.1, 0.0, 0.0],
    );
    embedder.set(
        "deadline for the project this friday",
        vec![1.0, 0.0, 0.05, 0.0],
    );
    // Query and abstraction summary live near the same region
    embedder.set("project deadline", vec![1.0, 0.0, 0.0, 0.0]);
    embedder.set(
        "The team is under deadline pressure on the project.",
        vec![0.98, 0.02, 0.02, 0.0],
    );
    embedder
}

async fn ingest_deadline_fragments(service: &engram::memory::MemoryService) -> Vec<i64> {
    let mut ids = Vec::new();
    for text in [
        "the project deadline is friday",
        "project deadline moved to friday",
        "deadline for the project this friday",
    ] {
        ids.push(service.ingest(text).await.unwrap());
    }
    ids
}

#[tokio::test]
async fn ingest_persists_and_indexes_fragment() {
    let (service, store, index, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("unused"),
    )
    .await;

    let id = service.ingest("the project deadline is friday").await.unwrap();

    let fragment = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(fragment.text, "the project deadline is friday");
    assert_eq!(fragment.abstraction_level, 1);
    assert_eq!(fragment.importance, Some(0.5));
    assert_eq!(fragment.access_count, 0);
    assert!(fragment.cluster_id.is_none());
    assert_eq!(
        fragment.embedding.as_ref().map(|e| e.len()),
        Some(TEST_DIM)
    );
    assert!(index.contains(id));
}

#[tokio::test]
async fn ingest_rejects_mismatched_embedding_dimension() {
    let embedder = MockEmbedder::new(TEST_DIM);
    embedder.set("odd one out", vec![1.0, 0.0]); // wrong size
    let (service, _, _, _) =
        setup_engine(test_config(), embedder, MockSummarizer::fixed("unused")).await;

    let result = service.ingest("odd one out").await;
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("dimension mismatch"));
}

#[tokio::test]
async fn clustering_groups_near_duplicates_into_one_cluster() {
    let (service, store, _, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("unused"),
    )
    .await;

    let ids = ingest_deadline_fragments(&service).await;

    let report = service.run_clustering().await.unwrap();
    assert_eq!(report.unclustered_found, 3);
    assert_eq!(report.clusters_formed, 1);
    assert_eq!(report.members_assigned, 3);
    assert_eq!(report.noise_fragments, 0);

    let status = service.cluster_status().await.unwrap();
    assert_eq!(status.total_clusters, 1);
    assert_eq!(status.clusters[0].member_count, 3);
    // Theme picks up the "project" topic from the member texts
    assert!(status.clusters[0].theme.contains("project"));

    for id in ids {
        let fragment = store.find_by_id(id).await.unwrap().unwrap();
        assert!(fragment.cluster_id.is_some());
    }
}

#[tokio::test]
async fn clustering_leaves_outliers_unclustered() {
    let embedder = deadline_embedder();
    embedder.set("my cat likes the windowsill", vec![0.0, 0.0, 0.0, 1.0]);
    let (service, store, _, _) =
        setup_engine(test_config(), embedder, MockSummarizer::fixed("unused")).await;

    ingest_deadline_fragments(&service).await;
    let outlier_id = service.ingest("my cat likes the windowsill").await.unwrap();

    let report = service.run_clustering().await.unwrap();
    assert_eq!(report.clusters_formed, 1);
    assert_eq!(report.noise_fragments, 1);

    // Noise stays unclustered and is reconsidered next run
    let outlier = store.find_by_id(outlier_id).await.unwrap().unwrap();
    assert!(outlier.cluster_id.is_none());
}

#[tokio::test]
async fn clustering_run_is_idempotent_without_new_fragments() {
    let (service, _, _, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("unused"),
    )
    .await;

    ingest_deadline_fragments(&service).await;
    service.run_clustering().await.unwrap();

    // The unclustered pool only shrinks: a second run finds nothing
    let second = service.run_clustering().await.unwrap();
    assert_eq!(second.unclustered_found, 0);
    assert_eq!(second.clusters_formed, 0);
}

#[tokio::test]
async fn abstraction_condenses_a_mature_cluster() {
    let (service, store, index, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("The team is under deadline pressure on the project."),
    )
    .await;

    let ids = ingest_deadline_fragments(&service).await;
    service.run_clustering().await.unwrap();

    let report = service.run_abstraction().await.unwrap();
    assert_eq!(report.abstractions_created, 1);
    assert!(report.failed_clusters.is_empty());

    let abstractions = store.find_abstractions().await.unwrap();
    assert_eq!(abstractions.len(), 1);
    let abstraction = &abstractions[0];
    assert_eq!(abstraction.abstraction_level, 2);
    let importance = abstraction.importance.unwrap();
    assert!((0.6..=1.0).contains(&importance));
    assert!(abstraction.cluster_id.is_some());
    assert!(index.contains(abstraction.id.unwrap()));

    // Bidirectional links: members point at the abstraction, and the
    // inverse query returns exactly the three originals
    let children = store.find_children(abstraction.id.unwrap()).await.unwrap();
    assert_eq!(children.len(), 3);
    for id in ids {
        let child = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(child.parent_id, abstraction.id);
    }
}

#[tokio::test]
async fn abstraction_runs_only_once_per_cluster() {
    let (service, store, _, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("The team is under deadline pressure on the project."),
    )
    .await;

    ingest_deadline_fragments(&service).await;
    service.run_clustering().await.unwrap();
    service.run_abstraction().await.unwrap();

    let second = service.run_abstraction().await.unwrap();
    assert_eq!(second.abstractions_created, 0);
    assert_eq!(second.skipped_existing, 1);
    assert_eq!(store.find_abstractions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn abstraction_failure_is_isolated_and_reported() {
    let (service, store, _, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::failing(),
    )
    .await;

    ingest_deadline_fragments(&service).await;
    service.run_clustering().await.unwrap();

    let report = service.run_abstraction().await.unwrap();
    assert_eq!(report.abstractions_created, 0);
    assert_eq!(report.failed_clusters.len(), 1);
    assert!(store.find_abstractions().await.unwrap().is_empty());
}

#[tokio::test]
async fn retrieve_ranks_cluster_members_and_bumps_access() {
    let (service, store, _, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("The team is under deadline pressure on the project."),
    )
    .await;

    ingest_deadline_fragments(&service).await;
    service.run_clustering().await.unwrap();

    let results = service.retrieve("project deadline", 5).await.unwrap();
    assert!(!results.is_empty());

    // Descending by score
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    // Feedback loop: every returned fragment was touched exactly once
    for result in &results {
        let stored = store
            .find_by_id(result.fragment.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_count, result.fragment.access_count + 1);
        assert!(stored.last_accessed >= result.fragment.last_accessed);
    }
}

#[tokio::test]
async fn retrieve_deduplicates_identical_text() {
    let embedder = MockEmbedder::new(TEST_DIM);
    embedder.set("coffee with alex tomorrow", vec![0.0, 1.0, 0.05, 0.0]);
    embedder.set("Coffee with Alex tomorrow", vec![0.0, 0.95, 0.1, 0.0]);
    embedder.set("espresso with alex next week", vec![0.0, 1.0, 0.0, 0.05]);
    embedder.set("coffee plans", vec![0.0, 1.0, 0.0, 0.0]);
    let (service, _, _, _) =
        setup_engine(test_config(), embedder, MockSummarizer::fixed("unused")).await;

    service.ingest("coffee with alex tomorrow").await.unwrap();
    service.ingest("Coffee with Alex tomorrow").await.unwrap();
    service.ingest("espresso with alex next week").await.unwrap();
    service.run_clustering().await.unwrap();

    // Three cluster members, two sharing normalized text: one of the
    // duplicates is dropped
    let results = service.retrieve("coffee plans", 5).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn retrieve_returns_empty_when_no_cluster_matches() {
    let embedder = deadline_embedder();
    embedder.set("completely unrelated", vec![0.0, 0.0, 0.0, 1.0]);
    let (service, _, _, _) =
        setup_engine(test_config(), embedder, MockSummarizer::fixed("unused")).await;

    ingest_deadline_fragments(&service).await;
    service.run_clustering().await.unwrap();

    let results = service.retrieve("completely unrelated", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn retrieve_propagates_embedding_failure() {
    let (service, _, _, _) = setup_engine(
        test_config(),
        MockEmbedder::failing(TEST_DIM),
        MockSummarizer::fixed("unused"),
    )
    .await;

    // An empty result must mean "nothing relevant", never "embedding broke"
    assert!(service.retrieve("anything", 5).await.is_err());
    assert!(service.search("anything", 5).await.is_err());
}

#[tokio::test]
async fn direct_search_hits_the_index() {
    let (service, _, _, _) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("unused"),
    )
    .await;

    ingest_deadline_fragments(&service).await;

    // No clustering needed for the direct path
    let results = service.search("project deadline", 5).await.unwrap();
    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn retrieve_context_renders_numbered_list() {
    let (service, _, _, embedder) = setup_engine(
        test_config(),
        deadline_embedder(),
        MockSummarizer::fixed("unused"),
    )
    .await;
    embedder.set("zzz nothing here", vec![0.0, 0.0, 0.0, 1.0]);

    ingest_deadline_fragments(&service).await;
    service.run_clustering().await.unwrap();

    let context = service.retrieve_context("project deadline", 3).await.unwrap();
    assert!(context.starts_with("Relevant memories:"));
    assert!(context.contains("1. "));

    let empty = service.retrieve_context("zzz nothing here", 3).await.unwrap();
    assert_eq!(empty, "No relevant memories found.");
}

#[tokio::test]
async fn record_access_on_missing_fragment_is_a_noop() {
    let (_, store, _, _) = setup_engine(
        test_config(),
        MockEmbedder::new(TEST_DIM),
        MockSummarizer::fixed("unused"),
    )
    .await;

    let touched = store.record_access(424242, chrono::Utc::now()).await.unwrap();
    assert!(!touched);
}
