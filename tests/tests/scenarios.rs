//! End-to-end scenario tests for the tri-store memory engine, run against a
//! real [`memory_storage_redb::RedbBackend`] file rather than an in-memory
//! test double, so the redb persistence layer is exercised along the way.

use memory_core::orchestrator::{GetContextRequest, SearchRequest};
use memory_core::semantic::HashEmbeddingGenerator;
use memory_core::types::{ContentType, ContextType, FactCategory, MemoryType, ProjectStatus, Source};
use memory_core::{Engine, Error, MemoryConfig};
use memory_storage_redb::RedbBackend;
use std::collections::HashMap;
use std::sync::Arc;
use test_utils::TestProject;

fn test_engine(project: &TestProject) -> Engine<RedbBackend> {
    let backend = RedbBackend::open(project.dir.path().join("memory.redb")).unwrap();
    let embedder = Arc::new(HashEmbeddingGenerator::new(8));
    let config = MemoryConfig {
        embedding_dim: 8,
        ..MemoryConfig::default()
    };
    Engine::new(project.registry.clone(), backend, embedder, config)
}

#[tokio::test]
async fn authority_precedence_across_symbolic_episodic_semantic() {
    let project = TestProject::new();
    let engine = test_engine(&project);

    engine
        .add_fact(
            "alpha",
            "db.engine",
            serde_json::json!("postgres"),
            0.95,
            FactCategory::Fact,
            Source::User,
        )
        .await
        .unwrap();
    engine
        .add_episode(
            "alpha",
            "choosing a database for a small prototype",
            "evaluated sqlite and postgres",
            "sqlite was sufficient for the prototype's scale",
            "Consider using SQLite for small data",
            0.8,
        )
        .await
        .unwrap();
    engine
        .ingest_file(
            "alpha",
            "docs/overview.md",
            "Project uses MySQL for the legacy reporting pipeline.",
            Some(ContentType::Doc),
            HashMap::new(),
        )
        .await
        .unwrap();

    let envelope = engine
        .get_context(
            "alpha",
            GetContextRequest {
                context_type: ContextType::All,
                query: Some("which database".to_string()),
                trigger: Some("explicit_retrieval_request".to_string()),
                max_results: 10,
            },
        )
        .await
        .unwrap();

    assert_eq!(envelope.symbolic.len(), 1);
    assert_eq!(envelope.symbolic[0].fact.key, "db.engine");
    assert_eq!(envelope.episodic.len(), 1);
    assert!(envelope.episodic[0].episode.lesson.contains("SQLite"));
    assert!(!envelope.semantic.is_empty());
    assert!(envelope.semantic[0].content.contains("MySQL"));
}

#[tokio::test]
async fn conflict_resolution_rejects_lower_confidence_fact() {
    let project = TestProject::new();
    let engine = test_engine(&project);

    engine
        .add_fact(
            "alpha",
            "db.engine",
            serde_json::json!("postgres"),
            0.95,
            FactCategory::Fact,
            Source::User,
        )
        .await
        .unwrap();

    let result = engine
        .add_fact(
            "alpha",
            "db.engine",
            serde_json::json!("mysql"),
            0.8,
            FactCategory::Fact,
            Source::Agent,
        )
        .await;

    assert!(matches!(result, Err(Error::LowerConfidence { .. })));

    let envelope = engine
        .get_context(
            "alpha",
            GetContextRequest {
                context_type: ContextType::Symbolic,
                query: None,
                trigger: None,
                max_results: 10,
            },
        )
        .await
        .unwrap();
    assert_eq!(envelope.symbolic[0].fact.value, serde_json::json!("postgres"));
}

#[tokio::test]
async fn ingest_rejects_forbidden_content_kind() {
    let project = TestProject::new();
    let engine = test_engine(&project);

    let mut metadata = HashMap::new();
    metadata.insert("kind".to_string(), "decision".to_string());

    let result = engine
        .ingest_file(
            "alpha",
            "docs/decision.md",
            "We decided to use Rust for the backend.",
            Some(ContentType::Doc),
            metadata,
        )
        .await;

    assert!(matches!(result, Err(Error::ForbiddenContentKind { .. })));
}

#[tokio::test]
async fn search_with_invalid_trigger_is_rejected() {
    let project = TestProject::new();
    let engine = test_engine(&project);

    engine
        .ingest_file(
            "alpha",
            "docs/overview.md",
            "Some document content about the project.",
            Some(ContentType::Doc),
            HashMap::new(),
        )
        .await
        .unwrap();

    let result = engine
        .search(
            "alpha",
            SearchRequest {
                query: "project".to_string(),
                memory_type: MemoryType::Semantic,
                top_k: 5,
                trigger: Some("auto".to_string()),
            },
        )
        .await;

    assert!(matches!(result, Err(Error::InvalidTrigger(_))));
}

#[tokio::test]
async fn episode_with_excessive_situation_overlap_is_rejected() {
    let project = TestProject::new();
    let engine = test_engine(&project);

    let situation = "the build pipeline failed because the cache was stale";
    let result = engine
        .add_episode(
            "alpha",
            situation,
            "cleared the cache",
            "build succeeded",
            situation,
            0.7,
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn reingesting_identical_content_is_idempotent() {
    let project = TestProject::new();
    let engine = test_engine(&project);

    let content = "Deterministic chunking must be a pure function of content and chunk size.";
    let first = engine
        .ingest_file("alpha", "docs/chunking.md", content, Some(ContentType::Doc), HashMap::new())
        .await
        .unwrap();
    let second = engine
        .ingest_file("alpha", "docs/chunking.md", content, Some(ContentType::Doc), HashMap::new())
        .await
        .unwrap();

    assert_eq!(first.document_id, second.document_id);
    assert_eq!(first.chunk_ids, second.chunk_ids);

    let sources = engine.list_sources("alpha", None).await.unwrap();
    assert_eq!(sources.len(), 1);
}

#[tokio::test]
async fn list_projects_reflects_only_resolved_projects() {
    let project = TestProject::new();
    let engine = test_engine(&project);

    engine
        .add_fact(
            "alpha",
            "k",
            serde_json::json!(1),
            0.5,
            FactCategory::Fact,
            Source::Agent,
        )
        .await
        .unwrap();

    let projects = engine.list_projects(Some(ProjectStatus::Active)).await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "alpha");
}
