//! Shared fixtures for exercising the tri-store memory engine in tests:
//! a disposable project root, a deterministic embedder, a no-op episode
//! extractor, and small builders for the three entity types.

use std::collections::HashMap;

use memory_core::registry::ProjectRegistry;
use memory_core::semantic::HashEmbeddingGenerator;
use memory_core::symbolic::Fact;
use memory_core::types::{ContentType, FactCategory, Source};
use tempfile::TempDir;

/// A disposable project root plus a registry rooted at it, torn down when dropped.
pub struct TestProject {
    /// Keeps the underlying temp directory alive for the fixture's lifetime.
    pub dir: TempDir,
    /// A registry rooted at `dir`.
    pub registry: std::sync::Arc<ProjectRegistry>,
}

impl TestProject {
    /// Create a fresh temp-rooted registry.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp project root");
        let registry = ProjectRegistry::new(dir.path().to_path_buf());
        Self { dir, registry }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A deterministic 8-dimension embedder, good enough to exercise chunking,
/// ranking, and persistence without a real model.
#[must_use]
pub fn test_embedder() -> std::sync::Arc<HashEmbeddingGenerator> {
    std::sync::Arc::new(HashEmbeddingGenerator::new(8))
}

/// Build a fact with sensible test defaults, overriding only what the test cares about.
#[must_use]
pub fn sample_fact(project_id: &str, key: &str, value: serde_json::Value) -> Fact {
    Fact::new(project_id, FactCategory::Fact, key, value, 0.9, Source::User)
}

/// Build a short document body long enough to produce more than one chunk
/// at the default `chunk_size`.
#[must_use]
pub fn sample_document_content() -> String {
    "The tri-store memory engine keeps authoritative facts, advisory lessons, \
     and non-authoritative retrieved chunks strictly separated. Retrieval is \
     never automatic: every semantic lookup must carry an explicit trigger. \
     Facts win ties by confidence; episodes are validated for abstraction \
     before being stored."
        .repeat(4)
}

/// Metadata map with a single `content_type` hint, for ingest calls that
/// don't care about arbitrary metadata.
#[must_use]
pub fn content_type_metadata(content_type: ContentType) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("content_type".to_string(), format!("{content_type:?}"));
    metadata
}
