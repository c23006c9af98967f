//! Semantic Store: non-authoritative, chunked, embedded document retrieval.
//!
//! Never authoritative and never retrieved automatically: every retrieval
//! call must carry one of the four allowed [`crate::types::Trigger`] values.

pub mod chunk;
pub mod embeddings;
pub mod retrieval;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RankingWeights;
use crate::error::{Error, Result};
use crate::types::ContentType;

pub use chunk::{chunk_content, chunk_id, document_id, ChunkSpan};
pub use embeddings::{cosine_similarity, EmbeddingCache, EmbeddingGenerator, HashEmbeddingGenerator, NullEmbeddingGenerator};
pub use retrieval::{rank_chunks, recency_boost, RetrievalFilter, ScoredChunk};

/// `metadata.kind` substrings that indicate content belonging to another
/// tier and must never be admitted into the Semantic Store. Matched as a
/// substring (not exact equality) so `user_preference`, `design_decision`,
/// `agent_lesson`, `chat_history`, etc. are all caught, not just the bare
/// forms.
const FORBIDDEN_KINDS: &[(&str, &str)] = &[
    ("preference", "symbolic"),
    ("decision", "symbolic"),
    ("constraint", "symbolic"),
    ("lesson", "episodic"),
    ("chat", "episodic"),
];

/// A single ingested document's identity and metadata (content lives in its chunks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable content-addressed id, `doc_{project_id,source_path,content_type}`.
    pub document_id: String,
    /// Owning project.
    pub project_id: String,
    /// Caller-supplied logical path, e.g. `"docs/architecture.md"`.
    pub source_path: String,
    /// Content classification, explicit or detected.
    pub content_type: ContentType,
    /// When this document was (re-)ingested.
    pub ingested_at: DateTime<Utc>,
    /// Free-form caller metadata, also consulted for the content policy check.
    pub metadata: HashMap<String, String>,
}

/// One chunk of a document, with its own optional embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable content-addressed id, `chunk_{document_id,chunk_index}`.
    pub chunk_id: String,
    /// The document this chunk belongs to.
    pub document_id: String,
    /// Owning project (denormalized for direct chunk lookups).
    pub project_id: String,
    /// Zero-based position in the document's chunk sequence.
    pub chunk_index: usize,
    /// The chunk's text.
    pub content: String,
    /// `None` until a successful embedding call backfills it.
    pub embedding: Option<Vec<f32>>,
    /// Copied from the owning document at ingest time.
    pub metadata: HashMap<String, String>,
}

/// Result of a successful [`SemanticStore::ingest`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    /// The document's stable id.
    pub document_id: String,
    /// Ids of every chunk produced, in order.
    pub chunk_ids: Vec<String>,
    /// How many chunks got an embedding synchronously.
    pub chunks_with_embeddings: usize,
    /// How many chunks are pending embedding (the embedding call failed or
    /// was skipped; [`SemanticStore::backfill_embeddings`] can retry later).
    pub chunks_pending: usize,
}

/// Result of a successful [`SemanticStore::retrieve`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalOutcome {
    /// Ranked hits, highest `combined_score` first.
    pub hits: Vec<ScoredChunk>,
    /// How many candidate chunks were skipped because they had no embedding yet.
    pub pending: usize,
}

/// Durable backend a [`SemanticStore`] persists to. Implemented by
/// `memory-storage-redb`.
#[async_trait]
pub trait SemanticStorageBackend: Send + Sync {
    /// Insert or overwrite a document row.
    async fn upsert_document(&self, document: &Document) -> Result<()>;
    /// Fetch a document by id.
    async fn get_document(&self, project_id: &str, document_id: &str) -> Result<Option<Document>>;
    /// List every document in a project.
    async fn list_documents(&self, project_id: &str) -> Result<Vec<Document>>;
    /// Replace every chunk belonging to `document_id` with `chunks`.
    async fn replace_chunks(
        &self,
        project_id: &str,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<()>;
    /// Overwrite a single chunk row (used by [`SemanticStore::backfill_embeddings`]).
    async fn update_chunk(&self, chunk: &Chunk) -> Result<()>;
    /// List every chunk in a project, across all documents.
    async fn list_chunks(&self, project_id: &str) -> Result<Vec<Chunk>>;
    /// Delete a document and all of its chunks.
    async fn delete_document(&self, project_id: &str, document_id: &str) -> Result<bool>;
}

/// Business logic for the Semantic Store, generic over its durable backend.
pub struct SemanticStore<B: SemanticStorageBackend> {
    backend: Arc<B>,
    embedder: Arc<dyn EmbeddingGenerator>,
    cache: Arc<EmbeddingCache>,
}

impl<B: SemanticStorageBackend> SemanticStore<B> {
    /// Wrap a storage backend with semantic-store semantics.
    pub fn new(backend: Arc<B>, embedder: Arc<dyn EmbeddingGenerator>, cache: Arc<EmbeddingCache>) -> Self {
        Self {
            backend,
            embedder,
            cache,
        }
    }

    /// Reject `metadata["kind"]` values that belong to another tier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForbiddenContentKind`] naming the tier that should
    /// hold this content instead.
    fn check_content_policy(metadata: &HashMap<String, String>) -> Result<()> {
        let Some(kind) = metadata.get("kind") else {
            return Ok(());
        };
        let lower = kind.to_ascii_lowercase();
        if let Some((_, owning_tier)) = FORBIDDEN_KINDS.iter().find(|(k, _)| lower.contains(*k)) {
            return Err(Error::ForbiddenContentKind {
                kind: kind.clone(),
                owning_tier: (*owning_tier).to_string(),
            });
        }
        Ok(())
    }

    /// Chunk, embed, and persist a document. Re-ingesting the same
    /// `(project_id, source_path, content_type)` replaces its prior chunks
    /// entirely under the same `document_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForbiddenContentKind`] if `metadata["kind"]` names
    /// content that belongs to the Symbolic or Episodic Store instead.
    /// Returns [`Error::ValidationFailed`] if an embedding comes back with a
    /// length other than `embedding_dim`.
    #[allow(clippy::too_many_arguments)]
    pub async fn ingest(
        &self,
        project_id: &str,
        source_path: &str,
        content: &str,
        content_type_hint: Option<ContentType>,
        metadata: HashMap<String, String>,
        chunk_size: usize,
        chunk_overlap: usize,
        embedding_dim: usize,
    ) -> Result<IngestOutcome> {
        Self::check_content_policy(&metadata)?;

        let content_type = ContentType::detect(source_path, content_type_hint);
        let doc_id = document_id(project_id, source_path, content_type);
        let spans = chunk_content(content, chunk_size, chunk_overlap);

        if spans.is_empty() {
            return Err(Error::InvalidArgument(
                "document content is empty after trimming".into(),
            ));
        }

        let texts: Vec<String> = spans.iter().map(|s| s.content.clone()).collect();
        let embeddings = self.embed_batch(&texts).await;
        Self::check_embedding_dims(&embeddings, embedding_dim)?;

        let mut chunks = Vec::with_capacity(spans.len());
        let mut with_embeddings = 0usize;
        let mut pending = 0usize;
        for (span, embedding) in spans.iter().zip(embeddings.into_iter()) {
            if embedding.is_some() {
                with_embeddings += 1;
            } else {
                pending += 1;
            }
            chunks.push(Chunk {
                chunk_id: chunk_id(&doc_id, span.chunk_index),
                document_id: doc_id.clone(),
                project_id: project_id.to_string(),
                chunk_index: span.chunk_index,
                content: span.content.clone(),
                embedding,
                metadata: metadata.clone(),
            });
        }

        let document = Document {
            document_id: doc_id.clone(),
            project_id: project_id.to_string(),
            source_path: source_path.to_string(),
            content_type,
            ingested_at: Utc::now(),
            metadata,
        };

        self.backend.upsert_document(&document).await?;
        self.backend
            .replace_chunks(project_id, &doc_id, &chunks)
            .await?;

        info!(
            project_id,
            document_id = %doc_id,
            chunks = chunks.len(),
            pending,
            "ingested document"
        );

        Ok(IngestOutcome {
            document_id: doc_id,
            chunk_ids: chunks.into_iter().map(|c| c.chunk_id).collect(),
            chunks_with_embeddings: with_embeddings,
            chunks_pending: pending,
        })
    }

    /// Embed a batch of chunk texts, consulting the cache first. A batch
    /// failure from the embedder degrades every text in the batch to
    /// `None` (lazy embedding) rather than failing the whole ingest.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut results = vec![None; texts.len()];
        let mut to_fetch_idx = Vec::new();
        let mut to_fetch_text = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            if let Some(cached) = self.cache.get(text) {
                results[i] = Some(cached);
            } else {
                to_fetch_idx.push(i);
                to_fetch_text.push(text.clone());
            }
        }
        if to_fetch_text.is_empty() {
            return results;
        }
        match self.embedder.embed(&to_fetch_text).await {
            Ok(vectors) if vectors.len() == to_fetch_text.len() => {
                for ((idx, text), vector) in
                    to_fetch_idx.into_iter().zip(to_fetch_text.into_iter()).zip(vectors)
                {
                    self.cache.put(&text, vector.clone());
                    results[idx] = Some(vector);
                }
            }
            Ok(_) => {
                warn!("embedding backend returned a mismatched batch size, leaving chunks pending");
            }
            Err(err) => {
                warn!(error = %err, "embedding backend unavailable, leaving chunks pending");
            }
        }
        results
    }

    /// Reject any produced embedding whose length is not `expected_dim`.
    ///
    /// Stored embeddings must share one dimension so [`cosine_similarity`]
    /// never silently degrades to `0.0` on a mismatch; this is the single
    /// point both [`Self::ingest`] and [`Self::backfill_embeddings`] funnel
    /// through before a mismatched vector can reach storage.
    fn check_embedding_dims(embeddings: &[Option<Vec<f32>>], expected_dim: usize) -> Result<()> {
        for embedding in embeddings.iter().flatten() {
            if embedding.len() != expected_dim {
                return Err(Error::ValidationFailed(format!(
                    "embedding has dimension {}, expected {expected_dim}",
                    embedding.len()
                )));
            }
        }
        Ok(())
    }

    /// Re-run embedding for every chunk currently missing one, in a project.
    /// An explicit, out-of-band operation; nothing in [`SemanticStore::ingest`]
    /// or [`SemanticStore::retrieve`] calls this automatically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] if an embedding comes back with a
    /// length other than `embedding_dim`.
    pub async fn backfill_embeddings(&self, project_id: &str, embedding_dim: usize) -> Result<usize> {
        let chunks = self.backend.list_chunks(project_id).await?;
        let pending: Vec<Chunk> = chunks.into_iter().filter(|c| c.embedding.is_none()).collect();
        if pending.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = pending.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embed_batch(&texts).await;
        Self::check_embedding_dims(&embeddings, embedding_dim)?;
        let mut backfilled = 0;
        for (mut c, embedding) in pending.into_iter().zip(embeddings.into_iter()) {
            if let Some(embedding) = embedding {
                c.embedding = Some(embedding);
                self.backend.update_chunk(&c).await?;
                backfilled += 1;
            }
        }
        Ok(backfilled)
    }

    /// Retrieve the top-`top_k` chunks relevant to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTrigger`] unless `trigger` is one of the four
    /// allowed justifications; retrieval is never automatic.
    #[allow(clippy::too_many_arguments)]
    pub async fn retrieve(
        &self,
        project_id: &str,
        query: &str,
        trigger: &str,
        filter: &RetrievalFilter,
        weights: RankingWeights,
        include_recency: bool,
        min_similarity: f32,
        top_k: usize,
    ) -> Result<RetrievalOutcome> {
        trigger
            .parse::<crate::types::Trigger>()
            .map_err(Error::InvalidTrigger)?;

        let documents = self.backend.list_documents(project_id).await?;
        let doc_by_id: HashMap<&str, &Document> =
            documents.iter().map(|d| (d.document_id.as_str(), d)).collect();

        let chunks = self.backend.list_chunks(project_id).await?;
        let pending = chunks.iter().filter(|c| c.embedding.is_none()).count();

        let query_embedding = self
            .embed_batch(std::slice::from_ref(&query.to_string()))
            .await
            .into_iter()
            .next()
            .flatten();

        let Some(query_embedding) = query_embedding else {
            warn!("query embedding unavailable, returning no semantic hits");
            return Ok(RetrievalOutcome {
                hits: Vec::new(),
                pending,
            });
        };

        let candidates: Vec<_> = chunks
            .into_iter()
            .filter_map(|chunk| {
                let doc = doc_by_id.get(chunk.document_id.as_str())?;
                Some((
                    chunk,
                    doc.content_type,
                    doc.source_path.clone(),
                    doc.source_path.rsplit('/').next().map(str::to_string),
                    doc.ingested_at,
                ))
            })
            .collect();

        let hits = rank_chunks(
            query,
            &query_embedding,
            candidates,
            filter,
            weights,
            include_recency,
            min_similarity,
            top_k,
            Utc::now(),
        );

        Ok(RetrievalOutcome { hits, pending })
    }

    /// List every document in a project.
    pub async fn list_documents(&self, project_id: &str) -> Result<Vec<Document>> {
        self.backend.list_documents(project_id).await
    }

    /// Count the chunks currently stored for one document.
    pub async fn chunk_count(&self, project_id: &str, document_id: &str) -> Result<usize> {
        Ok(self
            .backend
            .list_chunks(project_id)
            .await?
            .iter()
            .filter(|c| c.document_id == document_id)
            .count())
    }

    /// Fetch a document by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `document_id` is unknown.
    pub async fn get_document(&self, project_id: &str, document_id: &str) -> Result<Document> {
        self.backend
            .get_document(project_id, document_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))
    }

    /// Hard-delete a document and its chunks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `document_id` is unknown.
    pub async fn delete_document(&self, project_id: &str, document_id: &str) -> Result<()> {
        if !self.backend.delete_document(project_id, document_id).await? {
            return Err(Error::NotFound(format!("document {document_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct InMemoryBackend {
        documents: AsyncMutex<HashMap<String, Document>>,
        chunks: AsyncMutex<HashMap<String, Vec<Chunk>>>,
    }

    #[async_trait]
    impl SemanticStorageBackend for InMemoryBackend {
        async fn upsert_document(&self, document: &Document) -> Result<()> {
            self.documents
                .lock()
                .await
                .insert(document.document_id.clone(), document.clone());
            Ok(())
        }
        async fn get_document(&self, project_id: &str, document_id: &str) -> Result<Option<Document>> {
            Ok(self
                .documents
                .lock()
                .await
                .get(document_id)
                .filter(|d| d.project_id == project_id)
                .cloned())
        }
        async fn list_documents(&self, project_id: &str) -> Result<Vec<Document>> {
            Ok(self
                .documents
                .lock()
                .await
                .values()
                .filter(|d| d.project_id == project_id)
                .cloned()
                .collect())
        }
        async fn replace_chunks(
            &self,
            _project_id: &str,
            document_id: &str,
            chunks: &[Chunk],
        ) -> Result<()> {
            self.chunks
                .lock()
                .await
                .insert(document_id.to_string(), chunks.to_vec());
            Ok(())
        }
        async fn update_chunk(&self, chunk: &Chunk) -> Result<()> {
            let mut guard = self.chunks.lock().await;
            if let Some(bucket) = guard.get_mut(&chunk.document_id) {
                if let Some(existing) = bucket.iter_mut().find(|c| c.chunk_id == chunk.chunk_id) {
                    *existing = chunk.clone();
                }
            }
            Ok(())
        }
        async fn list_chunks(&self, project_id: &str) -> Result<Vec<Chunk>> {
            Ok(self
                .chunks
                .lock()
                .await
                .values()
                .flatten()
                .filter(|c| c.project_id == project_id)
                .cloned()
                .collect())
        }
        async fn delete_document(&self, project_id: &str, document_id: &str) -> Result<bool> {
            let existed = self
                .documents
                .lock()
                .await
                .get(document_id)
                .is_some_and(|d| d.project_id == project_id);
            if existed {
                self.documents.lock().await.remove(document_id);
                self.chunks.lock().await.remove(document_id);
            }
            Ok(existed)
        }
    }

    fn store_with(embedder: Arc<dyn EmbeddingGenerator>) -> SemanticStore<InMemoryBackend> {
        SemanticStore::new(
            Arc::new(InMemoryBackend::default()),
            embedder,
            EmbeddingCache::new(64),
        )
    }

    fn hash_store() -> SemanticStore<InMemoryBackend> {
        store_with(Arc::new(HashEmbeddingGenerator::new(16)))
    }

    #[tokio::test]
    async fn ingest_rejects_forbidden_content_kind() {
        let store = hash_store();
        let mut metadata = HashMap::new();
        metadata.insert("kind".to_string(), "preference".to_string());
        let err = store
            .ingest(
                "alpha-aaaaaaaa",
                "notes.md",
                "the user prefers tabs",
                None,
                metadata,
                500,
                50,
                16,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ForbiddenContentKind { .. }));
    }

    #[tokio::test]
    async fn ingest_rejects_forbidden_content_kind_as_substring() {
        let store = hash_store();
        let mut metadata = HashMap::new();
        metadata.insert("kind".to_string(), "user_preference".to_string());
        let err = store
            .ingest(
                "alpha-aaaaaaaa",
                "notes.md",
                "the user prefers tabs",
                None,
                metadata,
                500,
                50,
                16,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ForbiddenContentKind { .. }));
    }

    #[tokio::test]
    async fn ingest_produces_chunks_with_embeddings() {
        let store = hash_store();
        let outcome = store
            .ingest(
                "alpha-aaaaaaaa",
                "README.md",
                "This project implements a tri-store memory engine.",
                None,
                HashMap::new(),
                500,
                50,
                16,
            )
            .await
            .unwrap();
        assert_eq!(outcome.chunks_pending, 0);
        assert_eq!(outcome.chunks_with_embeddings, outcome.chunk_ids.len());
    }

    #[tokio::test]
    async fn ingest_with_unavailable_embedder_leaves_chunks_pending() {
        let store = store_with(Arc::new(NullEmbeddingGenerator::new(16)));
        let outcome = store
            .ingest(
                "alpha-aaaaaaaa",
                "README.md",
                "Some content to chunk and embed later.",
                None,
                HashMap::new(),
                500,
                50,
                16,
            )
            .await
            .unwrap();
        assert_eq!(outcome.chunks_with_embeddings, 0);
        assert!(outcome.chunks_pending > 0);
    }

    #[tokio::test]
    async fn retrieve_rejects_invalid_trigger() {
        let store = hash_store();
        let err = store
            .retrieve(
                "alpha-aaaaaaaa",
                "query",
                "auto",
                &RetrievalFilter::default(),
                RankingWeights::default(),
                true,
                0.0,
                5,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTrigger(_)));
    }

    #[tokio::test]
    async fn retrieve_finds_ingested_chunk_with_matching_identical_text() {
        let store = hash_store();
        store
            .ingest(
                "alpha-aaaaaaaa",
                "README.md",
                "A deterministic chunking pipeline for agent memory.",
                None,
                HashMap::new(),
                500,
                50,
                16,
            )
            .await
            .unwrap();
        let outcome = store
            .retrieve(
                "alpha-aaaaaaaa",
                "A deterministic chunking pipeline for agent memory.",
                "explicit_retrieval_request",
                &RetrievalFilter::default(),
                RankingWeights::default(),
                true,
                0.0,
                5,
            )
            .await
            .unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert!((outcome.hits[0].similarity - 1.0).abs() < 1e-4);
        assert_eq!(outcome.hits[0].citation, "[README.md:0]");
    }

    #[tokio::test]
    async fn backfill_embeddings_fills_pending_chunks() {
        let store = hash_store();
        store
            .ingest(
                "alpha-aaaaaaaa",
                "README.md",
                "Content that will initially fail to embed.",
                None,
                HashMap::new(),
                500,
                50,
                16,
            )
            .await
            .unwrap();
        // force every chunk back to pending to exercise the backfill path
        let chunks = store.backend.list_chunks("alpha-aaaaaaaa").await.unwrap();
        for mut c in chunks {
            c.embedding = None;
            store.backend.update_chunk(&c).await.unwrap();
        }
        let backfilled = store
            .backfill_embeddings("alpha-aaaaaaaa", 16)
            .await
            .unwrap();
        assert_eq!(backfilled, 1);
    }

    #[tokio::test]
    async fn ingest_rejects_embedding_with_wrong_dimension() {
        let store = store_with(Arc::new(HashEmbeddingGenerator::new(16)));
        let err = store
            .ingest(
                "alpha-aaaaaaaa",
                "README.md",
                "Content embedded at the wrong dimension.",
                None,
                HashMap::new(),
                500,
                50,
                32,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn delete_document_removes_its_chunks() {
        let store = hash_store();
        let outcome = store
            .ingest(
                "alpha-aaaaaaaa",
                "README.md",
                "Content to be deleted shortly after ingest.",
                None,
                HashMap::new(),
                500,
                50,
                16,
            )
            .await
            .unwrap();
        store
            .delete_document("alpha-aaaaaaaa", &outcome.document_id)
            .await
            .unwrap();
        assert!(store
            .get_document("alpha-aaaaaaaa", &outcome.document_id)
            .await
            .is_err());
        let chunks = store.backend.list_chunks("alpha-aaaaaaaa").await.unwrap();
        assert!(chunks.is_empty());
    }
}
