//! Embedding Generator seam: the spec treats the embedding model as an
//! external `text -> vector[d]` function. This module defines the trait the
//! rest of the engine codes against, plus two deployment-free
//! implementations used for tests and for lazy/offline operation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// `text -> vector[d]`, fixed dimension `d` per deployment. Implementations
/// are expected to be cheap to clone (wrap an `Arc`-backed client) and safe
/// to share across concurrent requests; the orchestrator rate-limits calls
/// through a bounded semaphore, not through this trait.
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// The fixed vector dimension this generator produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts. Implementations SHOULD return one vector per
    /// input text, in order; a failure MUST fail the whole batch (callers
    /// treat a batch failure as "no embeddings for any of these chunks",
    /// per the ingest pipeline's lazy-embedding fallback).
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding backend is unavailable.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Always reports embeddings as unavailable. Used to exercise the
/// lazy-embedding / degraded-retrieval paths without a real model.
#[derive(Debug, Default)]
pub struct NullEmbeddingGenerator {
    dimension: usize,
}

impl NullEmbeddingGenerator {
    /// Construct a generator that always fails, for a given nominal dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingGenerator for NullEmbeddingGenerator {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::StoreUnavailable(
            "embedding generator unavailable".into(),
        ))
    }
}

/// Deterministic hash-based pseudo-embedding generator.
///
/// **Not semantically meaningful.** Produces the same vector for the same
/// text every time, which is sufficient for exercising chunking,
/// persistence, and ranking math in tests, but similarity scores do not
/// reflect real semantic relatedness. Grounded on the teacher's own
/// `embeddings_simple::text_to_embedding` mock.
#[derive(Debug)]
pub struct HashEmbeddingGenerator {
    dimension: usize,
}

impl HashEmbeddingGenerator {
    /// Construct a generator producing `dimension`-length vectors.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();
        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let component = ((seed >> 33) as f64 / u32::MAX as f64) * 2.0 - 1.0;
            vector.push(component as f32);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingGenerator for HashEmbeddingGenerator {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` for a
/// dimension mismatch or a zero vector rather than panicking, since callers
/// may compare embeddings produced before a dimension migration.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Bounded LRU cache mapping a content hash to its embedding, avoiding
/// redundant calls to the shared embedding backend for repeated chunk text.
pub struct EmbeddingCache {
    inner: Mutex<LruCache<u64, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Construct a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1))
            .unwrap_or_else(|| std::num::NonZeroUsize::new(1).expect("1 is nonzero"));
        Arc::new(Self {
            inner: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn key_for(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    /// Look up a cached embedding for `text`, if present.
    #[must_use]
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.inner.lock().get(&Self::key_for(text)).cloned()
    }

    /// Cache an embedding for `text`, evicting the least-recently-used entry
    /// if the cache is full.
    pub fn put(&self, text: &str, embedding: Vec<f32>) {
        self.inner.lock().put(Self::key_for(text), embedding);
    }
}
