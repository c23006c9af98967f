//! Retrieval ranking: combined score, metadata relevance, recency boost,
//! and tie-breaking for the Semantic Store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Chunk;
use crate::config::RankingWeights;
use crate::types::ContentType;

const CODE_TOKENS: &[&str] = &[
    "fn", "function", "class", "struct", "impl", "def", "import", "const", "let", "var",
    "return", "async", "await",
];

/// Filters narrowing the candidate chunk set before scoring.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilter {
    /// Restrict to a single content type.
    pub content_type: Option<ContentType>,
    /// Require `source_path` to contain this substring.
    pub source_path_contains: Option<String>,
    /// Require `metadata[key] == value`.
    pub metadata_equals: Option<(String, String)>,
}

impl RetrievalFilter {
    fn matches(&self, chunk: &Chunk, content_type: ContentType, source_path: &str) -> bool {
        if self.content_type.is_some_and(|ct| ct != content_type) {
            return false;
        }
        if let Some(substr) = &self.source_path_contains {
            if !source_path.contains(substr.as_str()) {
                return false;
            }
        }
        if let Some((key, value)) = &self.metadata_equals {
            if chunk.metadata.get(key).map(String::as_str) != Some(value.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A scored semantic retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// The matched chunk id.
    pub chunk_id: String,
    /// Chunk text.
    pub content: String,
    /// Source document path.
    pub source_path: String,
    /// Position within the document.
    pub chunk_index: usize,
    /// Raw cosine similarity.
    pub similarity: f32,
    /// `0.7*similarity + 0.2*metadata_relevance + 0.1*recency_boost` (weights configurable).
    pub combined_score: f32,
    /// Human-readable `[source_path:chunk_index]` reference.
    pub citation: String,
}

/// Whether `query` looks like it's asking about code (affects metadata relevance).
fn query_wants_code(query: &str) -> bool {
    let lower = query.to_ascii_lowercase();
    CODE_TOKENS.iter().any(|tok| lower.contains(tok))
}

fn metadata_relevance(
    query: &str,
    content_type: ContentType,
    source_path: &str,
    filename: Option<&str>,
) -> f32 {
    let mut score = 0.0;
    if query_wants_code(query) && content_type == ContentType::Code {
        score += 0.5;
    }
    let query_terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    let haystack = format!(
        "{} {}",
        source_path.to_ascii_lowercase(),
        filename.unwrap_or_default().to_ascii_lowercase()
    );
    if query_terms.iter().any(|term| !term.is_empty() && haystack.contains(term.as_str())) {
        score += 0.5;
    }
    score.min(1.0)
}

/// Recency boost: `1.0` under 7 days old, linearly decaying to `0.0` at 30
/// days, `0.0` beyond. Only meaningful when the caller requested recency.
#[must_use]
pub fn recency_boost(now: DateTime<Utc>, ingested_at: DateTime<Utc>) -> f32 {
    let age_days = (now - ingested_at).num_seconds() as f32 / 86_400.0;
    if age_days < 7.0 {
        1.0
    } else if age_days < 30.0 {
        1.0 - (age_days - 7.0) / 23.0
    } else {
        0.0
    }
}

/// Rank candidate chunks against `query`, applying `filter`, the content
/// policy (chunks must already be admitted, this step does not re-check
/// policy), and the combined-score formula, returning the top `top_k`.
///
/// Each candidate tuple is `(chunk, content_type, source_path, filename,
/// ingested_at, embedding)`. Chunks with no embedding are skipped by the
/// caller before this function is reached (they are counted separately as
/// `pending`).
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn rank_chunks(
    query: &str,
    query_embedding: &[f32],
    candidates: Vec<(Chunk, ContentType, String, Option<String>, DateTime<Utc>)>,
    filter: &RetrievalFilter,
    weights: RankingWeights,
    include_recency: bool,
    min_similarity: f32,
    top_k: usize,
    now: DateTime<Utc>,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .filter(|(chunk, content_type, source_path, _, _)| {
            filter.matches(chunk, *content_type, source_path)
        })
        .filter_map(|(chunk, content_type, source_path, filename, ingested_at)| {
            let embedding = chunk.embedding.as_ref()?;
            let similarity = super::embeddings::cosine_similarity(query_embedding, embedding);
            if similarity < min_similarity {
                return None;
            }
            let metadata_score =
                metadata_relevance(query, content_type, &source_path, filename.as_deref());
            let recency = if include_recency {
                recency_boost(now, ingested_at)
            } else {
                0.0
            };
            let combined = weights.similarity * similarity
                + weights.metadata * metadata_score
                + weights.recency * recency;
            let citation = format!("[{}:{}]", source_path, chunk.chunk_index);
            Some(ScoredChunk {
                chunk_id: chunk.chunk_id.clone(),
                content: chunk.content.clone(),
                source_path,
                chunk_index: chunk.chunk_index,
                similarity,
                combined_score: combined,
                citation,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored.truncate(top_k);
    scored
}
