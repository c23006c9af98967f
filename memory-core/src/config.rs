//! Deployment configuration, loadable from TOML.
//!
//! Field defaults mirror the configuration table in the external interface
//! specification; every recognized option there has a field here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Weights applied to the three factors of a semantic combined score.
/// MUST sum to 1.0; [`RankingWeights::validate`] enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    /// Weight applied to cosine similarity.
    pub similarity: f32,
    /// Weight applied to metadata relevance.
    pub metadata: f32,
    /// Weight applied to the recency boost.
    pub recency: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            similarity: 0.7,
            metadata: 0.2,
            recency: 0.1,
        }
    }
}

impl RankingWeights {
    /// Reject weight sets that do not sum to 1.0 within floating-point tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] if the weights do not sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        let sum = self.similarity + self.metadata + self.recency;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(Error::ValidationFailed(format!(
                "ranking_weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in characters.
    pub chunk_overlap: usize,
    /// Default semantic retrieval `top_k`.
    pub top_k: usize,
    /// Floor below which a semantic hit is dropped, regardless of rank.
    pub min_similarity: f32,
    /// Whether recency boosts the combined semantic score.
    pub include_recency: bool,
    /// Override of the three ranking weights.
    pub ranking_weights: RankingWeights,
    /// Base directory under which every project root is created.
    pub data_root: PathBuf,
    /// Required embedding vector dimension for this deployment.
    pub embedding_dim: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            min_similarity: 0.0,
            include_recency: true,
            ranking_weights: RankingWeights::default(),
            data_root: PathBuf::from("./data"),
            embedding_dim: 384,
        }
    }
}

impl MemoryConfig {
    /// Parse configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] if the document is malformed or
    /// the ranking weights do not sum to 1.0.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: MemoryConfig =
            toml::from_str(input).map_err(|e| Error::ValidationFailed(e.to_string()))?;
        config.ranking_weights.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ranking_weights_sum_to_one() {
        RankingWeights::default().validate().unwrap();
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let weights = RankingWeights {
            similarity: 0.5,
            metadata: 0.2,
            recency: 0.1,
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults_missing_is_an_error() {
        // Our struct has no field defaults of its own in TOML (non-Option fields
        // are all required), matching the source-of-truth table in the spec.
        let full = r#"
            chunk_size = 500
            chunk_overlap = 50
            top_k = 3
            min_similarity = 0.0
            include_recency = true
            data_root = "./data"
            embedding_dim = 384

            [ranking_weights]
            similarity = 0.7
            metadata = 0.2
            recency = 0.1
        "#;
        let cfg = MemoryConfig::from_toml_str(full).unwrap();
        assert_eq!(cfg.chunk_size, 500);
        assert_eq!(cfg.embedding_dim, 384);
    }
}
