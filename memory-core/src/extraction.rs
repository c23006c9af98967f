//! Episode extraction seam: turning a raw situation/action/outcome report
//! into an abstracted lesson is delegated to an external LLM call. This
//! module defines the trait the orchestrator codes against and a default
//! no-op implementation for deployments without one configured.

use async_trait::async_trait;

use crate::error::Result;

/// A proposed episode, pending the Episodic Store's own abstraction checks.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeDraft {
    /// The abstracted takeaway, not yet validated.
    pub lesson: String,
    /// Extractor's own confidence in the draft, in `[0, 1]`.
    pub confidence: f32,
}

/// `(situation, action, outcome) -> lesson`, external to the core engine.
///
/// Implementations are expected to call out to an LLM; the core never
/// assumes a draft is well-formed and always re-validates it through
/// [`crate::episodic::validate_episode_fields`] before storing it.
#[async_trait]
pub trait LlmExtractor: Send + Sync {
    /// Attempt to extract an episode lesson from a completed interaction.
    ///
    /// Returns `Ok(None)` when the extractor declines to propose a lesson
    /// (e.g. the interaction was too trivial to abstract).
    ///
    /// # Errors
    ///
    /// Returns an error if the extractor backend itself is unavailable.
    async fn extract_episode(
        &self,
        situation: &str,
        action: &str,
        outcome: &str,
    ) -> Result<Option<EpisodeDraft>>;
}

/// Always declines to propose a lesson. The default when no extractor
/// backend is configured; callers fall back to manual `add_episode` calls.
#[derive(Debug, Default)]
pub struct NoopExtractor;

#[async_trait]
impl LlmExtractor for NoopExtractor {
    async fn extract_episode(
        &self,
        _situation: &str,
        _action: &str,
        _outcome: &str,
    ) -> Result<Option<EpisodeDraft>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_extractor_always_declines() {
        let extractor = NoopExtractor;
        let result = extractor.extract_episode("s", "a", "o").await.unwrap();
        assert!(result.is_none());
    }
}
