//! Episodic Store: advisory lessons, never authoritative.

mod abstraction;
pub mod capacity;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

pub use abstraction::validate_episode_fields;
pub use capacity::CapacityManager;

/// A single advisory lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// What situation the agent was in.
    pub situation: String,
    /// What action was taken.
    pub action: String,
    /// What happened as a result.
    pub outcome: String,
    /// The abstracted takeaway (never a log of the situation).
    pub lesson: String,
    /// Confidence in `[0, 1]`, clamped on write.
    pub confidence: f32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Episode {
    /// Construct a new episode, clamping `confidence` into `[0, 1]` per the
    /// Episodic Store's validation rules.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        situation: impl Into<String>,
        action: impl Into<String>,
        outcome: impl Into<String>,
        lesson: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            situation: situation.into(),
            action: action.into(),
            outcome: outcome.into(),
            lesson: lesson.into(),
            confidence: confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }
}

/// Filters accepted by [`EpisodicStore::query`]. `project_id` is carried
/// separately as a required parameter rather than a filter field, matching
/// the external spec's "always required" wording.
#[derive(Debug, Clone, Default)]
pub struct EpisodeFilter {
    /// Require `lesson` to contain this substring (case-sensitive).
    pub lesson_contains: Option<String>,
    /// Require `situation` to contain this substring (case-sensitive).
    pub situation_contains: Option<String>,
    /// Floor on `confidence`.
    pub min_confidence: Option<f32>,
    /// Cap the number of rows returned.
    pub limit: Option<usize>,
}

/// Durable backend an [`EpisodicStore`] persists to.
#[async_trait]
pub trait EpisodicStorageBackend: Send + Sync {
    /// Persist a new episode row.
    async fn insert_episode(&self, episode: &Episode) -> Result<()>;
    /// Fetch an episode by id.
    async fn get_episode(&self, project_id: &str, id: Uuid) -> Result<Option<Episode>>;
    /// Hard-delete an episode, returning it if it existed.
    async fn delete_episode(&self, project_id: &str, id: Uuid) -> Result<Option<Episode>>;
    /// List every episode in a project.
    async fn list_episodes(&self, project_id: &str) -> Result<Vec<Episode>>;
    /// Remove every episode matching the cleanup predicate, returning the count removed.
    async fn delete_matching(
        &self,
        project_id: &str,
        older_than: DateTime<Utc>,
        max_confidence: f32,
    ) -> Result<usize>;
}

/// Business logic for the Episodic Store, generic over its durable backend.
///
/// No operation here reads from or writes to the Symbolic or Semantic
/// stores: this type never holds a reference to either.
pub struct EpisodicStore<B: EpisodicStorageBackend> {
    backend: Arc<B>,
}

impl<B: EpisodicStorageBackend> EpisodicStore<B> {
    /// Wrap a storage backend with episodic-store semantics.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Validate and persist an episode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::ValidationFailed`] if any abstraction
    /// rule is violated: empty field, `lesson` over 1000 chars, ≥70%
    /// word-overlap between `lesson` and `situation`, or a path-like
    /// sequence embedded in `lesson`.
    pub async fn store(&self, episode: Episode) -> Result<Episode> {
        validate_episode_fields(&episode)?;
        self.backend.insert_episode(&episode).await?;
        info!(project_id = %episode.project_id, episode_id = %episode.id, "stored episode");
        Ok(episode)
    }

    /// Fetch a single episode by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::NotFound`] if `id` is unknown.
    pub async fn get(&self, project_id: &str, id: Uuid) -> Result<Episode> {
        self.backend
            .get_episode(project_id, id)
            .await?
            .ok_or_else(|| crate::error::Error::NotFound(format!("episode {id}")))
    }

    /// Hard-delete an episode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::NotFound`] if `id` is unknown.
    pub async fn delete(&self, project_id: &str, id: Uuid) -> Result<()> {
        self.backend
            .delete_episode(project_id, id)
            .await?
            .ok_or_else(|| crate::error::Error::NotFound(format!("episode {id}")))?;
        Ok(())
    }

    /// Query episodes, ordered `confidence DESC, created_at DESC`.
    pub async fn query(&self, project_id: &str, filter: &EpisodeFilter) -> Result<Vec<Episode>> {
        let mut episodes: Vec<Episode> = self
            .backend
            .list_episodes(project_id)
            .await?
            .into_iter()
            .filter(|e| filter.min_confidence.is_none_or(|min| e.confidence >= min))
            .filter(|e| {
                filter
                    .lesson_contains
                    .as_ref()
                    .is_none_or(|needle| e.lesson.contains(needle.as_str()))
            })
            .filter(|e| {
                filter
                    .situation_contains
                    .as_ref()
                    .is_none_or(|needle| e.situation.contains(needle.as_str()))
            })
            .collect();
        sort_by_confidence_then_recency(&mut episodes);
        if let Some(limit) = filter.limit {
            episodes.truncate(limit);
        }
        Ok(episodes)
    }

    /// Case-insensitive substring search over `lesson`, ordered the same as
    /// [`EpisodicStore::query`].
    pub async fn query_full_text(&self, project_id: &str, query_str: &str) -> Result<Vec<Episode>> {
        let needle = query_str.to_ascii_lowercase();
        let mut episodes: Vec<Episode> = self
            .backend
            .list_episodes(project_id)
            .await?
            .into_iter()
            .filter(|e| e.lesson.to_ascii_lowercase().contains(&needle))
            .collect();
        sort_by_confidence_then_recency(&mut episodes);
        Ok(episodes)
    }

    /// List episodes created since `since` with confidence at or above
    /// `min_confidence`, most recent first.
    pub async fn list_recent(
        &self,
        project_id: &str,
        since: DateTime<Utc>,
        min_confidence: f32,
    ) -> Result<Vec<Episode>> {
        let mut episodes: Vec<Episode> = self
            .backend
            .list_episodes(project_id)
            .await?
            .into_iter()
            .filter(|e| e.created_at >= since && e.confidence >= min_confidence)
            .collect();
        sort_by_confidence_then_recency(&mut episodes);
        Ok(episodes)
    }

    /// Explicitly remove episodes older than `older_than` with confidence at
    /// or below `max_confidence`. The store never auto-evicts; this is the
    /// only path by which episodes disappear outside of an explicit
    /// [`EpisodicStore::delete`].
    pub async fn cleanup(
        &self,
        project_id: &str,
        older_than: DateTime<Utc>,
        max_confidence: f32,
    ) -> Result<usize> {
        self.backend
            .delete_matching(project_id, older_than, max_confidence)
            .await
    }
}

fn sort_by_confidence_then_recency(episodes: &mut [Episode]) {
    episodes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
