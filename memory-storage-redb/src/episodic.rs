//! [`memory_core::episodic::EpisodicStorageBackend`] over the `episodes` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use memory_core::episodic::{Episode, EpisodicStorageBackend};
use memory_core::error::Result;

use crate::{RedbBackend, EPISODES_TABLE};

#[async_trait]
impl EpisodicStorageBackend for RedbBackend {
    async fn insert_episode(&self, episode: &Episode) -> Result<()> {
        let project_id = episode.project_id.clone();
        let episode = episode.clone();
        self.blocking(move |db| {
            let mut episodes: Vec<Episode> = RedbBackend::read_list(&db, EPISODES_TABLE, &project_id)?;
            episodes.push(episode);
            RedbBackend::write_list(&db, EPISODES_TABLE, &project_id, &episodes)
        })
        .await
    }

    async fn get_episode(&self, project_id: &str, id: Uuid) -> Result<Option<Episode>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| {
            let episodes: Vec<Episode> = RedbBackend::read_list(&db, EPISODES_TABLE, &project_id)?;
            Ok(episodes.into_iter().find(|e| e.id == id))
        })
        .await
    }

    async fn delete_episode(&self, project_id: &str, id: Uuid) -> Result<Option<Episode>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| {
            let mut episodes: Vec<Episode> = RedbBackend::read_list(&db, EPISODES_TABLE, &project_id)?;
            let position = episodes.iter().position(|e| e.id == id);
            let removed = position.map(|idx| episodes.remove(idx));
            if removed.is_some() {
                RedbBackend::write_list(&db, EPISODES_TABLE, &project_id, &episodes)?;
            }
            Ok(removed)
        })
        .await
    }

    async fn list_episodes(&self, project_id: &str) -> Result<Vec<Episode>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| RedbBackend::read_list(&db, EPISODES_TABLE, &project_id))
            .await
    }

    async fn delete_matching(
        &self,
        project_id: &str,
        older_than: DateTime<Utc>,
        max_confidence: f32,
    ) -> Result<usize> {
        let project_id = project_id.to_string();
        self.blocking(move |db| {
            let episodes: Vec<Episode> = RedbBackend::read_list(&db, EPISODES_TABLE, &project_id)?;
            let (to_keep, to_remove): (Vec<Episode>, Vec<Episode>) = episodes
                .into_iter()
                .partition(|e| !(e.created_at < older_than && e.confidence <= max_confidence));
            let removed = to_remove.len();
            if removed > 0 {
                RedbBackend::write_list(&db, EPISODES_TABLE, &project_id, &to_keep)?;
            }
            Ok(removed)
        })
        .await
    }
}
