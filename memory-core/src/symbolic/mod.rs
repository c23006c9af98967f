//! Symbolic Store: authoritative key/value facts with confidence-based
//! conflict resolution and an append-only audit log.

mod validate;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{FactCategory, FactStatus, Source};

pub use validate::validate_fact_fields;

/// An authoritative symbolic fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning project.
    pub project_id: String,
    /// Fact category.
    pub category: FactCategory,
    /// Fact key, unique per `(project_id, key)` among active facts.
    pub key: String,
    /// Opaque JSON value.
    pub value: serde_json::Value,
    /// Confidence in `[0, 1]`, the primary conflict-resolution key.
    pub confidence: f32,
    /// Where this fact came from.
    pub source: Source,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: FactStatus,
}

impl Fact {
    /// Construct a fresh active fact, stamping both timestamps to now.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        category: FactCategory,
        key: impl Into<String>,
        value: serde_json::Value,
        confidence: f32,
        source: Source,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            category,
            key: key.into(),
            value,
            confidence,
            source,
            created_at: now,
            updated_at: now,
            status: FactStatus::Active,
        }
    }
}

/// Operation recorded in the symbolic audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// A brand new fact was inserted.
    Insert,
    /// An existing fact's fields changed (including a supersede).
    Update,
    /// A fact was hard-deleted.
    Delete,
}

/// A single append-only audit record. Never modified after being written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The fact this entry concerns.
    pub fact_id: Uuid,
    /// Owning project (denormalized for fast audit queries).
    pub project_id: String,
    /// What happened.
    pub operation: AuditOperation,
    /// Value before the operation, if any.
    pub old_value: Option<serde_json::Value>,
    /// Value after the operation, if any.
    pub new_value: Option<serde_json::Value>,
    /// Who/what performed the operation.
    pub actor: Source,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

/// Filters accepted by [`SymbolicStore::query`].
#[derive(Debug, Clone, Default)]
pub struct FactFilter {
    /// Restrict to a single category.
    pub category: Option<FactCategory>,
    /// Restrict to keys starting with this prefix.
    pub key_prefix: Option<String>,
    /// Restrict to a single status (defaults to active-only when `None` is
    /// passed to [`SymbolicStore::query`] via `status: Some(FactStatus::Active)`
    /// by the caller; the store does not assume a default here).
    pub status: Option<FactStatus>,
    /// Restrict to a single source.
    pub source: Option<Source>,
}

/// Durable backend a [`SymbolicStore`] persists to. Implemented by
/// `memory-storage-redb`.
///
/// Every write method that touches the facts table also appends the audit
/// entries recording it, in the same call, so a backend can commit both as
/// one atomic transaction: a crash can never leave a fact change with no
/// matching audit entry, or an active fact with a stale supersede pending.
#[async_trait]
pub trait SymbolicStorageBackend: Send + Sync {
    /// Fetch a fact by id.
    async fn get_fact(&self, project_id: &str, id: Uuid) -> Result<Option<Fact>>;
    /// Fetch the currently-active fact for a key, if any.
    async fn get_active_by_key(&self, project_id: &str, key: &str) -> Result<Option<Fact>>;
    /// List every fact in a project (any status).
    async fn list_facts(&self, project_id: &str) -> Result<Vec<Fact>>;
    /// List all audit entries for a project, oldest first.
    async fn list_audit(&self, project_id: &str) -> Result<Vec<AuditEntry>>;
    /// Atomically insert or overwrite one or more fact rows (by id) and
    /// append their audit entries, as a single transaction.
    async fn commit_fact_change(&self, project_id: &str, upserts: &[Fact], audit_entries: &[AuditEntry]) -> Result<()>;
    /// Atomically hard-delete a fact row and append its audit entry,
    /// returning the fact if it existed.
    async fn commit_delete(&self, project_id: &str, id: Uuid, audit_entry: &AuditEntry) -> Result<Option<Fact>>;
}

/// Business logic for the Symbolic Store, generic over its durable backend.
pub struct SymbolicStore<B: SymbolicStorageBackend> {
    backend: Arc<B>,
}

impl<B: SymbolicStorageBackend> SymbolicStore<B> {
    /// Wrap a storage backend with symbolic-store semantics.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Validate and upsert a fact by `(project_id, key)`, resolving any
    /// conflict with an existing active fact per the confidence rules in
    /// the external spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationFailed`] if the fact fails field
    /// validation, or [`Error::LowerConfidence`] if an existing active fact
    /// for the same key outranks it.
    pub async fn store(&self, mut fact: Fact) -> Result<Fact> {
        validate_fact_fields(&fact)?;

        let existing = self.backend.get_active_by_key(&fact.project_id, &fact.key).await?;

        let Some(mut existing) = existing else {
            fact.status = FactStatus::Active;
            let entry = Self::audit_entry(&fact, AuditOperation::Insert, None, Some(fact.value.clone()));
            self.backend
                .commit_fact_change(&fact.project_id, std::slice::from_ref(&fact), std::slice::from_ref(&entry))
                .await?;
            info!(project_id = %fact.project_id, key = %fact.key, "inserted new active fact");
            return Ok(fact);
        };

        if fact.confidence > existing.confidence {
            existing.status = FactStatus::Superseded;
            existing.updated_at = Utc::now();
            let superseded_entry = Self::audit_entry(
                &existing,
                AuditOperation::Update,
                Some(existing.value.clone()),
                None,
            );

            fact.status = FactStatus::Active;
            let inserted_entry =
                Self::audit_entry(&fact, AuditOperation::Insert, None, Some(fact.value.clone()));

            self.backend
                .commit_fact_change(
                    &fact.project_id,
                    &[existing, fact.clone()],
                    &[superseded_entry, inserted_entry],
                )
                .await?;
            debug!(key = %fact.key, "higher-confidence fact superseded previous active fact");
            return Ok(fact);
        }

        if (fact.confidence - existing.confidence).abs() < f32::EPSILON {
            // Equal confidence: the more recent updated_at wins; tie favors incoming.
            if fact.updated_at >= existing.updated_at {
                existing.status = FactStatus::Superseded;
                existing.updated_at = Utc::now();
                let superseded_entry = Self::audit_entry(
                    &existing,
                    AuditOperation::Update,
                    Some(existing.value.clone()),
                    None,
                );

                fact.status = FactStatus::Active;
                let inserted_entry =
                    Self::audit_entry(&fact, AuditOperation::Insert, None, Some(fact.value.clone()));

                self.backend
                    .commit_fact_change(
                        &fact.project_id,
                        &[existing, fact.clone()],
                        &[superseded_entry, inserted_entry],
                    )
                    .await?;
                return Ok(fact);
            }
        }

        Err(Error::LowerConfidence {
            key: fact.key.clone(),
            existing: existing.confidence,
            incoming: fact.confidence,
        })
    }

    /// Update arbitrary fields of an existing fact in place (does not go
    /// through conflict resolution; used for direct corrections).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FactNotFound`] if `id` is unknown.
    pub async fn update(
        &self,
        project_id: &str,
        id: Uuid,
        value: Option<serde_json::Value>,
        confidence: Option<f32>,
    ) -> Result<Fact> {
        let mut fact = self
            .backend
            .get_fact(project_id, id)
            .await?
            .ok_or(Error::FactNotFound(id))?;
        let old_value = fact.value.clone();
        if let Some(value) = value {
            fact.value = value;
        }
        if let Some(confidence) = confidence {
            fact.confidence = confidence;
        }
        fact.updated_at = Utc::now();
        validate_fact_fields(&fact)?;
        let entry = Self::audit_entry(
            &fact,
            AuditOperation::Update,
            Some(old_value),
            Some(fact.value.clone()),
        );
        self.backend
            .commit_fact_change(project_id, std::slice::from_ref(&fact), std::slice::from_ref(&entry))
            .await?;
        Ok(fact)
    }

    /// Hard-delete a fact, recording the deletion in the audit log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FactNotFound`] if `id` is unknown.
    pub async fn delete(&self, project_id: &str, id: Uuid) -> Result<()> {
        let fact = self.backend.get_fact(project_id, id).await?.ok_or(Error::FactNotFound(id))?;
        let entry = Self::audit_entry(&fact, AuditOperation::Delete, Some(fact.value.clone()), None);
        self.backend
            .commit_delete(project_id, id, &entry)
            .await?
            .ok_or(Error::FactNotFound(id))?;
        Ok(())
    }

    /// Fetch a single fact by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FactNotFound`] if `id` is unknown.
    pub async fn get(&self, project_id: &str, id: Uuid) -> Result<Fact> {
        self.backend
            .get_fact(project_id, id)
            .await?
            .ok_or(Error::FactNotFound(id))
    }

    /// List every fact in a project, ordered `confidence DESC, updated_at DESC`.
    pub async fn list(&self, project_id: &str) -> Result<Vec<Fact>> {
        let mut facts = self.backend.list_facts(project_id).await?;
        sort_by_confidence_then_recency(&mut facts);
        Ok(facts)
    }

    /// Query facts by filter, ordered `confidence DESC, updated_at DESC`.
    pub async fn query(&self, project_id: &str, filter: &FactFilter) -> Result<Vec<Fact>> {
        let mut facts: Vec<Fact> = self
            .backend
            .list_facts(project_id)
            .await?
            .into_iter()
            .filter(|f| filter.category.is_none_or(|c| c == f.category))
            .filter(|f| filter.status.is_none_or(|s| s == f.status))
            .filter(|f| filter.source.is_none_or(|s| s == f.source))
            .filter(|f| {
                filter
                    .key_prefix
                    .as_ref()
                    .is_none_or(|prefix| f.key.starts_with(prefix.as_str()))
            })
            .collect();
        sort_by_confidence_then_recency(&mut facts);
        Ok(facts)
    }

    /// Case-insensitive substring search over `key` and the JSON-serialized
    /// `value`, ordered the same as [`SymbolicStore::query`].
    pub async fn query_full_text(&self, project_id: &str, query_str: &str) -> Result<Vec<Fact>> {
        let needle = query_str.to_ascii_lowercase();
        let mut facts: Vec<Fact> = self
            .backend
            .list_facts(project_id)
            .await?
            .into_iter()
            .filter(|f| {
                let value_str = f.value.to_string().to_ascii_lowercase();
                f.key.to_ascii_lowercase().contains(&needle) || value_str.contains(&needle)
            })
            .collect();
        sort_by_confidence_then_recency(&mut facts);
        Ok(facts)
    }

    fn audit_entry(
        fact: &Fact,
        operation: AuditOperation,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> AuditEntry {
        AuditEntry {
            fact_id: fact.id,
            project_id: fact.project_id.clone(),
            operation,
            old_value,
            new_value,
            actor: fact.source,
            timestamp: Utc::now(),
        }
    }
}

fn sort_by_confidence_then_recency(facts: &mut [Fact]) {
    facts.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct InMemoryBackend {
        facts: AsyncMutex<HashMap<Uuid, Fact>>,
        audit: AsyncMutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl SymbolicStorageBackend for InMemoryBackend {
        async fn get_fact(&self, project_id: &str, id: Uuid) -> Result<Option<Fact>> {
            Ok(self
                .facts
                .lock()
                .await
                .get(&id)
                .filter(|f| f.project_id == project_id)
                .cloned())
        }
        async fn get_active_by_key(&self, project_id: &str, key: &str) -> Result<Option<Fact>> {
            Ok(self
                .facts
                .lock()
                .await
                .values()
                .find(|f| {
                    f.project_id == project_id && f.key == key && f.status == FactStatus::Active
                })
                .cloned())
        }
        async fn list_facts(&self, project_id: &str) -> Result<Vec<Fact>> {
            Ok(self
                .facts
                .lock()
                .await
                .values()
                .filter(|f| f.project_id == project_id)
                .cloned()
                .collect())
        }
        async fn commit_fact_change(
            &self,
            _project_id: &str,
            upserts: &[Fact],
            audit_entries: &[AuditEntry],
        ) -> Result<()> {
            let mut facts = self.facts.lock().await;
            for fact in upserts {
                facts.insert(fact.id, fact.clone());
            }
            drop(facts);
            self.audit.lock().await.extend(audit_entries.iter().cloned());
            Ok(())
        }
        async fn commit_delete(
            &self,
            project_id: &str,
            id: Uuid,
            audit_entry: &AuditEntry,
        ) -> Result<Option<Fact>> {
            let mut guard = self.facts.lock().await;
            if guard.get(&id).is_some_and(|f| f.project_id == project_id) {
                let removed = guard.remove(&id);
                drop(guard);
                self.audit.lock().await.push(audit_entry.clone());
                return Ok(removed);
            }
            Ok(None)
        }
        async fn list_audit(&self, project_id: &str) -> Result<Vec<AuditEntry>> {
            Ok(self
                .audit
                .lock()
                .await
                .iter()
                .filter(|e| e.project_id == project_id)
                .cloned()
                .collect())
        }
    }

    fn store() -> SymbolicStore<InMemoryBackend> {
        SymbolicStore::new(Arc::new(InMemoryBackend::default()))
    }

    #[tokio::test]
    async fn higher_confidence_supersedes_lower() {
        let store = store();
        let f1 = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "db.engine",
            serde_json::json!("postgres"),
            0.95,
            Source::User,
        );
        store.store(f1.clone()).await.unwrap();

        let f2 = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "db.engine",
            serde_json::json!("mysql"),
            0.80,
            Source::Agent,
        );
        let err = store.store(f2).await.unwrap_err();
        assert!(matches!(err, Error::LowerConfidence { .. }));

        let active = store
            .query(
                "alpha-aaaaaaaa",
                &FactFilter {
                    status: Some(FactStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].value, serde_json::json!("postgres"));
    }

    #[tokio::test]
    async fn higher_confidence_incoming_wins_and_supersedes() {
        let store = store();
        let f1 = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "db.engine",
            serde_json::json!("mysql"),
            0.5,
            Source::Agent,
        );
        store.store(f1).await.unwrap();

        let f2 = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "db.engine",
            serde_json::json!("postgres"),
            0.95,
            Source::User,
        );
        store.store(f2).await.unwrap();

        let all = store.list("alpha-aaaaaaaa").await.unwrap();
        let active: Vec<_> = all.iter().filter(|f| f.status == FactStatus::Active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].value, serde_json::json!("postgres"));
        let superseded: Vec<_> = all
            .iter()
            .filter(|f| f.status == FactStatus::Superseded)
            .collect();
        assert_eq!(superseded.len(), 1);
    }

    #[tokio::test]
    async fn at_most_one_active_fact_per_key() {
        let store = store();
        for i in 0..5 {
            let fact = Fact::new(
                "alpha-aaaaaaaa",
                FactCategory::Fact,
                "retries.max",
                serde_json::json!(i),
                0.5 + i as f32 * 0.1,
                Source::Agent,
            );
            let _ = store.store(fact).await;
        }
        let active = store
            .query(
                "alpha-aaaaaaaa",
                &FactFilter {
                    status: Some(FactStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn round_trip_store_then_get() {
        let store = store();
        let fact = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Preference,
            "editor.tabsize",
            serde_json::json!(4),
            0.9,
            Source::User,
        );
        let stored = store.store(fact.clone()).await.unwrap();
        let fetched = store.get("alpha-aaaaaaaa", stored.id).await.unwrap();
        assert_eq!(fetched.key, fact.key);
        assert_eq!(fetched.value, fact.value);
        assert_eq!(fetched.confidence, fact.confidence);
        assert_eq!(fetched.category, fact.category);
    }

    #[tokio::test]
    async fn full_text_search_is_case_insensitive_over_key_and_value() {
        let store = store();
        store
            .store(Fact::new(
                "alpha-aaaaaaaa",
                FactCategory::Fact,
                "db.engine",
                serde_json::json!("PostgreSQL"),
                0.9,
                Source::User,
            ))
            .await
            .unwrap();
        let hits = store.query_full_text("alpha-aaaaaaaa", "postgres").await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits_by_key = store.query_full_text("alpha-aaaaaaaa", "DB.ENGINE").await.unwrap();
        assert_eq!(hits_by_key.len(), 1);
    }

    #[tokio::test]
    async fn key_length_boundaries_are_enforced() {
        let store = store();
        let too_long_key = "a".repeat(257);
        let fact = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            too_long_key,
            serde_json::json!(1),
            0.5,
            Source::Agent,
        );
        assert!(store.store(fact).await.is_err());

        let empty_key_fact = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "",
            serde_json::json!(1),
            0.5,
            Source::Agent,
        );
        assert!(store.store(empty_key_fact).await.is_err());
    }

    #[tokio::test]
    async fn delete_is_hard_and_audited() {
        let store = store();
        let fact = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "temp.key",
            serde_json::json!(1),
            0.5,
            Source::Agent,
        );
        let stored = store.store(fact).await.unwrap();
        store.delete("alpha-aaaaaaaa", stored.id).await.unwrap();
        assert!(store.get("alpha-aaaaaaaa", stored.id).await.is_err());
    }
}
