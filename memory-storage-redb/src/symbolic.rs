//! [`memory_core::symbolic::SymbolicStorageBackend`] over the `facts`/`audit` tables.

use async_trait::async_trait;
use uuid::Uuid;

use memory_core::error::Result;
use memory_core::symbolic::{AuditEntry, Fact, SymbolicStorageBackend};
use memory_core::types::FactStatus;

use crate::{RedbBackend, AUDIT_TABLE, FACTS_TABLE};

#[async_trait]
impl SymbolicStorageBackend for RedbBackend {
    async fn get_fact(&self, project_id: &str, id: Uuid) -> Result<Option<Fact>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| {
            let facts: Vec<Fact> = RedbBackend::read_list(&db, FACTS_TABLE, &project_id)?;
            Ok(facts.into_iter().find(|f| f.id == id))
        })
        .await
    }

    async fn get_active_by_key(&self, project_id: &str, key: &str) -> Result<Option<Fact>> {
        let project_id = project_id.to_string();
        let key = key.to_string();
        self.blocking(move |db| {
            let facts: Vec<Fact> = RedbBackend::read_list(&db, FACTS_TABLE, &project_id)?;
            Ok(facts
                .into_iter()
                .find(|f| f.key == key && f.status == FactStatus::Active))
        })
        .await
    }

    async fn list_facts(&self, project_id: &str) -> Result<Vec<Fact>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| RedbBackend::read_list(&db, FACTS_TABLE, &project_id))
            .await
    }

    async fn list_audit(&self, project_id: &str) -> Result<Vec<AuditEntry>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| RedbBackend::read_list(&db, AUDIT_TABLE, &project_id))
            .await
    }

    async fn commit_fact_change(&self, project_id: &str, upserts: &[Fact], audit_entries: &[AuditEntry]) -> Result<()> {
        let project_id = project_id.to_string();
        let upserts = upserts.to_vec();
        let audit_entries = audit_entries.to_vec();
        self.blocking(move |db| {
            let mut facts: Vec<Fact> = RedbBackend::read_list(&db, FACTS_TABLE, &project_id)?;
            for fact in upserts {
                match facts.iter_mut().find(|f| f.id == fact.id) {
                    Some(existing) => *existing = fact,
                    None => facts.push(fact),
                }
            }
            let mut audit: Vec<AuditEntry> = RedbBackend::read_list(&db, AUDIT_TABLE, &project_id)?;
            audit.extend(audit_entries);
            RedbBackend::write_two_lists(&db, FACTS_TABLE, &project_id, &facts, AUDIT_TABLE, &audit)
        })
        .await
    }

    async fn commit_delete(&self, project_id: &str, id: Uuid, audit_entry: &AuditEntry) -> Result<Option<Fact>> {
        let project_id = project_id.to_string();
        let audit_entry = audit_entry.clone();
        self.blocking(move |db| {
            let mut facts: Vec<Fact> = RedbBackend::read_list(&db, FACTS_TABLE, &project_id)?;
            let position = facts.iter().position(|f| f.id == id);
            let Some(idx) = position else {
                return Ok(None);
            };
            let removed = facts.remove(idx);
            let mut audit: Vec<AuditEntry> = RedbBackend::read_list(&db, AUDIT_TABLE, &project_id)?;
            audit.push(audit_entry);
            RedbBackend::write_two_lists(&db, FACTS_TABLE, &project_id, &facts, AUDIT_TABLE, &audit)?;
            Ok(Some(removed))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::types::{FactCategory, Source};

    fn backend() -> std::sync::Arc<RedbBackend> {
        let dir = tempfile::tempdir().unwrap();
        RedbBackend::open(dir.path().join("memory.redb")).unwrap()
    }

    fn insert_entry(fact: &Fact) -> AuditEntry {
        AuditEntry {
            fact_id: fact.id,
            project_id: fact.project_id.clone(),
            operation: memory_core::symbolic::AuditOperation::Insert,
            old_value: None,
            new_value: Some(fact.value.clone()),
            actor: fact.source,
            timestamp: fact.created_at,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let backend = backend();
        let fact = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "db.engine",
            serde_json::json!("postgres"),
            0.9,
            Source::User,
        );
        let entry = insert_entry(&fact);
        backend
            .commit_fact_change("alpha-aaaaaaaa", &[fact.clone()], &[entry])
            .await
            .unwrap();
        let fetched = backend.get_fact("alpha-aaaaaaaa", fact.id).await.unwrap();
        assert_eq!(fetched.unwrap().key, "db.engine");
    }

    #[tokio::test]
    async fn delete_removes_and_returns_the_fact() {
        let backend = backend();
        let fact = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "temp.key",
            serde_json::json!(1),
            0.5,
            Source::Agent,
        );
        let entry = insert_entry(&fact);
        backend
            .commit_fact_change("alpha-aaaaaaaa", &[fact.clone()], &[entry])
            .await
            .unwrap();

        let delete_entry = AuditEntry {
            fact_id: fact.id,
            project_id: fact.project_id.clone(),
            operation: memory_core::symbolic::AuditOperation::Delete,
            old_value: Some(fact.value.clone()),
            new_value: None,
            actor: fact.source,
            timestamp: fact.created_at,
        };
        let removed = backend
            .commit_delete("alpha-aaaaaaaa", fact.id, &delete_entry)
            .await
            .unwrap();
        assert!(removed.is_some());
        assert!(backend.get_fact("alpha-aaaaaaaa", fact.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_fact_change_persists_fact_and_audit_entry_together() {
        let backend = backend();
        let fact = Fact::new(
            "alpha-aaaaaaaa",
            FactCategory::Fact,
            "k",
            serde_json::json!(1),
            0.5,
            Source::Agent,
        );
        let entry = insert_entry(&fact);
        backend
            .commit_fact_change("alpha-aaaaaaaa", &[fact.clone()], &[entry])
            .await
            .unwrap();

        let facts = backend.list_facts("alpha-aaaaaaaa").await.unwrap();
        let entries = backend.list_audit("alpha-aaaaaaaa").await.unwrap();
        assert_eq!(facts.len(), 1, "fact must be visible whenever its audit entry is");
        assert_eq!(entries.len(), 1, "audit entry must be visible whenever its fact is");
    }
}
