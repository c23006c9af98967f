//! [`memory_core::semantic::SemanticStorageBackend`] over the
//! `documents`/`chunks` tables.

use async_trait::async_trait;

use memory_core::error::Result;
use memory_core::semantic::{Chunk, Document, SemanticStorageBackend};

use crate::{RedbBackend, CHUNKS_TABLE, DOCUMENTS_TABLE};

#[async_trait]
impl SemanticStorageBackend for RedbBackend {
    async fn upsert_document(&self, document: &Document) -> Result<()> {
        let project_id = document.project_id.clone();
        let document = document.clone();
        self.blocking(move |db| {
            let mut documents: Vec<Document> =
                RedbBackend::read_list(&db, DOCUMENTS_TABLE, &project_id)?;
            match documents
                .iter_mut()
                .find(|d| d.document_id == document.document_id)
            {
                Some(existing) => *existing = document,
                None => documents.push(document),
            }
            RedbBackend::write_list(&db, DOCUMENTS_TABLE, &project_id, &documents)
        })
        .await
    }

    async fn get_document(&self, project_id: &str, document_id: &str) -> Result<Option<Document>> {
        let project_id = project_id.to_string();
        let document_id = document_id.to_string();
        self.blocking(move |db| {
            let documents: Vec<Document> = RedbBackend::read_list(&db, DOCUMENTS_TABLE, &project_id)?;
            Ok(documents.into_iter().find(|d| d.document_id == document_id))
        })
        .await
    }

    async fn list_documents(&self, project_id: &str) -> Result<Vec<Document>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| RedbBackend::read_list(&db, DOCUMENTS_TABLE, &project_id))
            .await
    }

    async fn replace_chunks(
        &self,
        project_id: &str,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let project_id = project_id.to_string();
        let document_id = document_id.to_string();
        let chunks = chunks.to_vec();
        self.blocking(move |db| {
            let mut all_chunks: Vec<Chunk> = RedbBackend::read_list(&db, CHUNKS_TABLE, &project_id)?;
            all_chunks.retain(|c| c.document_id != document_id);
            all_chunks.extend(chunks);
            RedbBackend::write_list(&db, CHUNKS_TABLE, &project_id, &all_chunks)
        })
        .await
    }

    async fn update_chunk(&self, chunk: &Chunk) -> Result<()> {
        let project_id = chunk.project_id.clone();
        let chunk = chunk.clone();
        self.blocking(move |db| {
            let mut all_chunks: Vec<Chunk> = RedbBackend::read_list(&db, CHUNKS_TABLE, &project_id)?;
            if let Some(existing) = all_chunks.iter_mut().find(|c| c.chunk_id == chunk.chunk_id) {
                *existing = chunk;
            }
            RedbBackend::write_list(&db, CHUNKS_TABLE, &project_id, &all_chunks)
        })
        .await
    }

    async fn list_chunks(&self, project_id: &str) -> Result<Vec<Chunk>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| RedbBackend::read_list(&db, CHUNKS_TABLE, &project_id))
            .await
    }

    async fn delete_document(&self, project_id: &str, document_id: &str) -> Result<bool> {
        let project_id = project_id.to_string();
        let document_id = document_id.to_string();
        self.blocking(move |db| {
            let mut documents: Vec<Document> =
                RedbBackend::read_list(&db, DOCUMENTS_TABLE, &project_id)?;
            let existed = documents.iter().any(|d| d.document_id == document_id);
            if !existed {
                return Ok(false);
            }
            documents.retain(|d| d.document_id != document_id);
            RedbBackend::write_list(&db, DOCUMENTS_TABLE, &project_id, &documents)?;

            let mut chunks: Vec<Chunk> = RedbBackend::read_list(&db, CHUNKS_TABLE, &project_id)?;
            chunks.retain(|c| c.document_id != document_id);
            RedbBackend::write_list(&db, CHUNKS_TABLE, &project_id, &chunks)?;

            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn backend() -> std::sync::Arc<RedbBackend> {
        let dir = tempfile::tempdir().unwrap();
        RedbBackend::open(dir.path().join("memory.redb")).unwrap()
    }

    fn doc() -> Document {
        Document {
            document_id: "doc_aaaa".to_string(),
            project_id: "alpha-aaaaaaaa".to_string(),
            source_path: "README.md".to_string(),
            content_type: memory_core::types::ContentType::Doc,
            ingested_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let backend = backend();
        let document = doc();
        backend.upsert_document(&document).await.unwrap();
        let fetched = backend
            .get_document("alpha-aaaaaaaa", "doc_aaaa")
            .await
            .unwrap();
        assert_eq!(fetched.unwrap().source_path, "README.md");
    }

    #[tokio::test]
    async fn replace_chunks_drops_prior_chunks_for_the_same_document() {
        let backend = backend();
        let document = doc();
        backend.upsert_document(&document).await.unwrap();
        let chunk_v1 = Chunk {
            chunk_id: "chunk_1".to_string(),
            document_id: document.document_id.clone(),
            project_id: document.project_id.clone(),
            chunk_index: 0,
            content: "v1".to_string(),
            embedding: None,
            metadata: HashMap::new(),
        };
        backend
            .replace_chunks("alpha-aaaaaaaa", &document.document_id, &[chunk_v1])
            .await
            .unwrap();
        let chunk_v2 = Chunk {
            chunk_id: "chunk_2".to_string(),
            document_id: document.document_id.clone(),
            project_id: document.project_id.clone(),
            chunk_index: 0,
            content: "v2".to_string(),
            embedding: None,
            metadata: HashMap::new(),
        };
        backend
            .replace_chunks("alpha-aaaaaaaa", &document.document_id, &[chunk_v2])
            .await
            .unwrap();
        let chunks = backend.list_chunks("alpha-aaaaaaaa").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "v2");
    }

    #[tokio::test]
    async fn delete_document_removes_document_and_its_chunks() {
        let backend = backend();
        let document = doc();
        backend.upsert_document(&document).await.unwrap();
        let chunk = Chunk {
            chunk_id: "chunk_1".to_string(),
            document_id: document.document_id.clone(),
            project_id: document.project_id.clone(),
            chunk_index: 0,
            content: "content".to_string(),
            embedding: None,
            metadata: HashMap::new(),
        };
        backend
            .replace_chunks("alpha-aaaaaaaa", &document.document_id, &[chunk])
            .await
            .unwrap();
        let existed = backend
            .delete_document("alpha-aaaaaaaa", &document.document_id)
            .await
            .unwrap();
        assert!(existed);
        assert!(backend
            .get_document("alpha-aaaaaaaa", &document.document_id)
            .await
            .unwrap()
            .is_none());
        assert!(backend.list_chunks("alpha-aaaaaaaa").await.unwrap().is_empty());
    }
}
