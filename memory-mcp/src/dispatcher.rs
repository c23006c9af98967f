//! Routes JSON-RPC method names onto the Context Orchestrator's operations
//! (the seven primary operations plus the explicit `backfill_embeddings`
//! maintenance operation) and wraps every result in a [`JsonRpcResponse`]
//! envelope.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use memory_core::orchestrator::{Engine, GetContextRequest, SearchRequest};
use memory_core::types::{ContentType, ContextType, FactCategory, MemoryType, ProjectStatus, Source};
use memory_core::{episodic::EpisodicStorageBackend, semantic::SemanticStorageBackend, symbolic::SymbolicStorageBackend};
use memory_core::Error;

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Dispatches [`JsonRpcRequest`]s to an [`Engine`] over any backend
/// implementing all three storage traits.
pub struct Dispatcher<B>
where
    B: SymbolicStorageBackend + EpisodicStorageBackend + SemanticStorageBackend + 'static,
{
    engine: Engine<B>,
}

#[derive(Debug, Deserialize)]
struct ListProjectsParams {
    #[serde(default)]
    status_filter: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize)]
struct ListSourcesParams {
    project_id: String,
    #[serde(default)]
    content_type: Option<ContentType>,
}

#[derive(Debug, Deserialize)]
struct GetContextParams {
    project_id: String,
    #[serde(default)]
    context_type: ContextType,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    trigger: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    project_id: String,
    query: String,
    #[serde(default)]
    memory_type: MemoryType,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IngestFileParams {
    project_id: String,
    path: String,
    content: String,
    #[serde(default)]
    content_type: Option<ContentType>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct BackfillEmbeddingsParams {
    project_id: String,
}

#[derive(Debug, Deserialize)]
struct AddFactParams {
    project_id: String,
    key: String,
    value: Value,
    confidence: f32,
    category: FactCategory,
    source: Source,
}

#[derive(Debug, Deserialize)]
struct AddEpisodeParams {
    project_id: String,
    situation: String,
    action: String,
    outcome: String,
    lesson: String,
    confidence: f32,
}

fn bad_params(method: &str, err: serde_json::Error) -> Error {
    Error::InvalidArgument(format!("{method}: malformed params: {err}"))
}

impl<B> Dispatcher<B>
where
    B: SymbolicStorageBackend + EpisodicStorageBackend + SemanticStorageBackend + 'static,
{
    /// Wrap an already-constructed engine.
    pub fn new(engine: Engine<B>) -> Self {
        Self { engine }
    }

    /// Dispatch one request, never panicking: every error path is converted
    /// into a failed [`JsonRpcResponse`] rather than propagated.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => JsonRpcResponse::err(err, id),
        }
    }

    async fn dispatch(&self, request: &JsonRpcRequest) -> memory_core::Result<JsonRpcResponse> {
        let id = request.id.clone();
        match request.method.as_str() {
            "list_projects" => {
                let params: ListProjectsParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("list_projects", e))?;
                let result = self.engine.list_projects(params.status_filter).await?;
                Ok(JsonRpcResponse::ok(result, id))
            }
            "list_sources" => {
                let params: ListSourcesParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("list_sources", e))?;
                let result = self
                    .engine
                    .list_sources(&params.project_id, params.content_type)
                    .await?;
                Ok(JsonRpcResponse::ok(result, id))
            }
            "get_context" => {
                let params: GetContextParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("get_context", e))?;
                let max_results = params.max_results.unwrap_or(self.engine.config().top_k);
                let envelope = self
                    .engine
                    .get_context(
                        &params.project_id,
                        GetContextRequest {
                            context_type: params.context_type,
                            query: params.query,
                            trigger: params.trigger,
                            max_results,
                        },
                    )
                    .await?;
                let degraded = envelope.degraded_tiers.clone();
                Ok(JsonRpcResponse::ok_with_degraded(envelope, degraded, id))
            }
            "search" => {
                let params: SearchParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("search", e))?;
                let top_k = params.top_k.unwrap_or(self.engine.config().top_k);
                let result = self
                    .engine
                    .search(
                        &params.project_id,
                        SearchRequest {
                            query: params.query,
                            memory_type: params.memory_type,
                            top_k,
                            trigger: params.trigger,
                        },
                    )
                    .await?;
                Ok(JsonRpcResponse::ok(result, id))
            }
            "ingest_file" => {
                let params: IngestFileParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("ingest_file", e))?;
                let result = self
                    .engine
                    .ingest_file(
                        &params.project_id,
                        &params.path,
                        &params.content,
                        params.content_type,
                        params.metadata,
                    )
                    .await?;
                Ok(JsonRpcResponse::ok(result, id))
            }
            "backfill_embeddings" => {
                let params: BackfillEmbeddingsParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("backfill_embeddings", e))?;
                let result = self.engine.backfill_embeddings(&params.project_id).await?;
                Ok(JsonRpcResponse::ok(result, id))
            }
            "add_fact" => {
                let params: AddFactParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("add_fact", e))?;
                let result = self
                    .engine
                    .add_fact(
                        &params.project_id,
                        &params.key,
                        params.value,
                        params.confidence,
                        params.category,
                        params.source,
                    )
                    .await?;
                Ok(JsonRpcResponse::ok(result, id))
            }
            "add_episode" => {
                let params: AddEpisodeParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| bad_params("add_episode", e))?;
                let result = self
                    .engine
                    .add_episode(
                        &params.project_id,
                        &params.situation,
                        &params.action,
                        &params.outcome,
                        &params.lesson,
                        params.confidence,
                    )
                    .await?;
                Ok(JsonRpcResponse::ok(result, id))
            }
            other => Err(Error::InvalidArgument(format!("unknown method '{other}'"))),
        }
    }
}
