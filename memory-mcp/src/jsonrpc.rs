//! JSON-RPC-shaped request/response envelopes for the MCP surface.
//!
//! The wire transport itself (stdio framing, HTTP, whatever front-ends this
//! process) is out of scope; this module only defines the envelope shape
//! spec.md §6 describes: `{ok, result?, error?, degraded_tiers?}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

/// One inbound call: a method name plus its JSON parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// One of the seven Context Orchestrator operation names, e.g.
    /// `"get_context"`, `"add_fact"`, `"ingest_file"`.
    pub method: String,
    /// Method-specific parameters, shaped per spec.md §4.5.
    #[serde(default)]
    pub params: Value,
    /// Opaque id echoed back so callers can correlate responses.
    #[serde(default)]
    pub id: Option<Value>,
}

/// The envelope every dispatched call returns.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Present when `ok` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
    /// Tier names that were unavailable but did not fail the whole call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_tiers: Option<Vec<String>>,
    /// Echoes [`JsonRpcRequest::id`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    /// Build a successful envelope from a serializable result.
    pub fn ok(result: impl Serialize, id: Option<Value>) -> Self {
        Self {
            ok: true,
            result: serde_json::to_value(result).ok(),
            error: None,
            degraded_tiers: None,
            id,
        }
    }

    /// Build a successful envelope carrying degraded-tier names alongside the result.
    pub fn ok_with_degraded(
        result: impl Serialize,
        degraded_tiers: Vec<String>,
        id: Option<Value>,
    ) -> Self {
        Self {
            ok: true,
            result: serde_json::to_value(result).ok(),
            error: None,
            degraded_tiers: if degraded_tiers.is_empty() {
                None
            } else {
                Some(degraded_tiers)
            },
            id,
        }
    }

    /// Build a failed envelope from a core error.
    pub fn err(error: memory_core::Error, id: Option<Value>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
            degraded_tiers: None,
            id,
        }
    }
}
