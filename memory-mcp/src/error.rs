//! Mapping from [`memory_core::Error`] onto the RPC error envelope.

use serde::Serialize;

/// The `error` field of a [`crate::jsonrpc::JsonRpcResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    /// One of the taxonomy codes in spec.md's RPC error table, e.g.
    /// `"InvalidTrigger"`, `"LowerConfidence"`, `"StoreUnavailable"`.
    pub kind: &'static str,
    /// Human-readable detail, safe to show to a calling agent.
    pub message: String,
}

impl From<memory_core::Error> for McpError {
    fn from(err: memory_core::Error) -> Self {
        Self {
            kind: err.rpc_kind(),
            message: err.to_string(),
        }
    }
}
