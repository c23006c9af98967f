//! Thin JSON-RPC dispatcher exposing the tri-store memory engine as an MCP
//! server. All domain logic lives in `memory-core`; this crate only frames
//! requests, routes them, and shapes the `{ok, result?, error?,
//! degraded_tiers?}` envelope spec.md §6 describes.

pub mod dispatcher;
pub mod error;
pub mod framing;
pub mod jsonrpc;

pub use dispatcher::Dispatcher;
pub use jsonrpc::{JsonRpcRequest, JsonRpcResponse};
