//! Error taxonomy for the tri-store memory engine.
//!
//! Mirrors the RPC error codes in the external interface: every variant here
//! maps onto exactly one of `InvalidArgument, InvalidProjectId,
//! InvalidTrigger, ForbiddenContentKind, LowerConfidence, ValidationFailed,
//! NotFound, ConflictingIngest, StoreUnavailable, Timeout, Degraded`.

use uuid::Uuid;

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the tri-store memory engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A request argument failed a structural check (bad enum value, bad shape).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `project_id` failed the `/^[A-Za-z0-9_-]{1,150}$/` regex.
    #[error("Invalid project id: {0}")]
    InvalidProjectId(String),

    /// Semantic retrieval was attempted without one of the four allowed triggers.
    #[error("Invalid retrieval trigger: {0}")]
    InvalidTrigger(String),

    /// Semantic ingestion was attempted for content classified as belonging to
    /// another tier (preference, decision, constraint, agent lesson, chat history).
    #[error("Content kind '{kind}' is not admissible to the semantic store; belongs in the {owning_tier} tier")]
    ForbiddenContentKind {
        /// The rejected `content_type`/`metadata.kind` value.
        kind: String,
        /// The tier that should own this content instead.
        owning_tier: String,
    },

    /// A fact write lost the confidence-based conflict resolution.
    #[error("Incoming confidence {incoming} is not higher than existing confidence {existing} for key '{key}'")]
    LowerConfidence {
        /// The fact key in conflict.
        key: String,
        /// Confidence of the existing active fact.
        existing: f32,
        /// Confidence of the rejected incoming fact.
        incoming: f32,
    },

    /// A value failed a domain validation rule (field length, overlap bound, dimension, etc).
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// No entity exists for the given identifier.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Episode not found, carrying the UUID for structured handling.
    #[error("Episode not found: {0}")]
    EpisodeNotFound(Uuid),

    /// Fact not found, carrying the UUID for structured handling.
    #[error("Fact not found: {0}")]
    FactNotFound(Uuid),

    /// A second ingest for the same `document_id` arrived while the first was in flight.
    #[error("Conflicting ingest already in progress for document {0}")]
    ConflictingIngest(String),

    /// Underlying storage I/O failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The project registry could not be read or written.
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Serialization/deserialization of stored data failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An operation's deadline expired before it completed.
    #[error("Operation timed out")]
    Timeout,

    /// A multi-tier operation completed with one or more tiers degraded.
    #[error("Degraded response: {0:?} unavailable")]
    Degraded(Vec<String>),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Classify whether the caller may usefully retry this error.
    ///
    /// Validation and policy errors are never retried internally and should
    /// not be retried by callers without changing the request. Unavailable
    /// and timeout errors may be retried; the core itself never auto-retries
    /// writes, to avoid hidden duplication.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_)
                | Error::RegistryUnavailable(_)
                | Error::Timeout
                | Error::ConflictingIngest(_)
        )
    }

    /// The RPC error code this error maps to at the dispatcher boundary.
    #[must_use]
    pub fn rpc_kind(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidProjectId(_) => "InvalidProjectId",
            Error::InvalidTrigger(_) => "InvalidTrigger",
            Error::ForbiddenContentKind { .. } => "ForbiddenContentKind",
            Error::LowerConfidence { .. } => "LowerConfidence",
            Error::ValidationFailed(_) => "ValidationFailed",
            Error::NotFound(_) | Error::EpisodeNotFound(_) | Error::FactNotFound(_) => "NotFound",
            Error::ConflictingIngest(_) => "ConflictingIngest",
            Error::StoreUnavailable(_) | Error::RegistryUnavailable(_) => "StoreUnavailable",
            Error::Serialization(_) => "ValidationFailed",
            Error::Timeout => "Timeout",
            Error::Degraded(_) => "Degraded",
        }
    }
}
