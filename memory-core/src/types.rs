//! Shared enums used across the three stores and the orchestrator.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`crate::registry::Project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Project accepts reads and writes.
    Active,
    /// Project is read-only; ingestion and writes are rejected.
    Archived,
    /// Project is logically removed; stores are released.
    Deleted,
}

/// Category of a symbolic [`crate::symbolic::Fact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    /// A stated user or agent preference (e.g. code style).
    Preference,
    /// A hard constraint the agent must respect.
    Constraint,
    /// A recorded decision made during the project.
    Decision,
    /// A plain fact about the project or its environment.
    Fact,
}

/// Origin of a written fact or episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Supplied directly by the human user.
    User,
    /// Derived by the agent during task execution.
    Agent,
    /// Produced by a tool invocation.
    Tool,
}

/// Lifecycle status of a symbolic [`crate::symbolic::Fact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    /// The single current value for its `(project_id, key)`.
    Active,
    /// Lost a confidence-based conflict; retained for audit.
    Superseded,
    /// Explicitly deleted via the `delete` API.
    Deleted,
}

/// Content classification of an ingested [`crate::semantic::Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Prose documentation.
    Doc,
    /// Source code.
    Code,
    /// A free-form note.
    Note,
    /// A longer-form article.
    Article,
    /// A reference/lookup document.
    Reference,
}

impl ContentType {
    /// All content types the Semantic Store is permitted to admit.
    #[must_use]
    pub fn allowed() -> &'static [ContentType] {
        &[
            ContentType::Doc,
            ContentType::Code,
            ContentType::Note,
            ContentType::Article,
            ContentType::Reference,
        ]
    }
}

/// Justification required to invoke semantic retrieval. Retrieval is never
/// automatic: every call must name one of these triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The agent determined it lacks information available only externally.
    ExternalInfoNeeded,
    /// The Symbolic Store did not hold enough to answer.
    SymbolicMemoryInsufficient,
    /// An episodic lesson suggested that retrieval would help.
    EpisodicSuggestsRetrieval,
    /// The caller explicitly asked for retrieval.
    ExplicitRetrievalRequest,
}

impl std::str::FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "external_info_needed" => Ok(Trigger::ExternalInfoNeeded),
            "symbolic_memory_insufficient" => Ok(Trigger::SymbolicMemoryInsufficient),
            "episodic_suggests_retrieval" => Ok(Trigger::EpisodicSuggestsRetrieval),
            "explicit_retrieval_request" => Ok(Trigger::ExplicitRetrievalRequest),
            other => Err(format!("unknown retrieval trigger: {other}")),
        }
    }
}

/// Which section(s) of a [`crate::orchestrator::get_context`] envelope to populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    /// All three tiers.
    #[default]
    All,
    /// Symbolic facts only.
    Symbolic,
    /// Episodic lessons only.
    Episodic,
    /// Semantic chunks only.
    Semantic,
}

/// Which tier(s) a [`crate::orchestrator::search`] call should query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// All three tiers, authority-preserving concatenation.
    #[default]
    All,
    /// Symbolic facts only.
    Symbolic,
    /// Episodic lessons only.
    Episodic,
    /// Semantic chunks only.
    Semantic,
}

/// The authority label attached to every item returned in a composed response.
///
/// This is the fixed ordering that gives the system its value: authoritative
/// facts always outrank advisory lessons, which always outrank
/// non-authoritative retrieved chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Authority {
    /// Symbolic facts: the system's ground truth.
    Authoritative,
    /// Episodic lessons: may inform but never override.
    Advisory,
    /// Semantic chunks: retrieved context, never trusted at face value.
    NonAuthoritative,
}

impl ContentType {
    /// Best-effort detection from a file extension or explicit hint.
    #[must_use]
    pub fn detect(source_path: &str, explicit: Option<ContentType>) -> ContentType {
        if let Some(explicit) = explicit {
            return explicit;
        }
        let lower = source_path.to_ascii_lowercase();
        const CODE_EXTENSIONS: &[&str] = &[
            ".rs", ".py", ".js", ".ts", ".tsx", ".jsx", ".go", ".java", ".c", ".cpp", ".h",
            ".hpp", ".rb", ".sh", ".toml", ".yaml", ".yml", ".json",
        ];
        if CODE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            ContentType::Code
        } else {
            ContentType::Doc
        }
    }
}
