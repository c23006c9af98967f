//! Core data model, validation, and business logic for the tri-store agent
//! memory engine: authoritative Symbolic facts, advisory Episodic lessons,
//! and non-authoritative Semantic document chunks, fronted by a stateless
//! Context Orchestrator and a Project Registry.
//!
//! This crate is storage-backend-agnostic: [`symbolic::SymbolicStorageBackend`],
//! [`episodic::EpisodicStorageBackend`], and [`semantic::SemanticStorageBackend`]
//! are the seams a durable backend (see the sibling `memory-storage-redb`
//! crate) implements.

pub mod config;
pub mod episodic;
pub mod error;
pub mod extraction;
pub mod orchestrator;
pub mod registry;
pub mod semantic;
pub mod symbolic;
pub mod types;

pub use config::MemoryConfig;
pub use error::{Error, Result};
pub use orchestrator::Engine;
pub use registry::{Project, ProjectRegistry};
