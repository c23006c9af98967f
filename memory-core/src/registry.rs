//! Project Registry: assigns stable project identifiers and materializes
//! per-project root directories.
//!
//! The registry is the leaf component every other store depends on; it owns
//! no domain data, only the `name`/`id` -> root-directory mapping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::ProjectStatus;

/// A single project's registry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Stable, immutable identifier. Matches `/^[A-Za-z0-9_-]{1,150}$/`.
    pub project_id: String,
    /// Human-supplied display name (the portion before `-shortUUID`, or the
    /// raw resolved name for backward-interop ids).
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: ProjectStatus,
    /// On-disk project root.
    pub root_dir: PathBuf,
}

fn project_id_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,150}$").expect("static regex is valid"))
}

/// Generate an 8-character lowercase-hex short UUID suffix.
fn short_uuid(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdef";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// In-memory project registry, serialized for first-time resolution.
///
/// Persistence of the registry index itself (e.g. to a `projects.json` under
/// `data_root`) is the caller's responsibility; this type provides the
/// concurrency-safe resolve/list/get_root operations spec.md §4.1 requires.
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    data_root: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<String, Project>,
    by_name: HashMap<String, String>,
}

impl ProjectRegistry {
    /// Construct an empty registry rooted at `data_root`.
    #[must_use]
    pub fn new(data_root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            data_root: data_root.into(),
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Restore a registry from a previously-serialized project list, e.g. on
    /// process startup after reading `projects.json`.
    #[must_use]
    pub fn from_projects(data_root: impl Into<PathBuf>, projects: Vec<Project>) -> Arc<Self> {
        let registry = Self::new(data_root);
        {
            let mut inner = registry.inner.lock();
            for project in projects {
                inner.by_name.insert(project.name.clone(), project.project_id.clone());
                inner.by_id.insert(project.project_id.clone(), project);
            }
        }
        registry
    }

    /// Resolve `name_or_id` to a stable `project_id`, creating a new project
    /// on first use.
    ///
    /// Idempotent with respect to existing ids and names: resolving the same
    /// input twice in a row returns the same `project_id`. Concurrent
    /// first-time resolution of the same name is serialized under the
    /// registry's internal lock so exactly one project is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProjectId`] if `name_or_id` fails the
    /// identifier regex when it must be used as a fresh id.
    pub fn resolve(&self, name_or_id: &str) -> Result<String> {
        let mut inner = self.inner.lock();

        if inner.by_id.contains_key(name_or_id) {
            return Ok(name_or_id.to_string());
        }
        if let Some(id) = inner.by_name.get(name_or_id) {
            return Ok(id.clone());
        }

        if !project_id_regex().is_match(name_or_id) {
            return Err(Error::InvalidProjectId(format!(
                "'{name_or_id}' does not match /^[A-Za-z0-9_-]{{1,150}}$/"
            )));
        }

        let project_id = format!("{name_or_id}-{}", short_uuid(8));
        let root_dir = self.data_root.join(&project_id);
        let project = Project {
            project_id: project_id.clone(),
            name: name_or_id.to_string(),
            created_at: Utc::now(),
            status: ProjectStatus::Active,
            root_dir,
        };

        info!(project_id = %project_id, name = %name_or_id, "created new project");
        inner.by_name.insert(name_or_id.to_string(), project_id.clone());
        inner.by_id.insert(project_id.clone(), project);
        Ok(project_id)
    }

    /// List known projects, optionally filtered by status.
    #[must_use]
    pub fn list(&self, status_filter: Option<ProjectStatus>) -> Vec<Project> {
        let inner = self.inner.lock();
        inner
            .by_id
            .values()
            .filter(|p| status_filter.is_none_or(|s| p.status == s))
            .cloned()
            .collect()
    }

    /// Resolve a project's on-disk root directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `project_id` is unknown.
    pub fn get_root(&self, project_id: &str) -> Result<PathBuf> {
        let inner = self.inner.lock();
        inner
            .by_id
            .get(project_id)
            .map(|p| p.root_dir.clone())
            .ok_or_else(|| Error::NotFound(format!("project {project_id}")))
    }

    /// Fetch the full record for a known project.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `project_id` is unknown.
    pub fn get(&self, project_id: &str) -> Result<Project> {
        let inner = self.inner.lock();
        inner
            .by_id
            .get(project_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("project {project_id}")))
    }

    /// Snapshot all projects, for persisting to `projects.json`.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Project> {
        self.inner.lock().by_id.values().cloned().collect()
    }

    /// Ensure the on-disk root for `project_id` exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryUnavailable`] if the directory cannot be created.
    pub fn ensure_root(&self, project_id: &str) -> Result<PathBuf> {
        let root = self.get_root(project_id)?;
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::RegistryUnavailable(format!("cannot create {root:?}: {e}")))?;
        debug!(project_id, root = ?root, "ensured project root");
        Ok(root)
    }
}

/// Validate a raw path component used as a data root, guarding against an
/// empty string (which would resolve to the current directory unexpectedly).
pub(crate) fn require_nonempty_root(root: &Path) -> Result<()> {
    if root.as_os_str().is_empty() {
        return Err(Error::RegistryUnavailable("data_root must not be empty".into()));
    }
    Ok(())
}
