//! Capacity tracking for episodic storage.
//!
//! Tracks how many episodes a project holds against an optional soft limit.
//! This is bookkeeping only: the Episodic Store never auto-evicts, so a
//! [`CapacityManager`] never deletes anything on its own. Callers who want
//! bounded storage must invoke [`crate::episodic::EpisodicStore::cleanup`]
//! explicitly; this type only tells them when it would be worth doing so.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Tracks per-project episode counts against an optional soft cap.
#[derive(Debug)]
pub struct CapacityManager {
    max_episodes: Option<usize>,
    counts: Mutex<HashMap<String, usize>>,
}

impl CapacityManager {
    /// Construct a manager with no cap (always `can_store`).
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_episodes: None,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Construct a manager enforcing a soft per-project episode cap.
    #[must_use]
    pub fn with_limit(max_episodes: usize) -> Self {
        Self {
            max_episodes: Some(max_episodes),
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Record that `project_id` now holds `count` episodes, e.g. after a
    /// successful [`crate::episodic::EpisodicStore::store`] or `cleanup`.
    pub fn record_count(&self, project_id: &str, count: usize) {
        self.counts.lock().insert(project_id.to_string(), count);
    }

    /// Whether storing one more episode would exceed the configured cap.
    /// Always `true` when unbounded.
    #[must_use]
    pub fn can_store(&self, project_id: &str) -> bool {
        match self.max_episodes {
            None => true,
            Some(limit) => {
                let current = self.counts.lock().get(project_id).copied().unwrap_or(0);
                current < limit
            }
        }
    }

    /// Current tracked count for a project (0 if never recorded).
    #[must_use]
    pub fn count(&self, project_id: &str) -> usize {
        self.counts.lock().get(project_id).copied().unwrap_or(0)
    }
}

impl Default for CapacityManager {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_manager_always_allows_storage() {
        let manager = CapacityManager::unbounded();
        manager.record_count("alpha-aaaaaaaa", 10_000);
        assert!(manager.can_store("alpha-aaaaaaaa"));
    }

    #[test]
    fn bounded_manager_rejects_at_limit() {
        let manager = CapacityManager::with_limit(2);
        manager.record_count("alpha-aaaaaaaa", 2);
        assert!(!manager.can_store("alpha-aaaaaaaa"));
        manager.record_count("alpha-aaaaaaaa", 1);
        assert!(manager.can_store("alpha-aaaaaaaa"));
    }

    #[test]
    fn projects_are_tracked_independently() {
        let manager = CapacityManager::with_limit(1);
        manager.record_count("alpha-aaaaaaaa", 1);
        assert!(manager.can_store("beta-bbbbbbbb"));
    }
}
