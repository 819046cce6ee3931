//! In-process exclusion of concurrent orchestrations for the same slug.
//!
//! This only covers a single process. Across processes, correctness rests on
//! the store's create semantics and idempotent provider actions.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Registry of slugs with an orchestration in flight.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    active: Arc<Mutex<HashSet<String>>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `project_slug`. Returns `None` while another lease is held.
    pub fn try_acquire(&self, project_slug: &str) -> Option<RunLease> {
        if !self.lock().insert(project_slug.to_string()) {
            return None;
        }
        debug!(project_slug = %project_slug, "Run lease acquired");

        Some(RunLease {
            project_slug: project_slug.to_string(),
            guard: self.clone(),
        })
    }

    pub fn is_active(&self, project_slug: &str) -> bool {
        self.lock().contains(project_slug)
    }
}

/// Releases the slug when dropped, including on panic or early return.
#[derive(Debug)]
pub struct RunLease {
    project_slug: String,
    guard: RunGuard,
}

impl RunLease {
    pub fn project_slug(&self) -> &str {
        &self.project_slug
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.project_slug);
        debug!(project_slug = %self.project_slug, "Run lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let guard = RunGuard::new();

        let lease = guard.try_acquire("acme-42");
        assert!(lease.is_some());
        assert!(guard.try_acquire("acme-42").is_none());
        assert!(guard.is_active("acme-42"));
    }

    #[test]
    fn test_release_on_drop() {
        let guard = RunGuard::new();

        {
            let lease = guard.try_acquire("acme-42").unwrap();
            assert_eq!(lease.project_slug(), "acme-42");
        }

        assert!(!guard.is_active("acme-42"));
        assert!(guard.try_acquire("acme-42").is_some());
    }

    #[test]
    fn test_slugs_are_independent() {
        let guard = RunGuard::new();

        let _a = guard.try_acquire("acme-42").unwrap();
        assert!(guard.try_acquire("demo-acme").is_some());
    }
}
