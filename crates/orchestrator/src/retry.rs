//! Per-system retry policy and the retry bookkeeping persisted on a run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::ProvisionRunRepository;
use factory_core::{ProviderSystem, ProvisionRun, RetryBookkeeping, UpdateRunRequest};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Backoff parameters for one external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryPolicy {
    /// Transient failures tolerated before the run is failed.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Verifier re-checks per invocation when waiting in poll mode.
    pub max_polls: u32,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64, max_polls: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            max_polls,
        }
    }

    /// `min(base * 2^(attempt-1), max)` for a 1-based attempt. Attempt 0 is
    /// treated as the first attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    pub fn default_for(system: ProviderSystem) -> Self {
        match system {
            ProviderSystem::Github => Self::new(5, 1_000, 10_000, 30),
            ProviderSystem::Supabase => Self::new(6, 2_000, 20_000, 60),
            ProviderSystem::Vercel => Self::new(8, 3_000, 30_000, 120),
            ProviderSystem::Eleven => Self::new(4, 1_000, 8_000, 20),
            ProviderSystem::Stripe => Self::new(3, 1_000, 5_000, 10),
        }
    }
}

/// Read-only policy lookup keyed by external system.
#[derive(Debug, Clone)]
pub struct RetryPolicyRegistry {
    policies: HashMap<ProviderSystem, RetryPolicy>,
}

impl Default for RetryPolicyRegistry {
    fn default() -> Self {
        Self {
            policies: ProviderSystem::ALL
                .iter()
                .map(|system| (*system, RetryPolicy::default_for(*system)))
                .collect(),
        }
    }
}

impl RetryPolicyRegistry {
    pub fn with_policy(mut self, system: ProviderSystem, policy: RetryPolicy) -> Self {
        self.policies.insert(system, policy);
        self
    }

    /// Overrides keyed by system name; unknown names are ignored.
    pub fn with_overrides(mut self, overrides: &HashMap<String, RetryPolicy>) -> Self {
        for (name, policy) in overrides {
            match ProviderSystem::parse(name) {
                Some(system) => {
                    self.policies.insert(system, *policy);
                }
                None => warn!(system = %name, "Ignoring retry policy for unknown system"),
            }
        }
        self
    }

    pub fn policy(&self, system: ProviderSystem) -> RetryPolicy {
        self.policies
            .get(&system)
            .copied()
            .unwrap_or_else(|| RetryPolicy::default_for(system))
    }
}

/// Decides whether a failed step is retried and persists the counter.
pub struct RetryTracker {
    store: Arc<ProvisionRunRepository>,
    policies: Arc<RetryPolicyRegistry>,
}

impl RetryTracker {
    pub fn new(store: Arc<ProvisionRunRepository>, policies: Arc<RetryPolicyRegistry>) -> Self {
        Self { store, policies }
    }

    /// Whether the run's `retryCount` is still below the budget of the
    /// system governing its current state.
    pub async fn should_retry(&self, project_slug: &str) -> Result<bool> {
        let run = self.store.get(project_slug).await?;
        Ok(self.has_budget(&run))
    }

    pub fn has_budget(&self, run: &ProvisionRun) -> bool {
        match run.state.system() {
            Some(system) => run.metadata.retry_count < self.policies.policy(system).max_retries,
            None => false,
        }
    }

    /// Increment and persist `retryCount` and `lastRetryAt`.
    pub async fn record_retry(&self, project_slug: &str) -> Result<ProvisionRun> {
        let run = self.store.get(project_slug).await?;
        let retry = RetryBookkeeping {
            retry_count: run.metadata.retry_count + 1,
            last_retry_at: Some(Utc::now()),
        };

        let update = UpdateRunRequest {
            retry: Some(retry),
            ..Default::default()
        };
        Ok(self.store.update(project_slug, &update).await?)
    }
}
