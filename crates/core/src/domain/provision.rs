use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::metadata::{RetryBookkeeping, RunMetadata};
use super::system::ProviderSystem;

/// Durable checkpoint in the provisioning sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionState {
    #[default]
    Init,
    GithubCreating,
    SupabaseCreating,
    SupabaseReady,
    SchemaMigrated,
    AuthConfigured,
    StorageReady,
    VercelCreating,
    VercelDeploying,
    StripeCustomerCreating,
    StripeSubscriptionCreating,
    Complete,
    Failed,
}

impl ProvisionState {
    /// The ordered happy path. `Failed` sits outside of it.
    pub const SEQUENCE: [ProvisionState; 12] = [
        Self::Init,
        Self::GithubCreating,
        Self::SupabaseCreating,
        Self::SupabaseReady,
        Self::SchemaMigrated,
        Self::AuthConfigured,
        Self::StorageReady,
        Self::VercelCreating,
        Self::VercelDeploying,
        Self::StripeCustomerCreating,
        Self::StripeSubscriptionCreating,
        Self::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::GithubCreating => "GITHUB_CREATING",
            Self::SupabaseCreating => "SUPABASE_CREATING",
            Self::SupabaseReady => "SUPABASE_READY",
            Self::SchemaMigrated => "SCHEMA_MIGRATED",
            Self::AuthConfigured => "AUTH_CONFIGURED",
            Self::StorageReady => "STORAGE_READY",
            Self::VercelCreating => "VERCEL_CREATING",
            Self::VercelDeploying => "VERCEL_DEPLOYING",
            Self::StripeCustomerCreating => "STRIPE_CUSTOMER_CREATING",
            Self::StripeSubscriptionCreating => "STRIPE_SUBSCRIPTION_CREATING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(Self::Init),
            "GITHUB_CREATING" => Some(Self::GithubCreating),
            "SUPABASE_CREATING" => Some(Self::SupabaseCreating),
            "SUPABASE_READY" => Some(Self::SupabaseReady),
            "SCHEMA_MIGRATED" => Some(Self::SchemaMigrated),
            "AUTH_CONFIGURED" => Some(Self::AuthConfigured),
            "STORAGE_READY" => Some(Self::StorageReady),
            "VERCEL_CREATING" => Some(Self::VercelCreating),
            "VERCEL_DEPLOYING" => Some(Self::VercelDeploying),
            "STRIPE_CUSTOMER_CREATING" => Some(Self::StripeCustomerCreating),
            "STRIPE_SUBSCRIPTION_CREATING" => Some(Self::StripeSubscriptionCreating),
            "COMPLETE" => Some(Self::Complete),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Position in [`Self::SEQUENCE`]; `None` for `Failed`.
    pub fn position(&self) -> Option<usize> {
        Self::SEQUENCE.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// The external system whose retry budget governs this state.
    pub fn system(&self) -> Option<ProviderSystem> {
        match self {
            Self::Init | Self::GithubCreating => Some(ProviderSystem::Github),
            Self::SupabaseCreating
            | Self::SupabaseReady
            | Self::SchemaMigrated
            | Self::AuthConfigured
            | Self::StorageReady => Some(ProviderSystem::Supabase),
            Self::VercelCreating | Self::VercelDeploying => Some(ProviderSystem::Vercel),
            Self::StripeCustomerCreating | Self::StripeSubscriptionCreating => {
                Some(ProviderSystem::Stripe)
            }
            Self::Complete | Self::Failed => None,
        }
    }
}

impl std::fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tenant's attempt to provision a full application stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRun {
    pub id: Uuid,
    pub project_slug: String,
    pub state: ProvisionState,
    pub metadata: RunMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// State a `Failed` run failed in; resume re-enters here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_state: Option<ProvisionState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisionRun {
    pub fn new(project_slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_slug: project_slug.into(),
            state: ProvisionState::default(),
            metadata: RunMetadata::default(),
            error: None,
            failed_state: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an update the way the store persists it: state and error are
    /// replaced, system metadata is filled in, retry bookkeeping is replaced.
    pub fn apply(&mut self, update: &UpdateRunRequest) {
        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(metadata) = &update.metadata {
            self.metadata.merge(metadata.clone());
        }
        if update.discard_deployment {
            self.metadata.discard_deployment();
        }
        if let Some(retry) = &update.retry {
            self.metadata.set_retry(retry);
        }
        if update.clear_error {
            self.error = None;
            self.failed_state = None;
        }
        if let Some(error) = &update.error {
            self.error = Some(error.clone());
        }
        if let Some(failed_state) = update.failed_state {
            self.failed_state = Some(failed_state);
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRunRequest {
    pub state: Option<ProvisionState>,
    pub metadata: Option<RunMetadata>,
    pub retry: Option<RetryBookkeeping>,
    pub error: Option<String>,
    pub failed_state: Option<ProvisionState>,
    pub clear_error: bool,
    pub discard_deployment: bool,
}

impl UpdateRunRequest {
    /// Advance to `state`, merging `metadata` and resetting the retry counter.
    pub fn advance(state: ProvisionState, metadata: RunMetadata) -> Self {
        Self {
            state: Some(state),
            metadata: Some(metadata),
            retry: Some(RetryBookkeeping::default()),
            ..Default::default()
        }
    }

    pub fn metadata(metadata: RunMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn failed(at: ProvisionState, error: impl Into<String>) -> Self {
        Self {
            state: Some(ProvisionState::Failed),
            error: Some(error.into()),
            failed_state: Some(at),
            ..Default::default()
        }
    }

    /// Re-enter a failed run at the state it failed in with a fresh retry budget.
    /// A run failed while deploying drops its deployment so a new one is built.
    pub fn reopen(at: ProvisionState) -> Self {
        Self {
            state: Some(at),
            retry: Some(RetryBookkeeping::default()),
            clear_error: true,
            discard_deployment: at == ProvisionState::VercelDeploying,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub project_slug: String,
}
