//! Typed run metadata.
//!
//! Every external system owns one sub-record. Merging is fill-only: once a
//! field holds a value, later writes for that field are ignored, so artifacts
//! recorded by an earlier state cannot be clobbered by a later one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::system::ProviderSystem;

fn fill<T>(dst: &mut Option<T>, src: Option<T>) {
    if dst.is_none() {
        *dst = src;
    }
}

fn fill_section<T: Default>(dst: &mut Option<T>, src: Option<T>, merge: impl FnOnce(&mut T, T)) {
    if let Some(src) = src {
        merge(dst.get_or_insert_with(T::default), src);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GithubMetadata {
    /// `owner/name` of the tenant repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl GithubMetadata {
    fn merge(&mut self, other: Self) {
        fill(&mut self.repo, other.repo);
        fill(&mut self.html_url, other.html_url);
        fill(&mut self.default_branch, other.default_branch);
        fill(&mut self.verified_at, other.verified_at);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupabaseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Public (anon) key; the service role key is never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_site_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,
}

impl SupabaseMetadata {
    fn merge(&mut self, other: Self) {
        fill(&mut self.project_ref, other.project_ref);
        fill(&mut self.api_url, other.api_url);
        fill(&mut self.region, other.region);
        fill(&mut self.anon_key, other.anon_key);
        fill(&mut self.ready_at, other.ready_at);
        fill(&mut self.schema_version, other.schema_version);
        fill(&mut self.auth_site_url, other.auth_site_url);
        fill(&mut self.storage_bucket, other.storage_bucket);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElevenMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

impl ElevenMetadata {
    fn merge(&mut self, other: Self) {
        fill(&mut self.agent_id, other.agent_id);
        fill(&mut self.agent_name, other.agent_name);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VercelMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_configured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    /// Deployments discarded after failing verification, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discarded_deployments: Vec<String>,
}

impl VercelMetadata {
    fn merge(&mut self, other: Self) {
        fill(&mut self.project_id, other.project_id);
        fill(&mut self.project_name, other.project_name);
        fill(&mut self.production_url, other.production_url);
        fill(&mut self.env_configured, other.env_configured);
        fill(&mut self.deployment_id, other.deployment_id);
        fill(&mut self.deployment_url, other.deployment_url);
        fill(&mut self.ready_at, other.ready_at);
        if self.discarded_deployments.is_empty() {
            self.discarded_deployments = other.discarded_deployments;
        }
    }

    /// Forgets the current deployment so the next deploy triggers a new one.
    fn discard_deployment(&mut self) {
        if let Some(id) = self.deployment_id.take() {
            self.discarded_deployments.push(id);
        }
        self.deployment_url = None;
        self.ready_at = None;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StripeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
}

impl StripeMetadata {
    fn merge(&mut self, other: Self) {
        fill(&mut self.customer_id, other.customer_id);
        fill(&mut self.subscription_id, other.subscription_id);
        fill(&mut self.subscription_status, other.subscription_status);
    }
}

/// Retry counters for the state the run currently sits in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryBookkeeping {
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase: Option<SupabaseMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vercel: Option<VercelMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eleven: Option<ElevenMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe: Option<StripeMetadata>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl RunMetadata {
    /// Fill-only merge of every system section. Retry bookkeeping is not
    /// touched here; see [`RunMetadata::set_retry`].
    pub fn merge(&mut self, other: RunMetadata) {
        fill_section(&mut self.github, other.github, GithubMetadata::merge);
        fill_section(&mut self.supabase, other.supabase, SupabaseMetadata::merge);
        fill_section(&mut self.vercel, other.vercel, VercelMetadata::merge);
        fill_section(&mut self.eleven, other.eleven, ElevenMetadata::merge);
        fill_section(&mut self.stripe, other.stripe, StripeMetadata::merge);
    }

    pub fn set_retry(&mut self, retry: &RetryBookkeeping) {
        self.retry_count = retry.retry_count;
        self.last_retry_at = retry.last_retry_at;
    }

    /// The one place a recorded artifact is removed rather than filled:
    /// re-entering VERCEL_DEPLOYING after a failure must not reuse the
    /// deployment that failed. Project and env settings are kept.
    pub fn discard_deployment(&mut self) {
        if let Some(vercel) = self.vercel.as_mut() {
            vercel.discard_deployment();
        }
    }

    /// Systems that have recorded at least one artifact.
    pub fn recorded_systems(&self) -> Vec<ProviderSystem> {
        let mut systems = Vec::new();
        if self.github.is_some() {
            systems.push(ProviderSystem::Github);
        }
        if self.supabase.is_some() {
            systems.push(ProviderSystem::Supabase);
        }
        if self.vercel.is_some() {
            systems.push(ProviderSystem::Vercel);
        }
        if self.eleven.is_some() {
            systems.push(ProviderSystem::Eleven);
        }
        if self.stripe.is_some() {
            systems.push(ProviderSystem::Stripe);
        }
        systems
    }

    pub fn github(&self) -> GithubMetadata {
        self.github.clone().unwrap_or_default()
    }

    pub fn supabase(&self) -> SupabaseMetadata {
        self.supabase.clone().unwrap_or_default()
    }

    pub fn vercel(&self) -> VercelMetadata {
        self.vercel.clone().unwrap_or_default()
    }

    pub fn eleven(&self) -> ElevenMetadata {
        self.eleven.clone().unwrap_or_default()
    }

    pub fn stripe(&self) -> StripeMetadata {
        self.stripe.clone().unwrap_or_default()
    }
}
