//! The external action performed at each provisioning state.
//!
//! Every action is create-or-fetch and skips its external call entirely
//! when the metadata it would produce is already recorded on the run.

use std::sync::Arc;

use chrono::Utc;
use factory_core::{
    ElevenMetadata, GithubMetadata, ProviderSystem, ProvisionRun, ProvisionState, RunMetadata,
    StripeMetadata, SupabaseMetadata, VercelMetadata,
};
use providers::{
    AuthSettings, DatabaseHealth, DatabaseProject, DatabaseProvider, EnvVar, HostingProject,
    HostingProvider, PaymentProvider, ProviderError, SourceControl, VoiceAgentProvider,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Clients for every external system, injected at startup.
#[derive(Clone)]
pub struct Providers {
    pub source_control: Arc<dyn SourceControl>,
    pub database: Arc<dyn DatabaseProvider>,
    pub hosting: Arc<dyn HostingProvider>,
    pub voice: Arc<dyn VoiceAgentProvider>,
    pub payment: Arc<dyn PaymentProvider>,
}

/// Naming conventions and tenant stack settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionSettings {
    /// Prepended to the slug to name every external resource.
    pub resource_prefix: String,
    /// Production URLs are `https://{name}.{hosting_domain}`.
    pub hosting_domain: String,
    /// File the source-control verifier fetches from a new repository.
    pub verification_path: String,
    pub storage_bucket: String,
    pub schema_sql: String,
    pub schema_version: String,
    pub auth_callback_path: String,
    pub probe_message: String,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            resource_prefix: String::new(),
            hosting_domain: "vercel.app".to_string(),
            verification_path: "package.json".to_string(),
            storage_bucket: "recordings".to_string(),
            schema_sql: String::new(),
            schema_version: "1".to_string(),
            auth_callback_path: "/auth/callback".to_string(),
            probe_message: "Hello, can you hear me?".to_string(),
        }
    }
}

impl ProvisionSettings {
    pub fn resource_name(&self, project_slug: &str) -> String {
        format!("{}{}", self.resource_prefix, project_slug)
    }

    pub fn production_url(&self, project_slug: &str) -> String {
        format!(
            "https://{}.{}",
            self.resource_name(project_slug),
            self.hosting_domain
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The action finished; verifiers (if any) decide whether to advance.
    Done(RunMetadata),
    /// One sub-step of a multi-part action finished. Its metadata is
    /// persisted and the action runs again.
    Progress(RunMetadata),
    /// The external operation is still in progress.
    Pending(String),
}

fn require(
    system: ProviderSystem,
    value: Option<String>,
    field: &str,
) -> Result<String, ProviderError> {
    value.ok_or_else(|| {
        ProviderError::rejected(system, format!("run metadata is missing {}", field))
    })
}

pub struct StepRunner {
    providers: Providers,
    settings: ProvisionSettings,
}

impl StepRunner {
    pub fn new(providers: Providers, settings: ProvisionSettings) -> Self {
        Self {
            providers,
            settings,
        }
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    pub async fn execute(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        debug!(project_slug = %run.project_slug, state = %run.state, "Executing step action");

        match run.state {
            ProvisionState::Init | ProvisionState::Complete | ProvisionState::Failed => {
                Ok(StepOutcome::Done(RunMetadata::default()))
            }
            ProvisionState::GithubCreating => self.create_repository(run).await,
            ProvisionState::SupabaseCreating => self.create_database(run).await,
            ProvisionState::SupabaseReady => self.await_database(run).await,
            ProvisionState::SchemaMigrated => self.migrate_schema(run).await,
            ProvisionState::AuthConfigured => self.configure_auth(run).await,
            ProvisionState::StorageReady => self.create_storage(run).await,
            ProvisionState::VercelCreating => self.create_hosting(run).await,
            ProvisionState::VercelDeploying => self.deploy(run).await,
            ProvisionState::StripeCustomerCreating => self.create_customer(run).await,
            ProvisionState::StripeSubscriptionCreating => self.create_subscription(run).await,
        }
    }

    async fn create_repository(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        if run.metadata.github().repo.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }

        let name = self.settings.resource_name(&run.project_slug);
        let repo = self.providers.source_control.create_or_fetch_repo(&name).await?;
        info!(project_slug = %run.project_slug, repo = %repo.full_name, "Repository ready");

        Ok(StepOutcome::Done(RunMetadata {
            github: Some(GithubMetadata {
                repo: Some(repo.full_name),
                html_url: Some(repo.html_url),
                default_branch: Some(repo.default_branch),
                verified_at: None,
            }),
            ..Default::default()
        }))
    }

    async fn create_database(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        if run.metadata.supabase().project_ref.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }

        let name = self.settings.resource_name(&run.project_slug);
        let project = self.providers.database.create_or_fetch_project(&name).await?;
        info!(project_slug = %run.project_slug, project_ref = %project.project_ref, "Database project ready");

        Ok(StepOutcome::Done(RunMetadata {
            supabase: Some(SupabaseMetadata {
                project_ref: Some(project.project_ref),
                api_url: Some(project.api_url),
                region: project.region,
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    async fn await_database(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        let supabase = run.metadata.supabase();
        if supabase.ready_at.is_some() && supabase.anon_key.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }
        let project_ref = require(ProviderSystem::Supabase, supabase.project_ref, "supabase.projectRef")?;

        match self.providers.database.project_health(&project_ref).await? {
            DatabaseHealth::Ready => {}
            DatabaseHealth::Pending(status) => {
                return Ok(StepOutcome::Pending(format!(
                    "database project {} is {}",
                    project_ref, status
                )));
            }
            DatabaseHealth::Failed(status) => {
                return Err(ProviderError::rejected(
                    ProviderSystem::Supabase,
                    format!("database project {} is {}", project_ref, status),
                ));
            }
        }

        let keys = self.providers.database.fetch_api_keys(&project_ref).await?;
        Ok(StepOutcome::Done(RunMetadata {
            supabase: Some(SupabaseMetadata {
                anon_key: Some(keys.anon_key),
                ready_at: Some(Utc::now()),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    async fn migrate_schema(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        let supabase = run.metadata.supabase();
        if supabase.schema_version.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }
        let project_ref = require(ProviderSystem::Supabase, supabase.project_ref, "supabase.projectRef")?;

        if self.settings.schema_sql.trim().is_empty() {
            debug!(project_slug = %run.project_slug, "No schema configured, skipping migration");
        } else {
            self.providers
                .database
                .apply_schema(&project_ref, &self.settings.schema_sql)
                .await?;
        }

        Ok(StepOutcome::Done(RunMetadata {
            supabase: Some(SupabaseMetadata {
                schema_version: Some(self.settings.schema_version.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    async fn configure_auth(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        let supabase = run.metadata.supabase();
        if supabase.auth_site_url.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }
        let project_ref = require(ProviderSystem::Supabase, supabase.project_ref, "supabase.projectRef")?;

        let site_url = self.settings.production_url(&run.project_slug);
        let settings = AuthSettings {
            redirect_urls: vec![format!("{}{}", site_url, self.settings.auth_callback_path)],
            site_url: site_url.clone(),
        };
        self.providers
            .database
            .configure_auth(&project_ref, &settings)
            .await?;

        Ok(StepOutcome::Done(RunMetadata {
            supabase: Some(SupabaseMetadata {
                auth_site_url: Some(site_url),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    async fn create_storage(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        let supabase = run.metadata.supabase();
        if supabase.storage_bucket.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }

        let project = DatabaseProject {
            project_ref: require(ProviderSystem::Supabase, supabase.project_ref, "supabase.projectRef")?,
            api_url: require(ProviderSystem::Supabase, supabase.api_url, "supabase.apiUrl")?,
            name: self.settings.resource_name(&run.project_slug),
            region: supabase.region,
        };
        self.providers
            .database
            .ensure_storage_bucket(&project, &self.settings.storage_bucket)
            .await?;

        Ok(StepOutcome::Done(RunMetadata {
            supabase: Some(SupabaseMetadata {
                storage_bucket: Some(self.settings.storage_bucket.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    /// Voice agent first, then the hosting project, then its environment.
    /// Each call performs one sub-step and hands back what it produced, so
    /// an artifact is recorded before the next sub-step can fail.
    async fn create_hosting(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        let name = self.settings.resource_name(&run.project_slug);
        let eleven = run.metadata.eleven();
        let vercel = run.metadata.vercel();

        let Some(agent_id) = eleven.agent_id else {
            let agent = self.providers.voice.create_or_fetch_agent(&name).await?;
            info!(project_slug = %run.project_slug, agent_id = %agent.agent_id, "Voice agent ready");
            return Ok(StepOutcome::Progress(RunMetadata {
                eleven: Some(ElevenMetadata {
                    agent_id: Some(agent.agent_id),
                    agent_name: Some(agent.name),
                }),
                ..Default::default()
            }));
        };

        let Some(project_id) = vercel.project_id else {
            let repo = require(ProviderSystem::Vercel, run.metadata.github().repo, "github.repo")?;
            let project = self
                .providers
                .hosting
                .create_or_fetch_project(&name, &repo)
                .await?;
            info!(project_slug = %run.project_slug, project_id = %project.id, "Hosting project ready");
            return Ok(StepOutcome::Progress(RunMetadata {
                vercel: Some(VercelMetadata {
                    project_id: Some(project.id),
                    project_name: Some(project.name),
                    production_url: Some(self.settings.production_url(&run.project_slug)),
                    ..Default::default()
                }),
                ..Default::default()
            }));
        };

        if vercel.env_configured == Some(true) {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }

        let supabase = run.metadata.supabase();
        let vars = vec![
            EnvVar::new(
                "NEXT_PUBLIC_SUPABASE_URL",
                require(ProviderSystem::Vercel, supabase.api_url, "supabase.apiUrl")?,
            ),
            EnvVar::new(
                "NEXT_PUBLIC_SUPABASE_ANON_KEY",
                require(ProviderSystem::Vercel, supabase.anon_key, "supabase.anonKey")?,
            ),
            EnvVar::new(
                "NEXT_PUBLIC_SITE_URL",
                require(ProviderSystem::Vercel, vercel.production_url, "vercel.productionUrl")?,
            ),
            EnvVar::new("NEXT_PUBLIC_ELEVENLABS_AGENT_ID", agent_id),
        ];
        self.providers
            .hosting
            .upsert_env_vars(&project_id, &vars)
            .await?;

        Ok(StepOutcome::Done(RunMetadata {
            vercel: Some(VercelMetadata {
                env_configured: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    async fn deploy(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        let vercel = run.metadata.vercel();
        if vercel.deployment_id.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }

        let github = run.metadata.github();
        let project = HostingProject {
            id: require(ProviderSystem::Vercel, vercel.project_id, "vercel.projectId")?,
            name: require(ProviderSystem::Vercel, vercel.project_name, "vercel.projectName")?,
        };
        let repo = require(ProviderSystem::Vercel, github.repo, "github.repo")?;
        let git_ref = github.default_branch.unwrap_or_else(|| "main".to_string());

        let deployment = self
            .providers
            .hosting
            .trigger_deployment(&project, &repo, &git_ref)
            .await?;
        info!(project_slug = %run.project_slug, deployment_id = %deployment.id, "Deployment triggered");

        Ok(StepOutcome::Done(RunMetadata {
            vercel: Some(VercelMetadata {
                deployment_id: Some(deployment.id),
                deployment_url: Some(deployment.url),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    async fn create_customer(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        if run.metadata.stripe().customer_id.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }

        let customer = self
            .providers
            .payment
            .create_or_fetch_customer(&run.project_slug)
            .await?;

        Ok(StepOutcome::Done(RunMetadata {
            stripe: Some(StripeMetadata {
                customer_id: Some(customer.id),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    async fn create_subscription(&self, run: &ProvisionRun) -> Result<StepOutcome, ProviderError> {
        let stripe = run.metadata.stripe();
        if stripe.subscription_id.is_some() {
            return Ok(StepOutcome::Done(RunMetadata::default()));
        }
        let customer_id = require(ProviderSystem::Stripe, stripe.customer_id, "stripe.customerId")?;

        let subscription = self
            .providers
            .payment
            .create_or_fetch_subscription(&customer_id, &run.project_slug)
            .await?;

        Ok(StepOutcome::Done(RunMetadata {
            stripe: Some(StripeMetadata {
                subscription_id: Some(subscription.id),
                subscription_status: Some(subscription.status),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }
}
