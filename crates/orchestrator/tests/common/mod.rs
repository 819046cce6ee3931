#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use db::{create_pool, run_migrations, ProvisionRunRepository};
use factory_core::ProviderSystem;
use orchestrator::{
    AlertSink, FailureAlert, ProvisionOrchestrator, ProvisionSettings, Providers, RetryPolicy,
    RetryPolicyRegistry,
};
use providers::{
    AuthSettings, Customer, DatabaseHealth, DatabaseKeys, DatabaseProject, DatabaseProvider,
    Deployment, DeploymentState, EnvVar, HostingProject, HostingProvider, PaymentProvider,
    ProviderError, Repository, Result, SiteConfig, SourceControl, Subscription, VoiceAgent,
    VoiceAgentProvider,
};

pub const SLUG: &str = "acme-42";

pub async fn setup_store() -> Arc<ProvisionRunRepository> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(ProvisionRunRepository::new(pool))
}

/// Production retry budgets with millisecond delays.
pub fn fast_policies() -> RetryPolicyRegistry {
    ProviderSystem::ALL
        .iter()
        .fold(RetryPolicyRegistry::default(), |registry, system| {
            let policy = RetryPolicy::default_for(*system);
            registry.with_policy(*system, RetryPolicy::new(policy.max_retries, 1, 4, 3))
        })
}

/// Pops the next scripted failure, if any.
fn scripted(failures: &Mutex<Vec<ProviderError>>) -> Result<()> {
    match failures.lock().unwrap().pop() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[derive(Default)]
pub struct FakeSourceControl {
    pub create_calls: AtomicUsize,
    pub failures: Mutex<Vec<ProviderError>>,
    /// While set, the verification file is not yet fetchable.
    pub content_pending: AtomicBool,
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn create_or_fetch_repo(&self, name: &str) -> Result<Repository> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        scripted(&self.failures)?;
        Ok(Repository {
            full_name: format!("factory/{}", name),
            html_url: format!("https://github.com/factory/{}", name),
            default_branch: "main".to_string(),
        })
    }

    async fn file_exists(&self, _repo: &str, _path: &str) -> Result<bool> {
        Ok(!self.content_pending.load(Ordering::SeqCst))
    }
}

pub struct FakeDatabase {
    pub create_calls: AtomicUsize,
    pub schema_calls: AtomicUsize,
    /// Failures returned by `create_or_fetch_project`, popped from the back.
    pub create_failures: Mutex<Vec<ProviderError>>,
    /// When set, every create call fails with this error.
    pub always_fail: Mutex<Option<ProviderError>>,
    pub health: Mutex<DatabaseHealth>,
    /// Retry counts read from the store at each create call.
    pub observed_retry_counts: Mutex<Vec<u32>>,
    pub store: Mutex<Option<Arc<ProvisionRunRepository>>>,
}

impl Default for FakeDatabase {
    fn default() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            schema_calls: AtomicUsize::new(0),
            create_failures: Mutex::new(Vec::new()),
            always_fail: Mutex::new(None),
            health: Mutex::new(DatabaseHealth::Ready),
            observed_retry_counts: Mutex::new(Vec::new()),
            store: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DatabaseProvider for FakeDatabase {
    async fn create_or_fetch_project(&self, name: &str) -> Result<DatabaseProject> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let store = self.store.lock().unwrap().clone();
        if let Some(store) = store {
            let run = store.get(SLUG).await.unwrap();
            self.observed_retry_counts
                .lock()
                .unwrap()
                .push(run.metadata.retry_count);
        }

        if let Some(err) = self.always_fail.lock().unwrap().clone() {
            return Err(err);
        }
        scripted(&self.create_failures)?;

        Ok(DatabaseProject {
            project_ref: "ref123".to_string(),
            name: name.to_string(),
            api_url: "https://ref123.supabase.co".to_string(),
            region: Some("us-east-1".to_string()),
        })
    }

    async fn project_health(&self, _project_ref: &str) -> Result<DatabaseHealth> {
        Ok(self.health.lock().unwrap().clone())
    }

    async fn fetch_api_keys(&self, _project_ref: &str) -> Result<DatabaseKeys> {
        Ok(DatabaseKeys {
            anon_key: "anon-key".to_string(),
            service_role_key: "service-key".to_string(),
        })
    }

    async fn apply_schema(&self, _project_ref: &str, _sql: &str) -> Result<()> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn configure_auth(&self, _project_ref: &str, _settings: &AuthSettings) -> Result<()> {
        Ok(())
    }

    async fn ensure_storage_bucket(&self, _project: &DatabaseProject, _bucket: &str) -> Result<()> {
        Ok(())
    }
}

pub struct FakeHosting {
    pub project_calls: AtomicUsize,
    pub env_calls: AtomicUsize,
    pub deploy_calls: AtomicUsize,
    pub status_calls: AtomicU32,
    /// Failures returned by `create_or_fetch_project`, popped from the back.
    pub project_failures: Mutex<Vec<ProviderError>>,
    /// State given to each newly triggered deployment.
    pub deployment_state: Mutex<DeploymentState>,
    /// Reported state of every triggered deployment, by id.
    pub deployments: Mutex<HashMap<String, DeploymentState>>,
    project_name: Mutex<Option<String>>,
}

impl FakeHosting {
    /// Every existing and future deployment reports `state`.
    pub fn set_deployment_state(&self, state: DeploymentState) {
        for current in self.deployments.lock().unwrap().values_mut() {
            *current = state.clone();
        }
        *self.deployment_state.lock().unwrap() = state;
    }

    pub fn deployment(&self, id: &str) -> Option<DeploymentState> {
        self.deployments.lock().unwrap().get(id).cloned()
    }
}

impl Default for FakeHosting {
    fn default() -> Self {
        Self {
            project_calls: AtomicUsize::new(0),
            env_calls: AtomicUsize::new(0),
            deploy_calls: AtomicUsize::new(0),
            status_calls: AtomicU32::new(0),
            project_failures: Mutex::new(Vec::new()),
            deployment_state: Mutex::new(DeploymentState::Ready),
            deployments: Mutex::new(HashMap::new()),
            project_name: Mutex::new(None),
        }
    }
}

#[async_trait]
impl HostingProvider for FakeHosting {
    async fn create_or_fetch_project(&self, name: &str, _repo: &str) -> Result<HostingProject> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        scripted(&self.project_failures)?;
        *self.project_name.lock().unwrap() = Some(name.to_string());
        Ok(HostingProject {
            id: "prj_1".to_string(),
            name: name.to_string(),
        })
    }

    async fn upsert_env_vars(&self, _project_id: &str, _vars: &[EnvVar]) -> Result<()> {
        self.env_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn trigger_deployment(
        &self,
        project: &HostingProject,
        _repo: &str,
        _git_ref: &str,
    ) -> Result<Deployment> {
        let n = self.deploy_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("dpl_{}", n);
        let state = self.deployment_state.lock().unwrap().clone();
        self.deployments.lock().unwrap().insert(id.clone(), state);
        Ok(Deployment {
            url: format!("https://{}-dpl{}.vercel.app", project.name, n),
            id,
        })
    }

    async fn deployment_status(&self, deployment_id: &str) -> Result<DeploymentState> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.deployment(deployment_id).ok_or_else(|| {
            ProviderError::rejected(
                ProviderSystem::Vercel,
                format!("deployment {} not found", deployment_id),
            )
        })
    }

    async fn fetch_site_config(&self, _site_url: &str) -> Result<SiteConfig> {
        let name = self.project_name.lock().unwrap().clone();
        Ok(SiteConfig {
            site_url: name.map(|n| format!("https://{}.vercel.app", n)),
            supabase_url: Some("https://ref123.supabase.co".to_string()),
        })
    }
}

#[derive(Default)]
pub struct FakeVoice {
    pub create_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
}

#[async_trait]
impl VoiceAgentProvider for FakeVoice {
    async fn create_or_fetch_agent(&self, name: &str) -> Result<VoiceAgent> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(VoiceAgent {
            agent_id: "agent_1".to_string(),
            name: name.to_string(),
        })
    }

    async fn signed_session_url(&self, agent_id: &str) -> Result<String> {
        Ok(format!("wss://voice.example.com/{}?token=abc", agent_id))
    }

    async fn probe(&self, _agent_id: &str, _message: &str) -> Result<String> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok("Hi there!".to_string())
    }
}

#[derive(Default)]
pub struct FakePayment {
    pub customer_calls: AtomicUsize,
    pub subscription_calls: AtomicUsize,
    pub customer_failures: Mutex<Vec<ProviderError>>,
}

#[async_trait]
impl PaymentProvider for FakePayment {
    async fn create_or_fetch_customer(&self, _project_slug: &str) -> Result<Customer> {
        self.customer_calls.fetch_add(1, Ordering::SeqCst);
        scripted(&self.customer_failures)?;
        Ok(Customer {
            id: "cus_1".to_string(),
        })
    }

    async fn create_or_fetch_subscription(
        &self,
        _customer_id: &str,
        _project_slug: &str,
    ) -> Result<Subscription> {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Subscription {
            id: "sub_1".to_string(),
            status: "active".to_string(),
        })
    }
}

#[derive(Default)]
pub struct CountingAlerts {
    pub alerts: Mutex<Vec<FailureAlert>>,
}

impl CountingAlerts {
    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertSink for CountingAlerts {
    async fn send_alert(&self, alert: &FailureAlert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

#[derive(Default)]
pub struct Fakes {
    pub source_control: Arc<FakeSourceControl>,
    pub database: Arc<FakeDatabase>,
    pub hosting: Arc<FakeHosting>,
    pub voice: Arc<FakeVoice>,
    pub payment: Arc<FakePayment>,
    pub alerts: Arc<CountingAlerts>,
}

impl Fakes {
    pub fn providers(&self) -> Providers {
        Providers {
            source_control: self.source_control.clone(),
            database: self.database.clone(),
            hosting: self.hosting.clone(),
            voice: self.voice.clone(),
            payment: self.payment.clone(),
        }
    }

    /// Every create/trigger call made against any provider.
    pub fn mutating_calls(&self) -> usize {
        self.source_control.create_calls.load(Ordering::SeqCst)
            + self.database.create_calls.load(Ordering::SeqCst)
            + self.database.schema_calls.load(Ordering::SeqCst)
            + self.hosting.project_calls.load(Ordering::SeqCst)
            + self.hosting.env_calls.load(Ordering::SeqCst)
            + self.hosting.deploy_calls.load(Ordering::SeqCst)
            + self.voice.create_calls.load(Ordering::SeqCst)
            + self.payment.customer_calls.load(Ordering::SeqCst)
            + self.payment.subscription_calls.load(Ordering::SeqCst)
    }

    /// Every call of any kind, including status checks and probes.
    pub fn all_calls(&self) -> usize {
        self.mutating_calls()
            + self.hosting.status_calls.load(Ordering::SeqCst) as usize
            + self.voice.probe_calls.load(Ordering::SeqCst)
    }

    pub fn orchestrator(&self, store: Arc<ProvisionRunRepository>) -> ProvisionOrchestrator {
        let settings = ProvisionSettings {
            schema_sql: "create table if not exists interviews (id uuid primary key);".to_string(),
            ..Default::default()
        };
        ProvisionOrchestrator::new(store, self.providers(), settings, self.alerts.clone())
            .with_retry_policies(fast_policies())
    }
}

pub fn transient(system: ProviderSystem) -> ProviderError {
    ProviderError::transient(system, "status 503 Service Unavailable")
}
