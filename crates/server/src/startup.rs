//! Wiring: store, provider clients, alerting and the orchestrator, built
//! once at boot from [`FactoryConfig`] plus environment secrets.

use std::sync::Arc;

use anyhow::{Context, Result};
use db::{DbError, ProvisionRunRepository};
use github::{GitHubClient, GitHubConfig};
use orchestrator::{
    AlertRouter, ProvisionOrchestrator, Providers, RetryPolicyRegistry, WaitMode,
};
use providers::{
    ElevenLabsClient, ElevenLabsConfig, EmailClient, EmailConfig, StripeClient, StripeConfig,
    SupabaseClient, SupabaseConfig, VercelClient, VercelConfig, WebhookNotifier,
};
use tracing::info;

use crate::config::FactoryConfig;
use crate::create_router;
use crate::state::AppState;

pub async fn open_store(database_url: &str) -> Result<Arc<ProvisionRunRepository>> {
    let pool = db::create_pool(database_url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(Arc::new(ProvisionRunRepository::new(pool)))
}

/// Provider clients for every external system. Missing credentials do not
/// fail here; they surface as configuration errors on the first call.
pub fn build_providers(config: &FactoryConfig) -> Result<Providers> {
    let provisioning = &config.provisioning;

    let source_control = GitHubClient::new(GitHubConfig {
        owner: provisioning.source_control_org.clone(),
        template: provisioning.template_repository.clone(),
        private: provisioning.private_repositories,
        ..GitHubConfig::from_env()
    })
    .context("Failed to build GitHub client")?;

    let mut supabase = SupabaseConfig::from_env();
    if provisioning.database_organization.is_some() {
        supabase.organization_id = provisioning.database_organization.clone();
    }
    if let Some(region) = &provisioning.database_region {
        supabase.region = region.clone();
    }

    let mut vercel = VercelConfig::from_env();
    if provisioning.hosting_team_id.is_some() {
        vercel.team_id = provisioning.hosting_team_id.clone();
    }

    let mut eleven = ElevenLabsConfig::from_env();
    if provisioning.voice_id.is_some() {
        eleven.voice_id = provisioning.voice_id.clone();
    }

    let mut stripe = StripeConfig::from_env();
    if provisioning.payment_price_id.is_some() {
        stripe.price_id = provisioning.payment_price_id.clone();
    }

    Ok(Providers {
        source_control: Arc::new(source_control),
        database: Arc::new(SupabaseClient::new(supabase)),
        hosting: Arc::new(VercelClient::new(vercel)),
        voice: Arc::new(ElevenLabsClient::new(eleven)),
        payment: Arc::new(StripeClient::new(stripe)),
    })
}

pub fn build_alerts(config: &FactoryConfig) -> AlertRouter {
    let mut email = EmailConfig::from_env();
    if let Some(from) = &config.alerts.email_from {
        email.from = from.clone();
    }

    AlertRouter::new(
        config.alerts.routing.clone(),
        Arc::new(WebhookNotifier::new()),
        Arc::new(EmailClient::new(email)),
    )
}

pub async fn build_orchestrator(
    config: &FactoryConfig,
    store: Arc<ProvisionRunRepository>,
) -> Result<Arc<ProvisionOrchestrator>> {
    let settings = config
        .provisioning
        .settings()
        .await
        .context("Failed to read schema SQL")?;
    let providers = build_providers(config)?;
    let alerts = Arc::new(build_alerts(config));
    let policies = RetryPolicyRegistry::default().with_overrides(&config.retry);

    Ok(Arc::new(
        ProvisionOrchestrator::new(store, providers, settings, alerts).with_retry_policies(policies),
    ))
}

/// Spawn a poll-mode orchestration for every run a previous process left
/// unfinished. Returns how many were spawned.
pub async fn resume_unfinished(orchestrator: &Arc<ProvisionOrchestrator>) -> Result<usize, DbError> {
    let runs = orchestrator.store().find_unfinished().await?;
    for run in &runs {
        info!(project_slug = %run.project_slug, state = %run.state, "Resuming unfinished run");
        orchestrator.spawn(run.project_slug.clone(), WaitMode::Poll);
    }
    Ok(runs.len())
}

pub async fn serve(config: FactoryConfig) -> Result<()> {
    let store = open_store(&config.server.database_url).await?;
    let orchestrator = build_orchestrator(&config, store).await?;

    if config.server.resume_on_startup {
        let resumed = resume_unfinished(&orchestrator).await?;
        if resumed > 0 {
            info!(count = resumed, "Resumed unfinished runs");
        }
    }

    let app = create_router(AppState::new(orchestrator));
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Server listening on {}", listener.local_addr()?);
    info!("Swagger UI at http://{}/swagger-ui", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
