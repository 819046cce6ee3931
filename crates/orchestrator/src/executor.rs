use std::sync::Arc;

use db::{DbError, ProvisionRunRepository};
use factory_core::{
    validate_project_slug, ProvisionRun, ProvisionState, RunMetadata, UpdateRunRequest,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alerts::{AlertSink, FailureAlert};
use crate::error::{ProvisionError, Result};
use crate::resources::RunGuard;
use crate::retry::{RetryPolicyRegistry, RetryTracker};
use crate::state_machine::ProvisionStateMachine;
use crate::steps::{ProvisionSettings, Providers, StepOutcome, StepRunner};
use crate::verifiers::{
    DatabaseVerifier, HostingVerifier, SourceControlVerifier, StepVerifier, Verdict,
    VoiceAgentVerifier,
};

/// How a WAIT verdict is handled within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Sleep with the governing system's backoff and re-check, up to the
    /// policy's `max_polls`.
    Poll,
    /// Return immediately; the caller re-invokes later.
    Checkpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed,
    /// Parked at a checkpoint waiting on an external system.
    Waiting,
    /// The run was already complete; nothing was called.
    AlreadyComplete,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run: ProvisionRun,
    pub outcome: RunOutcome,
}

enum Attempt {
    Advance(RunMetadata),
    Wait(String),
}

pub struct ProvisionOrchestrator {
    store: Arc<ProvisionRunRepository>,
    steps: StepRunner,
    verifiers: Vec<(ProvisionState, Arc<dyn StepVerifier>)>,
    policies: Arc<RetryPolicyRegistry>,
    retries: RetryTracker,
    alerts: Arc<dyn AlertSink>,
    guard: RunGuard,
}

impl ProvisionOrchestrator {
    pub fn new(
        store: Arc<ProvisionRunRepository>,
        providers: Providers,
        settings: ProvisionSettings,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let verifiers = standard_verifiers(&providers, &settings);
        let policies = Arc::new(RetryPolicyRegistry::default());

        Self {
            retries: RetryTracker::new(Arc::clone(&store), Arc::clone(&policies)),
            steps: StepRunner::new(providers, settings),
            store,
            verifiers,
            policies,
            alerts,
            guard: RunGuard::new(),
        }
    }

    pub fn with_retry_policies(mut self, policies: RetryPolicyRegistry) -> Self {
        self.policies = Arc::new(policies);
        self.retries = RetryTracker::new(Arc::clone(&self.store), Arc::clone(&self.policies));
        self
    }

    pub fn with_verifiers(
        mut self,
        state: ProvisionState,
        verifiers: Vec<Arc<dyn StepVerifier>>,
    ) -> Self {
        self.verifiers.retain(|(s, _)| *s != state);
        self.verifiers
            .extend(verifiers.into_iter().map(|verifier| (state, verifier)));
        self
    }

    pub fn with_run_guard(mut self, guard: RunGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn store(&self) -> &Arc<ProvisionRunRepository> {
        &self.store
    }

    pub fn settings(&self) -> &ProvisionSettings {
        self.steps.settings()
    }

    pub fn is_active(&self, project_slug: &str) -> bool {
        self.guard.is_active(project_slug)
    }

    /// Return the run for `project_slug`, creating it at `INIT` when absent.
    /// Losing a creation race to another caller is not an error.
    pub async fn ensure_run(&self, project_slug: &str) -> Result<ProvisionRun> {
        validate_project_slug(project_slug)?;

        if let Some(run) = self.store.find_by_slug(project_slug).await? {
            return Ok(run);
        }

        match self.store.create(project_slug).await {
            Ok(run) => {
                info!(project_slug = %project_slug, "Provision run created");
                Ok(run)
            }
            Err(DbError::AlreadyExists(_)) => Ok(self.store.get(project_slug).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Resume an existing run. Unlike [`Self::run`] this never creates one.
    pub async fn resume(&self, project_slug: &str, mode: WaitMode) -> Result<RunReport> {
        validate_project_slug(project_slug)?;
        if self.store.find_by_slug(project_slug).await?.is_none() {
            return Err(ProvisionError::RunNotFound(project_slug.to_string()));
        }
        self.run(project_slug, mode).await
    }

    /// Drive the run for `project_slug` until it completes, fails, or parks
    /// at a WAIT checkpoint.
    pub async fn run(&self, project_slug: &str, mode: WaitMode) -> Result<RunReport> {
        validate_project_slug(project_slug)?;
        let _lease = self
            .guard
            .try_acquire(project_slug)
            .ok_or_else(|| ProvisionError::RunAlreadyActive(project_slug.to_string()))?;

        let mut run = self.ensure_run(project_slug).await?;

        match run.state {
            ProvisionState::Complete => {
                debug!(project_slug = %project_slug, "Run already complete");
                return Ok(RunReport {
                    run,
                    outcome: RunOutcome::AlreadyComplete,
                });
            }
            ProvisionState::Failed => {
                let at = run.failed_state.unwrap_or(ProvisionState::Init);
                ProvisionStateMachine::validate_transition(&ProvisionState::Failed, &at)?;
                run = self
                    .store
                    .update(project_slug, &UpdateRunRequest::reopen(at))
                    .await?;
                info!(project_slug = %project_slug, state = %at, "Resuming failed run");
            }
            _ => {}
        }

        self.drive(run, mode).await
    }

    /// Detach a `run` onto the runtime. Results reach observers only through
    /// the store.
    pub fn spawn(self: &Arc<Self>, project_slug: String, mode: WaitMode) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            match orchestrator.run(&project_slug, mode).await {
                Ok(report) => info!(
                    project_slug = %project_slug,
                    state = %report.run.state,
                    outcome = ?report.outcome,
                    "Provisioning invocation finished"
                ),
                Err(ProvisionError::RunAlreadyActive(_)) => {
                    debug!(project_slug = %project_slug, "Provisioning already in progress")
                }
                Err(e) => error!(project_slug = %project_slug, error = %e, "Provisioning invocation aborted"),
            }
        })
    }

    async fn drive(&self, mut run: ProvisionRun, mode: WaitMode) -> Result<RunReport> {
        let project_slug = run.project_slug.clone();
        let mut polls = 0u32;

        loop {
            let state = run.state;
            let Some(system) = state.system() else {
                let outcome = if state == ProvisionState::Complete {
                    info!(project_slug = %project_slug, "Provisioning complete");
                    RunOutcome::Completed
                } else {
                    RunOutcome::Failed
                };
                return Ok(RunReport { run, outcome });
            };
            let policy = self.policies.policy(system);

            match self.attempt(&mut run).await {
                Ok(Attempt::Advance(observed)) => {
                    let next = ProvisionStateMachine::next_state(&state).ok_or_else(|| {
                        ProvisionError::InvalidTransition {
                            from: state.as_str().to_string(),
                            to: "<none>".to_string(),
                        }
                    })?;
                    ProvisionStateMachine::validate_transition(&state, &next)?;

                    run = self
                        .store
                        .update(&project_slug, &UpdateRunRequest::advance(next, observed))
                        .await?;
                    polls = 0;
                    info!(project_slug = %project_slug, from = %state, to = %next, "Provision state advanced");
                }
                Ok(Attempt::Wait(reason)) => match mode {
                    WaitMode::Checkpoint => {
                        info!(project_slug = %project_slug, state = %state, reason = %reason, "Waiting at checkpoint");
                        return Ok(RunReport {
                            run,
                            outcome: RunOutcome::Waiting,
                        });
                    }
                    WaitMode::Poll if polls >= policy.max_polls => {
                        warn!(
                            project_slug = %project_slug,
                            state = %state,
                            polls = polls,
                            reason = %reason,
                            "Still waiting after maximum polls, parking run"
                        );
                        return Ok(RunReport {
                            run,
                            outcome: RunOutcome::Waiting,
                        });
                    }
                    WaitMode::Poll => {
                        polls += 1;
                        let delay = policy.delay_for(polls);
                        debug!(
                            project_slug = %project_slug,
                            state = %state,
                            attempt = polls,
                            delay_ms = delay.as_millis() as u64,
                            reason = %reason,
                            "Waiting before re-check"
                        );
                        tokio::time::sleep(delay).await;
                        run = self.store.get(&project_slug).await?;
                    }
                },
                Err(err) => {
                    if !err.is_transient() || !self.retries.should_retry(&project_slug).await? {
                        return match err {
                            ProvisionError::TransientProvider { .. }
                            | ProvisionError::ProviderRejected { .. }
                            | ProvisionError::Configuration { .. }
                            | ProvisionError::VerificationFailed { .. } => self.fail(run, err).await,
                            other => Err(other),
                        };
                    }

                    run = self.retries.record_retry(&project_slug).await?;
                    let delay = policy.delay_for(run.metadata.retry_count);
                    warn!(
                        project_slug = %project_slug,
                        state = %state,
                        system = %system,
                        attempt = run.metadata.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Perform the state's action, persist what it produced, then consult
    /// the state's verifiers in order.
    async fn attempt(&self, run: &mut ProvisionRun) -> Result<Attempt> {
        loop {
            match self.steps.execute(run).await? {
                StepOutcome::Pending(reason) => return Ok(Attempt::Wait(reason)),
                StepOutcome::Progress(metadata) => self.record(run, metadata).await?,
                StepOutcome::Done(metadata) => {
                    self.record(run, metadata).await?;
                    break;
                }
            }
        }

        let mut observed = RunMetadata::default();
        for verifier in self.verifiers_for(run.state) {
            match verifier.verify(&run.metadata).await {
                Verdict::Advance(metadata) => observed.merge(metadata),
                Verdict::Wait(reason) => {
                    return Ok(Attempt::Wait(format!("{}: {}", verifier.system(), reason)))
                }
                Verdict::Fail(reason) => {
                    return Err(ProvisionError::verification_failed(verifier.system(), reason))
                }
            }
        }

        Ok(Attempt::Advance(observed))
    }

    async fn record(&self, run: &mut ProvisionRun, metadata: RunMetadata) -> Result<()> {
        if metadata != RunMetadata::default() {
            *run = self
                .store
                .update(&run.project_slug, &UpdateRunRequest::metadata(metadata))
                .await?;
        }
        Ok(())
    }

    fn verifiers_for(&self, state: ProvisionState) -> impl Iterator<Item = &Arc<dyn StepVerifier>> {
        self.verifiers
            .iter()
            .filter(move |(s, _)| *s == state)
            .map(|(_, verifier)| verifier)
    }

    async fn fail(&self, run: ProvisionRun, err: ProvisionError) -> Result<RunReport> {
        let at = run.state;
        ProvisionStateMachine::validate_transition(&at, &ProvisionState::Failed)?;

        let message = err.run_error();
        error!(project_slug = %run.project_slug, state = %at, error = %message, "Provisioning failed");

        let run = self
            .store
            .update(&run.project_slug, &UpdateRunRequest::failed(at, message.clone()))
            .await?;

        self.alerts
            .send_alert(&FailureAlert {
                project_slug: run.project_slug.clone(),
                state: at,
                error: message,
                metadata: run.metadata.clone(),
            })
            .await;

        Ok(RunReport {
            run,
            outcome: RunOutcome::Failed,
        })
    }
}

fn standard_verifiers(
    providers: &Providers,
    settings: &ProvisionSettings,
) -> Vec<(ProvisionState, Arc<dyn StepVerifier>)> {
    let source_control: Arc<dyn StepVerifier> = Arc::new(SourceControlVerifier::new(
        Arc::clone(&providers.source_control),
        settings.verification_path.clone(),
    ));
    let hosting: Arc<dyn StepVerifier> =
        Arc::new(HostingVerifier::new(Arc::clone(&providers.hosting)));
    let database: Arc<dyn StepVerifier> =
        Arc::new(DatabaseVerifier::new(Arc::clone(&providers.hosting)));
    let voice: Arc<dyn StepVerifier> = Arc::new(VoiceAgentVerifier::new(
        Arc::clone(&providers.voice),
        settings.probe_message.clone(),
    ));

    vec![
        (ProvisionState::GithubCreating, source_control),
        (ProvisionState::VercelDeploying, hosting),
        (ProvisionState::VercelDeploying, database),
        (ProvisionState::VercelDeploying, voice),
    ]
}
