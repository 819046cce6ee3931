//! Provisioning orchestrator: drives a tenant's run through the ordered
//! provisioning states, with verifiers, per-system retry budgets and failure
//! alerting.

pub mod alerts;
pub mod error;
pub mod executor;
pub mod resources;
pub mod retry;
pub mod state_machine;
pub mod steps;
pub mod verifiers;

pub use alerts::{AlertRouter, AlertRoutingConfig, AlertSink, AlertTarget, FailureAlert};
pub use error::{ProvisionError, Result};
pub use executor::{ProvisionOrchestrator, RunOutcome, RunReport, WaitMode};
pub use resources::{RunGuard, RunLease};
pub use retry::{RetryPolicy, RetryPolicyRegistry, RetryTracker};
pub use state_machine::ProvisionStateMachine;
pub use steps::{ProvisionSettings, Providers, StepOutcome, StepRunner};
pub use verifiers::{StepVerifier, Verdict};
