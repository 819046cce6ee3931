use std::sync::Arc;

use db::ProvisionRunRepository;
use orchestrator::ProvisionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ProvisionOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ProvisionOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn store(&self) -> &ProvisionRunRepository {
        self.orchestrator.store()
    }
}
