use std::sync::Arc;

use crate::config::Config;
use crate::ledger::LinkStore;
use crate::observability::Metrics;
use crate::orchestrator::Orchestrator;
use crate::queue::CheckBroker;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: LinkStore,
    pub orchestrator: Arc<Orchestrator>,
    pub broker: Arc<CheckBroker>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: LinkStore,
        orchestrator: Arc<Orchestrator>,
        broker: Arc<CheckBroker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            orchestrator,
            broker,
            metrics,
        }
    }
}
