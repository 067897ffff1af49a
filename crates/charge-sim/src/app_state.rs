use std::sync::Arc;

use charge_engine::{
    BatchOrchestrator, InMemoryStore, InvocationRunner, SimulatorConfig, TracingNotificationSink,
};

use crate::config::Fixtures;

/// Shared application state
pub struct AppState {
    pub runner: Arc<InvocationRunner>,
}

impl AppState {
    /// Build the store, seed it and wire the engine around it
    pub async fn new(config: SimulatorConfig, fixtures: &Fixtures) -> anyhow::Result<Self> {
        let store = Arc::new(InMemoryStore::new([
            config.sessions_table.as_str(),
            config.stations_table.as_str(),
            config.error_logs_table.as_str(),
        ]));
        fixtures.seed(&store, &config).await?;

        let orchestrator =
            BatchOrchestrator::new(store, Arc::new(TracingNotificationSink), config);

        Ok(Self {
            runner: Arc::new(InvocationRunner::new(orchestrator)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_state_runs_an_invocation() {
        let state = AppState::new(SimulatorConfig::default(), &Fixtures::default())
            .await
            .unwrap();

        let summary = state.runner.invoke().await.unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.event_count, 0);
    }
}
