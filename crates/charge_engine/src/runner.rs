use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::orchestrator::{BatchOrchestrator, InvocationError, InvocationSummary};

/// Serialises the invocations triggered from this process.
///
/// The scheduler loop and the HTTP trigger share one runner, so two
/// invocations never tick the same sessions concurrently from here.
pub struct InvocationRunner {
    orchestrator: BatchOrchestrator,
    in_flight: Mutex<()>,
}

impl InvocationRunner {
    pub fn new(orchestrator: BatchOrchestrator) -> Self {
        InvocationRunner {
            orchestrator,
            in_flight: Mutex::new(()),
        }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    pub async fn invoke(&self) -> Result<InvocationSummary, InvocationError> {
        let _guard = self.in_flight.lock().await;
        self.orchestrator.run_invocation().await
    }

    /// Invoke on a fixed cadence until the future is dropped. A failed
    /// invocation is logged and retried on the next tick.
    pub async fn run_every(&self, cadence: Duration) {
        tracing::info!("Scheduling an invocation every {:?}", cadence);
        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match self.invoke().await {
                Ok(summary) => tracing::debug!(?summary, "Scheduled invocation finished"),
                Err(error) => tracing::error!(%error, "Scheduled invocation failed"),
            }
        }
    }
}
