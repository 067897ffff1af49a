//! Batch tick engine: drives every active charging session through one
//! invocation against the store and notification collaborators.

pub mod config;
pub mod notify;
mod orchestrator;
mod runner;
pub mod store;

pub use crate::config::SimulatorConfig;
pub use crate::notify::{NotificationSink, NotifyError, TracingNotificationSink};
pub use crate::orchestrator::{
    BatchOrchestrator, InvocationError, InvocationSummary, SessionError,
};
pub use crate::runner::InvocationRunner;
pub use crate::store::{Condition, InMemoryStore, RecordStore, StoreError};
