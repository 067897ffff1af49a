use async_trait::async_trait;
use charge_core::TickEvent;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

/// Destination of tick events. Delivery is fire-and-forget from the engine's
/// point of view: a failed emit is logged and otherwise ignored.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: &TickEvent) -> Result<(), NotifyError>;
}

/// Development sink that writes the rendered notification to the log instead
/// of sending it to the driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn emit(&self, event: &TickEvent) -> Result<(), NotifyError> {
        tracing::info!(
            event_type = event.event_type(),
            user_id = event.user_id(),
            session_id = %event.session_id(),
            "{}",
            event.message()
        );
        Ok(())
    }
}
