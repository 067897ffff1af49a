//! Charging simulator API library
//!
//! Exposes the tick engine invocation to an external scheduler over HTTP.

mod invocation;

use std::sync::Arc;

use axum::{Router, routing::post};
use charge_engine::InvocationRunner;
use tower_http::trace::TraceLayer;

pub use crate::invocation::ErrorResponse;

/// Create the application router with all endpoints
pub fn create_app(runner: Arc<InvocationRunner>) -> Router {
    Router::new()
        .route("/invocations", post(invocation::trigger_invocation))
        .layer(TraceLayer::new_for_http())
        .with_state(runner)
}
