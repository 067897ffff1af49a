use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use charge_engine::{InvocationError, InvocationRunner, InvocationSummary};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
}

fn invocation_error_to_response(error: InvocationError) -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Run one invocation of the tick engine and return its summary
pub async fn trigger_invocation(State(runner): State<Arc<InvocationRunner>>) -> impl IntoResponse {
    match runner.invoke().await {
        Ok(summary) => (StatusCode::OK, Json::<InvocationSummary>(summary)).into_response(),
        Err(error) => invocation_error_to_response(error).into_response(),
    }
}
