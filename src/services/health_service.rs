use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the liveness payload and the current room count.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.rooms().len())
}
