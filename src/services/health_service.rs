use crate::{
    dto::{health::HealthResponse, match_state::VisiblePhase},
    state::SharedState,
};

/// Report liveness together with the coarse match phase.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let phase = state.read_phase(|phase| VisiblePhase::from(phase)).await;
    HealthResponse::ok(phase, state.match_sse().receiver_count())
}
