use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::match_state::VisiblePhase;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process serves requests.
    pub status: String,
    /// Phase the match is in.
    pub phase: VisiblePhase,
    /// Connected SSE clients.
    pub sse_subscribers: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(phase: VisiblePhase, sse_subscribers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            phase,
            sse_subscribers,
        }
    }
}
