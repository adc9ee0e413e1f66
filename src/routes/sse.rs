use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    dto::sse::Handshake,
    services::{match_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/match",
    tag = "sse",
    responses((status = 200, description = "Match SSE stream (`handshake`, `match.updated`, `history.appended`)", content_type = "text/event-stream", body = String))
)]
/// Stream match updates to renderers.
pub async fn match_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_match(&state);
    info!("New match SSE connection");
    let handshake = Handshake {
        stream: "match".into(),
        message: "match stream connected".into(),
        snapshot: match_service::snapshot(&state).await,
    };
    sse_service::to_sse_stream(receiver, sse_service::handshake_event(&handshake))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/match", get(match_stream))
}
