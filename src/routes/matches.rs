use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        command::{CommandRequest, CommandResponse},
        history::{HistoryPage, HistoryQuery},
        match_state::MatchSnapshot,
    },
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Routes exposing the match engine.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/match", get(get_match))
        .route("/match/commands", post(post_command))
        .route("/match/history", get(get_history))
}

/// Apply one operator command to the match.
#[utoipa::path(
    post,
    path = "/match/commands",
    tag = "match",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Command applied", body = CommandResponse),
        (status = 400, description = "Malformed command"),
        (status = 409, description = "Command refused by a match rule"),
        (status = 500, description = "Client and engine disagree about the lineup")
    )
)]
pub async fn post_command(
    State(state): State<SharedState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    request.validate()?;
    let response = match_service::dispatch(&state, request).await?;
    Ok(Json(response))
}

/// Current match snapshot.
#[utoipa::path(
    get,
    path = "/match",
    tag = "match",
    responses(
        (status = 200, description = "Current match state", body = MatchSnapshot)
    )
)]
pub async fn get_match(State(state): State<SharedState>) -> Json<MatchSnapshot> {
    Json(match_service::snapshot(&state).await)
}

/// Newest history entries.
#[utoipa::path(
    get,
    path = "/match/history",
    tag = "match",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History page, newest first", body = HistoryPage),
        (status = 400, description = "Limit out of range")
    )
)]
pub async fn get_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, AppError> {
    query.validate()?;
    Ok(Json(match_service::history(&state, query.limit).await))
}
