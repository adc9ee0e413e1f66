use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Volley Scorer Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::post_command,
        crate::routes::matches::get_match,
        crate::routes::matches::get_history,
        crate::routes::sse::match_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::command::CommandRequest,
            crate::dto::command::CommandResponse,
            crate::dto::match_state::MatchSnapshot,
            crate::dto::history::HistoryPage,
            crate::dto::history::HistoryEntryView,
            crate::dto::sse::Handshake,
            crate::dto::sse::HistoryAppendedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "match", description = "Match commands and read models"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
