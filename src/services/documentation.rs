use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Nest Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::room_snapshot,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::rooms::RoomSnapshot,
            crate::dto::ws::ClientFrame,
            crate::dto::ws::JoinRoomFrame,
            crate::dto::ws::StartGameFrame,
            crate::dto::ws::SubmitAnswerFrame,
            crate::dto::ws::EndGameFrame,
            crate::dto::events::ServerFrame,
            crate::dto::events::PlayerSummary,
            crate::dto::events::QuestionView,
            crate::dto::events::SessionSummary,
            crate::state::session::EndReason,
            crate::state::session::PlayerStanding,
            crate::state::session::LeaderboardDelta,
            crate::questions::model::Difficulty,
            crate::questions::model::AgeGroup,
            crate::questions::source::SourceTag,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room inspection and event streams"),
        (name = "players", description = "WebSocket operations for player clients"),
    )
)]
pub struct ApiDoc;
