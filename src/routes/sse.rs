use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/events",
    params(("room_id" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Room event stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "No such room")
    )
)]
/// Stream a room's realtime events to spectators and score screens.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let receiver = sse_service::subscribe(&state, &room_id).await?;
    info!(room_id, "new SSE connection");
    Ok(sse_service::to_sse_stream(receiver, room_id))
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{room_id}/events", get(room_stream))
}
