use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::rooms::RoomSnapshot, error::AppError, services::room_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    params(("room_id" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Current room state", body = RoomSnapshot),
        (status = 404, description = "No such room")
    )
)]
/// Return a point-in-time snapshot of a room.
pub async fn room_snapshot(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = room_service::snapshot(&state, &room_id).await?;
    Ok(Json(snapshot))
}

/// Configure the room inspection routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{room_id}", get(room_snapshot))
}
