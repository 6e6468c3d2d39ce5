use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/api/rooms/{room_id}/events",
    tag = "sse",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    responses(
        (status = 200, description = "Room snapshots, starting with the current one", content_type = "text/event-stream", body = String),
        (status = 404, description = "Room not found"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Stream `state_update` and `reveal_votes` events of one room.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_room(&state, &room_id).await?;
    info!(room_id = %subscription.room_id, "new room SSE connection");
    Ok(sse_service::to_sse_stream(state, subscription))
}

/// Configure the SSE endpoints, mounted under `/api`.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{room_id}/events", get(room_stream))
}
