use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the planning poker backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::root,
        crate::routes::rooms::fibonacci,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::get_room_state,
        crate::routes::rooms::list_tasks,
        crate::routes::rooms::create_task,
        crate::routes::rooms::create_task_legacy,
        crate::routes::rooms::set_active_task,
        crate::routes::rooms::complete_task,
        crate::routes::rooms::delete_task,
        crate::routes::rooms::cancel_task,
        crate::routes::rooms::cast_vote,
        crate::routes::rooms::reveal_cards,
        crate::routes::rooms::reset_votes,
        crate::routes::rooms::leave_room,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::RoomDto,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::JoinRoomResponse,
            crate::dto::room::UserDto,
            crate::dto::task::CreateTaskRequest,
            crate::dto::task::LegacyCreateTaskRequest,
            crate::dto::task::TaskDto,
            crate::dao::models::TaskStatus,
            crate::dto::actions::UserRequest,
            crate::dto::actions::TaskActionRequest,
            crate::dto::actions::CastVoteRequest,
            crate::dto::actions::ResetVotesRequest,
            crate::dto::actions::CompleteTaskRequest,
            crate::dto::actions::ActionResponse,
            crate::dto::actions::TaskCreatedResponse,
            crate::dto::actions::DeckResponse,
            crate::dto::actions::RootResponse,
            crate::dto::state::RoomState,
            crate::dto::state::VoteView,
            crate::dto::state::VoteDto,
            crate::dto::state::MaskedVote,
            crate::dto::ws::WsErrorMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room lifecycle and membership"),
        (name = "tasks", description = "Tasks estimated inside a room"),
        (name = "votes", description = "Card voting, reveal and reset"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "websocket", description = "Bidirectional room channel"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_room_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/api/rooms"));
        assert!(paths.contains_key("/api/rooms/{room_id}/votes"));
        assert!(paths.contains_key("/api/rooms/{room_id}/events"));
        assert!(paths.contains_key("/ws"));
    }
}
