use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        actions::{
            ActionResponse, CastVoteRequest, CompleteTaskRequest, DeckResponse, ResetVotesRequest,
            RootResponse, TaskActionRequest, TaskCreatedResponse, UserRequest,
        },
        room::{CreateRoomRequest, JoinRoomRequest, JoinRoomResponse, RoomDto},
        state::RoomState,
        task::{CreateTaskRequest, LegacyCreateTaskRequest, TaskDto},
    },
    error::AppError,
    services::room_service::{self, ActionOutcome},
    state::{SharedState, deck::DECK},
};

/// Room, task and voting endpoints, mounted under `/api`.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/", get(root))
        .route("/fibonacci", get(fibonacci))
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/state", get(get_room_state))
        .route("/rooms/{room_id}/tasks", get(list_tasks).post(create_task))
        .route("/tasks", post(create_task_legacy))
        .route("/rooms/{room_id}/tasks/active", post(set_active_task))
        .route("/rooms/{room_id}/tasks/complete", post(complete_task))
        .route("/rooms/{room_id}/tasks/delete", post(delete_task))
        .route("/rooms/{room_id}/tasks/cancel", post(cancel_task))
        .route("/rooms/{room_id}/votes", post(cast_vote))
        .route("/rooms/{room_id}/reveal", post(reveal_cards))
        .route("/rooms/{room_id}/reset", post(reset_votes))
        .route("/rooms/{room_id}/leave", post(leave_room))
}

fn acknowledge<T>(outcome: ActionOutcome<T>) -> Json<ActionResponse> {
    Json(ActionResponse {
        applied: outcome.is_applied(),
    })
}

fn task_created(outcome: ActionOutcome<TaskDto>) -> Json<TaskCreatedResponse> {
    let task = outcome.applied();
    Json(TaskCreatedResponse {
        applied: task.is_some(),
        task,
    })
}

#[utoipa::path(
    get,
    path = "/api",
    tag = "rooms",
    responses((status = 200, description = "API banner", body = RootResponse))
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Planning Poker API".into(),
    })
}

#[utoipa::path(
    get,
    path = "/api/fibonacci",
    tag = "rooms",
    responses((status = 200, description = "Cards of the estimation deck", body = DeckResponse))
)]
/// List the cards players can vote with.
pub async fn fibonacci() -> Json<DeckResponse> {
    Json(DeckResponse {
        values: DECK.to_vec(),
    })
}

#[utoipa::path(
    post,
    path = "/api/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomDto),
        (status = 400, description = "Invalid room name"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<RoomDto>, AppError> {
    Ok(Json(room_service::create_room(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    responses(
        (status = 200, description = "Room found", body = RoomDto),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDto>, AppError> {
    Ok(Json(room_service::get_room(&state, &room_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/join",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "User joined; the first member is admin", body = JoinRoomResponse),
        (status = 404, description = "Room not found")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    Ok(Json(
        room_service::join_room(&state, &room_id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{room_id}/state",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    responses(
        (status = 200, description = "Room snapshot with masked votes", body = RoomState),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room_state(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomState>, AppError> {
    Ok(Json(room_service::get_room_state(&state, &room_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{room_id}/tasks",
    tag = "tasks",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    responses((status = 200, description = "Tasks of the room", body = [TaskDto]))
)]
pub async fn list_tasks(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<TaskDto>>, AppError> {
    Ok(Json(room_service::list_tasks(&state, &room_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/tasks",
    tag = "tasks",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = CreateTaskRequest,
    responses((status = 200, description = "Task added unless the room is missing", body = TaskCreatedResponse))
)]
pub async fn create_task(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<CreateTaskRequest>>,
) -> Result<Json<TaskCreatedResponse>, AppError> {
    let outcome = room_service::create_task(&state, &room_id, payload).await?;
    Ok(task_created(outcome))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "tasks",
    request_body = LegacyCreateTaskRequest,
    responses((status = 200, description = "Task added unless the room is missing", body = TaskCreatedResponse))
)]
/// Same as the room-scoped route with the room id carried in the body.
pub async fn create_task_legacy(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<LegacyCreateTaskRequest>>,
) -> Result<Json<TaskCreatedResponse>, AppError> {
    let (room_id, request) = payload.into_parts();
    let outcome = room_service::create_task(&state, &room_id, request).await?;
    Ok(task_created(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/tasks/active",
    tag = "tasks",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = TaskActionRequest,
    responses((status = 200, description = "Whether the task became active", body = ActionResponse))
)]
pub async fn set_active_task(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<TaskActionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::set_active_task(&state, &room_id, payload).await?;
    Ok(acknowledge(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/tasks/complete",
    tag = "tasks",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = CompleteTaskRequest,
    responses((status = 200, description = "Whether the task was completed", body = ActionResponse))
)]
pub async fn complete_task(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<CompleteTaskRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::complete_task(&state, &room_id, payload).await?;
    Ok(acknowledge(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/tasks/delete",
    tag = "tasks",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = TaskActionRequest,
    responses((status = 200, description = "Whether the task was deleted", body = ActionResponse))
)]
pub async fn delete_task(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<TaskActionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::delete_task(&state, &room_id, payload).await?;
    Ok(acknowledge(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/tasks/cancel",
    tag = "tasks",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = TaskActionRequest,
    responses((status = 200, description = "Whether the task was cancelled", body = ActionResponse))
)]
pub async fn cancel_task(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<TaskActionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::cancel_task(&state, &room_id, payload).await?;
    Ok(acknowledge(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/votes",
    tag = "votes",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = CastVoteRequest,
    responses((status = 200, description = "Whether the vote was recorded", body = ActionResponse))
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<CastVoteRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::cast_vote(&state, Some(&room_id), payload).await?;
    Ok(acknowledge(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/reveal",
    tag = "votes",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = UserRequest,
    responses((status = 200, description = "Whether the cards were revealed", body = ActionResponse))
)]
pub async fn reveal_cards(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<UserRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::reveal_cards(&state, &room_id, &payload.user_id).await?;
    Ok(acknowledge(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/reset",
    tag = "votes",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = ResetVotesRequest,
    responses((status = 200, description = "Whether the votes were reset", body = ActionResponse))
)]
pub async fn reset_votes(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<ResetVotesRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::reset_votes(&state, &room_id, payload).await?;
    Ok(acknowledge(outcome))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{room_id}/leave",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier, case-insensitive")),
    request_body = UserRequest,
    responses((status = 200, description = "Whether the user was removed", body = ActionResponse))
)]
/// Remove a member; the last one out deletes the room.
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<UserRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = room_service::leave_room(&state, &room_id, &payload.user_id).await?;
    Ok(acknowledge(outcome))
}
