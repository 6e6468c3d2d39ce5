//! Room action handlers shared by the HTTP routes and the WebSocket dispatcher.
//!
//! Every mutating handler runs under the room gate, checks its preconditions before the
//! first write and broadcasts the resulting snapshot before releasing the gate.

use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{RoomEntity, RoomPatch, TaskEntity, TaskPatch, TaskStatus, UserEntity, VoteEntity},
        poker_store::PokerStore,
        storage::StorageError,
    },
    dto::{
        actions::{CastVoteRequest, CompleteTaskRequest, ResetVotesRequest, TaskActionRequest},
        room::{CreateRoomRequest, JoinRoomRequest, JoinRoomResponse, RoomDto, UserDto},
        state::RoomState,
        task::{CreateTaskRequest, TaskDto},
    },
    error::{ActionRejection, ServiceError},
    services::{
        broadcast::{broadcast_reveal, broadcast_room_state},
        room_state::{Visibility, all_voted, assemble},
    },
    state::{
        SharedState,
        deck::{generate_room_id, normalize_room_id},
    },
};

/// Result of a broadcasting action whose preconditions may not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome<T = ()> {
    /// The store was updated and the room notified.
    Applied(T),
    /// Nothing was written or broadcast.
    Discarded(ActionRejection),
}

impl<T> ActionOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            ActionOutcome::Applied(value) => Some(value),
            ActionOutcome::Discarded(_) => None,
        }
    }
}

/// Turn precondition failures into a discarded outcome, keep every other error.
fn settle<T>(
    action: &'static str,
    result: Result<T, ServiceError>,
) -> Result<ActionOutcome<T>, ServiceError> {
    match result {
        Ok(value) => Ok(ActionOutcome::Applied(value)),
        Err(ServiceError::Rejected(reason)) => Ok(discard(action, reason)),
        Err(err) => Err(err),
    }
}

fn discard<T>(action: &'static str, reason: ActionRejection) -> ActionOutcome<T> {
    debug!(action, reason = %reason, "action discarded");
    ActionOutcome::Discarded(reason)
}

fn room_not_found(room_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("room `{room_id}` not found"))
}

/// Open a new room with a fresh identifier.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomDto, ServiceError> {
    let store = state.require_store().await?;
    let room = insert_fresh_room(store.as_ref(), request.name.trim(), generate_room_id).await?;
    info!(room_id = %room.id, name = %room.name, "room created");
    Ok(room.into())
}

/// Attempts at drawing an unused room id before giving up.
const ROOM_ID_ATTEMPTS: usize = 5;

/// Insert a room under the first id from `next_id` that is not taken yet.
async fn insert_fresh_room(
    store: &dyn PokerStore,
    name: &str,
    mut next_id: impl FnMut() -> String,
) -> Result<RoomEntity, ServiceError> {
    for _ in 0..ROOM_ID_ATTEMPTS {
        let room = RoomEntity {
            id: next_id(),
            name: name.to_owned(),
            created_at: SystemTime::now(),
            cards_revealed: false,
            active_task_id: None,
        };
        match store.insert_room(room.clone()).await {
            Ok(()) => return Ok(room),
            Err(StorageError::Duplicate { id, .. }) => {
                warn!(room_id = %id, "generated room id already taken, drawing another");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(ServiceError::Internal(format!(
        "no free room id after {ROOM_ID_ATTEMPTS} attempts"
    )))
}

pub async fn get_room(state: &SharedState, room_id: &str) -> Result<RoomDto, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;
    store
        .find_room(&room_id)
        .await?
        .map(Into::into)
        .ok_or_else(|| room_not_found(&room_id))
}

/// Masked snapshot of the room, as a client would receive it.
pub async fn get_room_state(state: &SharedState, room_id: &str) -> Result<RoomState, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;
    assemble(store.as_ref(), &room_id, Visibility::Masked)
        .await?
        .ok_or_else(|| room_not_found(&room_id))
}

/// Tasks of the room in creation order; unknown rooms have none.
pub async fn list_tasks(state: &SharedState, room_id: &str) -> Result<Vec<TaskDto>, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;
    let tasks = store.list_tasks(&room_id).await?;
    Ok(tasks.into_iter().map(Into::into).collect())
}

/// Add a member to the room. The first member becomes its admin.
pub async fn join_room(
    state: &SharedState,
    room_id: &str,
    request: JoinRoomRequest,
) -> Result<JoinRoomResponse, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    // Counting and inserting under the gate keeps two first joiners from both becoming admin.
    state
        .run_in_room(&room_id, async {
            let room = store
                .find_room(&room_id)
                .await?
                .ok_or_else(|| room_not_found(&room_id))?;

            let is_admin = store.count_users(&room_id).await? == 0;
            let user = UserEntity {
                id: Uuid::new_v4().to_string(),
                room_id: room_id.clone(),
                name: request.name.trim().to_owned(),
                is_admin,
                is_spectator: request.is_spectator,
            };
            store.insert_user(user.clone()).await?;

            info!(
                room_id = %room_id,
                user_id = %user.id,
                is_admin,
                is_spectator = user.is_spectator,
                "user joined room"
            );
            Ok(JoinRoomResponse {
                user: UserDto::new(user, false),
                room: room.into(),
            })
        })
        .await
}

/// Check that a connection may bind to `user_id` in the room.
pub async fn check_membership(
    state: &SharedState,
    room_id: &str,
    user_id: &str,
) -> Result<ActionOutcome<UserEntity>, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;
    settle(
        "join_room",
        load_member(store.as_ref(), &room_id, user_id).await,
    )
}

/// Push the current masked state of the room, e.g. after a new subscriber joined.
pub async fn announce(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;
    state
        .run_in_room(&room_id, async {
            broadcast_room_state(state, store.as_ref(), &room_id).await?;
            Ok(())
        })
        .await
}

pub async fn create_task(
    state: &SharedState,
    room_id: &str,
    request: CreateTaskRequest,
) -> Result<ActionOutcome<TaskDto>, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            load_room(store.as_ref(), &room_id).await?;

            let task = TaskEntity {
                id: Uuid::new_v4().to_string(),
                room_id: room_id.clone(),
                title: request.title.trim().to_owned(),
                description: request.description.unwrap_or_default(),
                status: TaskStatus::Pending,
                final_score: None,
            };
            store.insert_task(task.clone()).await?;
            info!(room_id = %room_id, task_id = %task.id, "task added");

            broadcast_room_state(state, store.as_ref(), &room_id).await?;
            Ok(TaskDto::from(task))
        })
        .await;

    settle("add_task", result)
}

/// Make `task_id` the task under estimation, starting it from a clean slate.
pub async fn set_active_task(
    state: &SharedState,
    room_id: &str,
    request: TaskActionRequest,
) -> Result<ActionOutcome, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            load_room(store, &room_id).await?;
            ensure_admin(store, &room_id, &request.user_id).await?;
            let task = load_room_task(store, &room_id, &request.task_id).await?;

            let demoted = store.demote_active_tasks(&room_id).await?;
            store
                .update_task(&task.id, TaskPatch::status(TaskStatus::Active))
                .await?;
            store
                .update_room(&room_id, RoomPatch::activate(task.id.clone()))
                .await?;
            let cleared = store.delete_task_votes(&task.id).await?;
            info!(
                room_id = %room_id,
                task_id = %task.id,
                demoted,
                cleared_votes = cleared,
                "active task set"
            );

            broadcast_room_state(state, store, &room_id).await?;
            Ok(())
        })
        .await;

    settle("set_active_task", result)
}

/// Record a vote, revealing the cards once every voter is done.
///
/// Without `room_hint` the room is taken from the task.
pub async fn cast_vote(
    state: &SharedState,
    room_hint: Option<&str>,
    request: CastVoteRequest,
) -> Result<ActionOutcome, ServiceError> {
    let store = state.require_store().await?;
    let room_id = match room_hint {
        Some(room_id) => normalize_room_id(room_id),
        None => match store.find_task(&request.task_id).await? {
            Some(task) => task.room_id,
            None => {
                return Ok(discard(
                    "cast_vote",
                    ActionRejection::TaskNotFound(request.task_id),
                ));
            }
        },
    };

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            let user = load_member(store, &room_id, &request.user_id).await?;
            if user.is_spectator {
                return Err(ActionRejection::Spectator(user.id).into());
            }
            let task = load_room_task(store, &room_id, &request.task_id).await?;
            let room = load_room(store, &room_id).await?;
            if room.cards_revealed {
                return Err(ActionRejection::AlreadyRevealed(room.id).into());
            }

            store
                .replace_vote(VoteEntity {
                    id: Uuid::new_v4().to_string(),
                    task_id: task.id.clone(),
                    user_id: user.id.clone(),
                    value: request.value.as_vote_value(),
                })
                .await?;
            debug!(room_id = %room_id, task_id = %task.id, user_id = %user.id, "vote recorded");

            if all_voted(store, &room_id, &task.id).await? {
                store
                    .update_room(&room_id, RoomPatch::revealed(true))
                    .await?;
                info!(room_id = %room_id, task_id = %task.id, "everyone voted; cards revealed");
                broadcast_reveal(state, store, &room_id).await?;
            } else {
                broadcast_room_state(state, store, &room_id).await?;
            }
            Ok(())
        })
        .await;

    settle("cast_vote", result)
}

/// Show every vote of the active task, whether or not everyone voted.
pub async fn reveal_cards(
    state: &SharedState,
    room_id: &str,
    user_id: &str,
) -> Result<ActionOutcome, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            load_room(store, &room_id).await?;
            ensure_admin(store, &room_id, user_id).await?;

            store
                .update_room(&room_id, RoomPatch::revealed(true))
                .await?;
            info!(room_id = %room_id, "cards revealed by admin");

            broadcast_reveal(state, store, &room_id).await?;
            Ok(())
        })
        .await;

    settle("reveal_cards", result)
}

/// Drop the votes of a task (when given) and hide the cards again.
pub async fn reset_votes(
    state: &SharedState,
    room_id: &str,
    request: ResetVotesRequest,
) -> Result<ActionOutcome, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            load_room(store, &room_id).await?;
            ensure_admin(store, &room_id, &request.user_id).await?;

            let cleared = match request.task_id.as_deref() {
                Some(task_id) => {
                    let task = load_room_task(store, &room_id, task_id).await?;
                    store.delete_task_votes(&task.id).await?
                }
                None => 0,
            };
            store
                .update_room(&room_id, RoomPatch::revealed(false))
                .await?;
            info!(room_id = %room_id, cleared_votes = cleared, "votes reset");

            broadcast_room_state(state, store, &room_id).await?;
            Ok(())
        })
        .await;

    settle("reset_votes", result)
}

/// Close a task with its final estimate and leave the room without an active task.
pub async fn complete_task(
    state: &SharedState,
    room_id: &str,
    request: CompleteTaskRequest,
) -> Result<ActionOutcome, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            load_room(store, &room_id).await?;
            ensure_admin(store, &room_id, &request.user_id).await?;
            let task = load_room_task(store, &room_id, &request.task_id).await?;

            let final_score = request.final_score.trim().to_owned();
            store
                .update_task(&task.id, TaskPatch::completed(final_score.clone()))
                .await?;
            // Cleared even when the completed task was not the active one.
            store
                .update_room(&room_id, RoomPatch::clear_active_task())
                .await?;
            info!(room_id = %room_id, task_id = %task.id, final_score = %final_score, "task completed");

            broadcast_room_state(state, store, &room_id).await?;
            Ok(())
        })
        .await;

    settle("complete_task", result)
}

/// Remove a task together with its votes.
pub async fn delete_task(
    state: &SharedState,
    room_id: &str,
    request: TaskActionRequest,
) -> Result<ActionOutcome, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            let room = load_room(store, &room_id).await?;
            ensure_admin(store, &room_id, &request.user_id).await?;
            let task = load_room_task(store, &room_id, &request.task_id).await?;

            if room.active_task_id.as_deref() == Some(task.id.as_str()) {
                store
                    .update_room(&room_id, RoomPatch::clear_active_task())
                    .await?;
            }
            store.delete_task(&task.id).await?;
            let removed = store.delete_task_votes(&task.id).await?;
            info!(room_id = %room_id, task_id = %task.id, removed_votes = removed, "task deleted");

            broadcast_room_state(state, store, &room_id).await?;
            Ok(())
        })
        .await;

    settle("delete_task", result)
}

/// Drop a task from the estimation queue. Its votes are kept.
pub async fn cancel_task(
    state: &SharedState,
    room_id: &str,
    request: TaskActionRequest,
) -> Result<ActionOutcome, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            let room = load_room(store, &room_id).await?;
            ensure_admin(store, &room_id, &request.user_id).await?;
            let task = load_room_task(store, &room_id, &request.task_id).await?;

            if room.active_task_id.as_deref() == Some(task.id.as_str()) {
                store
                    .update_room(&room_id, RoomPatch::clear_active_task())
                    .await?;
            }
            store
                .update_task(&task.id, TaskPatch::status(TaskStatus::Cancelled))
                .await?;
            info!(room_id = %room_id, task_id = %task.id, "task cancelled");

            broadcast_room_state(state, store, &room_id).await?;
            Ok(())
        })
        .await;

    settle("cancel_task", result)
}

/// Remove a member. The last member out deletes the room with its tasks and votes.
///
/// Applied outcomes carry whether the room was deleted.
pub async fn leave_room(
    state: &SharedState,
    room_id: &str,
    user_id: &str,
) -> Result<ActionOutcome<bool>, ServiceError> {
    let room_id = normalize_room_id(room_id);
    let store = state.require_store().await?;

    let result = state
        .run_in_room(&room_id, async {
            let store = store.as_ref();
            let user = load_member(store, &room_id, user_id).await?;

            store.delete_user(&user.id).await?;
            info!(room_id = %room_id, user_id = %user.id, "user left room");
            broadcast_room_state(state, store, &room_id).await?;

            if store.count_users(&room_id).await? > 0 {
                return Ok(false);
            }

            let task_ids = store.task_ids(&room_id).await?;
            let votes = store.delete_votes_for_tasks(task_ids).await?;
            let tasks = store.delete_room_tasks(&room_id).await?;
            store.delete_room(&room_id).await?;
            info!(room_id = %room_id, tasks, votes, "empty room deleted");
            Ok(true)
        })
        .await;

    let outcome = settle("leave_room", result)?;
    if outcome == ActionOutcome::Applied(true) {
        state.forget_room(&room_id);
    }
    Ok(outcome)
}

async fn load_room(store: &dyn PokerStore, room_id: &str) -> Result<RoomEntity, ServiceError> {
    store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ActionRejection::RoomNotFound(room_id.to_owned()).into())
}

/// Load a user and check it belongs to the room.
async fn load_member(
    store: &dyn PokerStore,
    room_id: &str,
    user_id: &str,
) -> Result<UserEntity, ServiceError> {
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ActionRejection::UserNotFound(user_id.to_owned()))?;

    if user.room_id != room_id {
        return Err(ActionRejection::NotInRoom {
            user_id: user.id,
            room_id: room_id.to_owned(),
        }
        .into());
    }
    Ok(user)
}

/// Load the acting user and require it to be the admin of the room.
pub async fn ensure_admin(
    store: &dyn PokerStore,
    room_id: &str,
    user_id: &str,
) -> Result<UserEntity, ServiceError> {
    let user = load_member(store, room_id, user_id).await?;
    if !user.is_admin {
        return Err(ActionRejection::NotAdmin(user.id).into());
    }
    Ok(user)
}

async fn load_room_task(
    store: &dyn PokerStore,
    room_id: &str,
    task_id: &str,
) -> Result<TaskEntity, ServiceError> {
    let task = store
        .find_task(task_id)
        .await?
        .ok_or_else(|| ActionRejection::TaskNotFound(task_id.to_owned()))?;

    if task.room_id != room_id {
        return Err(ActionRejection::TaskNotInRoom {
            task_id: task.id,
            room_id: room_id.to_owned(),
        }
        .into());
    }
    Ok(task)
}
