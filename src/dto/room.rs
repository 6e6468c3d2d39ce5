//! Room and membership payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::{RoomEntity, UserEntity};
use crate::dto::{
    format_system_time,
    validation::{validate_identifier, validate_not_blank},
};

/// Request body used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(
        length(min = 1, max = 100),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
}

/// Public projection of a room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomDto {
    pub id: String,
    pub name: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    pub cards_revealed: bool,
    pub active_task_id: Option<String>,
}

impl From<RoomEntity> for RoomDto {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: format_system_time(value.created_at),
            cards_revealed: value.cards_revealed,
            active_task_id: value.active_task_id,
        }
    }
}

/// Request body used to join a room as a voter or spectator.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    #[validate(
        length(min = 1, max = 100),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[serde(default)]
    pub is_spectator: bool,
    /// Accepted for older clients; the path parameter wins.
    #[serde(default)]
    #[validate(custom(function = "validate_identifier"))]
    pub room_id: Option<String>,
}

/// Room member as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserDto {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub is_admin: bool,
    pub is_spectator: bool,
    /// Whether the user voted on the active task.
    pub has_voted: bool,
}

impl UserDto {
    pub fn new(user: UserEntity, has_voted: bool) -> Self {
        Self {
            id: user.id,
            room_id: user.room_id,
            name: user.name,
            is_admin: user.is_admin,
            is_spectator: user.is_spectator,
            has_voted,
        }
    }
}

/// Response of a successful join.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRoomResponse {
    pub user: UserDto,
    pub room: RoomDto,
}
