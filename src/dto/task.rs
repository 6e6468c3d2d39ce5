use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::{TaskEntity, TaskStatus};
use crate::dto::validation::{validate_identifier, validate_not_blank};

/// Request body used to add a task to a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTaskRequest {
    #[validate(
        length(min = 1, max = 200),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Same as [`CreateTaskRequest`] with the room carried in the body.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LegacyCreateTaskRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub room_id: String,
    #[validate(
        length(min = 1, max = 200),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

impl LegacyCreateTaskRequest {
    /// Split into the target room and the regular request.
    pub fn into_parts(self) -> (String, CreateTaskRequest) {
        (
            self.room_id,
            CreateTaskRequest {
                title: self.title,
                description: self.description,
            },
        )
    }
}

/// Task as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskDto {
    pub id: String,
    pub room_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub final_score: Option<String>,
}

impl From<TaskEntity> for TaskDto {
    fn from(value: TaskEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            title: value.title,
            description: value.description,
            status: value.status,
            final_score: value.final_score,
        }
    }
}
