use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;

/// Voting session persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Short, human-shareable identifier (always upper case).
    pub id: String,
    /// Display name chosen by the creator.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Whether vote values of the active task are visible to everyone.
    pub cards_revealed: bool,
    /// Task currently being estimated, if any.
    pub active_task_id: Option<String>,
}

/// Room member. `has_voted` is never stored; it is derived when a room state is assembled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    pub id: String,
    pub room_id: String,
    pub name: String,
    /// Set for the first member of the room only.
    pub is_admin: bool,
    /// Spectators never vote and are ignored by the completion check.
    pub is_spectator: bool,
}

/// Lifecycle of an estimable task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, not estimated yet.
    Pending,
    /// Currently being voted on. At most one per room.
    Active,
    /// Estimated, carries a final score.
    Completed,
    /// Dropped by the admin.
    Cancelled,
}

impl TaskStatus {
    /// Wire representation, also used as the persisted value.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Active => "ACTIVE",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Estimable work item of a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskEntity {
    pub id: String,
    pub room_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// Only set once the task is completed.
    pub final_score: Option<String>,
}

/// One user's estimate for a task. Unique per `(task_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    /// Card value serialized as a string (`"?"` for the unknown card).
    pub value: String,
}

/// Partial update applied to a room. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPatch {
    pub cards_revealed: Option<bool>,
    /// `Some(None)` clears the active task.
    pub active_task_id: Option<Option<String>>,
}

impl RoomPatch {
    /// Only toggle the reveal flag.
    pub fn revealed(value: bool) -> Self {
        Self {
            cards_revealed: Some(value),
            active_task_id: None,
        }
    }

    /// Point the room at a new active task and hide its votes.
    pub fn activate(task_id: impl Into<String>) -> Self {
        Self {
            cards_revealed: Some(false),
            active_task_id: Some(Some(task_id.into())),
        }
    }

    /// Drop the active task and hide votes.
    pub fn clear_active_task() -> Self {
        Self {
            cards_revealed: Some(false),
            active_task_id: Some(None),
        }
    }

    /// Apply the patch onto an in-memory entity.
    pub fn apply(&self, room: &mut RoomEntity) {
        if let Some(revealed) = self.cards_revealed {
            room.cards_revealed = revealed;
        }
        if let Some(active) = &self.active_task_id {
            room.active_task_id = active.clone();
        }
    }
}

/// Partial update applied to a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub final_score: Option<Option<String>>,
}

impl TaskPatch {
    /// Only change the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            final_score: None,
        }
    }

    /// Mark the task completed with its final estimate.
    pub fn completed(final_score: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            final_score: Some(Some(final_score.into())),
        }
    }

    /// Apply the patch onto an in-memory entity.
    pub fn apply(&self, task: &mut TaskEntity) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(score) = &self.final_score {
            task.final_score = score.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomEntity {
        RoomEntity {
            id: "ABCD1234".into(),
            name: "Sprint 1".into(),
            created_at: SystemTime::UNIX_EPOCH,
            cards_revealed: true,
            active_task_id: None,
        }
    }

    #[test]
    fn room_patch_only_touches_set_fields() {
        let mut entity = room();
        RoomPatch::activate("task-1").apply(&mut entity);
        assert_eq!(entity.active_task_id.as_deref(), Some("task-1"));
        assert!(!entity.cards_revealed);

        RoomPatch::revealed(true).apply(&mut entity);
        assert_eq!(entity.active_task_id.as_deref(), Some("task-1"));
        assert!(entity.cards_revealed);

        RoomPatch::clear_active_task().apply(&mut entity);
        assert_eq!(entity.active_task_id, None);
        assert!(!entity.cards_revealed);
    }

    #[test]
    fn task_status_serializes_upper_case() {
        let json = serde_json::to_string(&TaskStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
        assert_eq!(TaskStatus::Active.as_str(), "ACTIVE");
    }
}
