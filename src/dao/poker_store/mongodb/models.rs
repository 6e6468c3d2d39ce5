use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    RoomEntity, RoomPatch, TaskEntity, TaskPatch, TaskStatus, UserEntity, VoteEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    created_at: DateTime,
    #[serde(default)]
    cards_revealed: bool,
    #[serde(default)]
    active_task_id: Option<String>,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
            cards_revealed: value.cards_revealed,
            active_task_id: value.active_task_id,
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created_at: value.created_at.to_system_time(),
            cards_revealed: value.cards_revealed,
            active_task_id: value.active_task_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    room_id: String,
    name: String,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    is_spectator: bool,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            name: value.name,
            is_admin: value.is_admin,
            is_spectator: value.is_spectator,
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            name: value.name,
            is_admin: value.is_admin,
            is_spectator: value.is_spectator,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTaskDocument {
    #[serde(rename = "_id")]
    id: String,
    room_id: String,
    title: String,
    #[serde(default)]
    description: String,
    status: TaskStatus,
    #[serde(default)]
    final_score: Option<String>,
}

impl From<TaskEntity> for MongoTaskDocument {
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

impl From<MongoTaskDocument> for TaskEntity {
    fn from(value: MongoTaskDocument) -> Self {
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

/// Votes keep their own `_id`; uniqueness of `(task_id, user_id)` is enforced by an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    #[serde(rename = "_id")]
    id: String,
    task_id: String,
    user_id: String,
    value: String,
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            id: value.id,
            task_id: value.task_id,
            user_id: value.user_id,
            value: value.value,
        }
    }
}

impl From<MongoVoteDocument> for VoteEntity {
    fn from(value: MongoVoteDocument) -> Self {
        Self {
            id: value.id,
            task_id: value.task_id,
            user_id: value.user_id,
            value: value.value,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

/// Translate a [`RoomPatch`] into a `$set` update document.
pub fn room_update(patch: &RoomPatch) -> Document {
    let mut set = Document::new();
    if let Some(revealed) = patch.cards_revealed {
        set.insert("cards_revealed", revealed);
    }
    if let Some(active) = &patch.active_task_id {
        set.insert("active_task_id", active.clone());
    }
    doc! {"$set": set}
}

/// Translate a [`TaskPatch`] into a `$set` update document.
pub fn task_update(patch: &TaskPatch) -> Document {
    let mut set = Document::new();
    if let Some(status) = patch.status {
        set.insert("status", status.as_str());
    }
    if let Some(score) = &patch.final_score {
        set.insert("final_score", score.clone());
    }
    doc! {"$set": set}
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[test]
    fn clearing_the_active_task_sets_null() {
        let update = room_update(&RoomPatch::clear_active_task());
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get("active_task_id"), Some(&Bson::Null));
        assert_eq!(set.get_bool("cards_revealed").unwrap(), false);
    }

    #[test]
    fn task_update_uses_wire_status() {
        let update = task_update(&TaskPatch::completed("8"));
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("status").unwrap(), "COMPLETED");
        assert_eq!(set.get_str("final_score").unwrap(), "8");
    }
}
