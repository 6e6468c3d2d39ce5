//! Denormalized room snapshot pushed to clients.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::VoteEntity;
use crate::dto::{
    room::{RoomDto, UserDto},
    task::TaskDto,
};

/// Everything a client needs to render a room.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomState {
    pub room: RoomDto,
    pub users: Vec<UserDto>,
    pub tasks: Vec<TaskDto>,
    /// Votes on the active task; masked until cards are revealed.
    pub votes: Vec<VoteView>,
    pub active_task: Option<TaskDto>,
}

/// A vote as seen by clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum VoteView {
    Revealed(VoteDto),
    Masked(MaskedVote),
}

/// Vote with its value, only sent once cards are revealed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoteDto {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub value: String,
}

/// Placeholder proving a user voted without leaking the value.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaskedVote {
    pub user_id: String,
    pub has_voted: bool,
}

impl VoteView {
    pub fn revealed(vote: VoteEntity) -> Self {
        VoteView::Revealed(VoteDto {
            id: vote.id,
            task_id: vote.task_id,
            user_id: vote.user_id,
            value: vote.value,
        })
    }

    pub fn masked(vote: VoteEntity) -> Self {
        VoteView::Masked(MaskedVote {
            user_id: vote.user_id,
            has_voted: true,
        })
    }

    pub fn user_id(&self) -> &str {
        match self {
            VoteView::Revealed(vote) => &vote.user_id,
            VoteView::Masked(vote) => &vote.user_id,
        }
    }

    /// Card value, absent while masked.
    pub fn value(&self) -> Option<&str> {
        match self {
            VoteView::Revealed(vote) => Some(&vote.value),
            VoteView::Masked(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_votes_serialize_without_value() {
        let vote = VoteEntity {
            id: "v1".into(),
            task_id: "t1".into(),
            user_id: "u1".into(),
            value: "5".into(),
        };

        let masked = serde_json::to_value(VoteView::masked(vote.clone())).unwrap();
        assert_eq!(masked, serde_json::json!({"user_id": "u1", "has_voted": true}));

        let revealed = serde_json::to_value(VoteView::revealed(vote)).unwrap();
        assert_eq!(revealed["value"], "5");
    }
}
