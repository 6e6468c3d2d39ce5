use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::{
    actions::{
        CastVoteRequest, CompleteTaskRequest, ResetVotesRequest, TaskActionRequest, UserRequest,
    },
    task::CreateTaskRequest,
    validation::validate_identifier,
};

/// Messages accepted from WebSocket clients, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom {
        room_id: String,
        user_id: String,
    },
    AddTask {
        room_id: String,
        #[serde(flatten)]
        task: CreateTaskRequest,
    },
    SetActiveTask {
        room_id: String,
        #[serde(flatten)]
        action: TaskActionRequest,
    },
    /// The room is optional here; the task's room is used when it is missing.
    CastVote {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(flatten)]
        vote: CastVoteRequest,
    },
    RevealCards {
        room_id: String,
        #[serde(flatten)]
        actor: UserRequest,
    },
    ResetVotes {
        room_id: String,
        #[serde(flatten)]
        reset: ResetVotesRequest,
    },
    CompleteTask {
        room_id: String,
        #[serde(flatten)]
        completion: CompleteTaskRequest,
    },
    DeleteTask {
        room_id: String,
        #[serde(flatten)]
        action: TaskActionRequest,
    },
    CancelTask {
        room_id: String,
        #[serde(flatten)]
        action: TaskActionRequest,
    },
    LeaveRoom {},
}

/// Why an inbound frame was refused.
#[derive(Debug, Error)]
pub enum WsError {
    #[error("malformed message: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl ClientMessage {
    /// Parse a text frame and validate its payload.
    pub fn from_json_str(raw: &str) -> Result<Self, WsError> {
        let message: Self = serde_json::from_str(raw)?;
        message.validate()?;
        Ok(message)
    }

    /// Name of the message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::AddTask { .. } => "add_task",
            ClientMessage::SetActiveTask { .. } => "set_active_task",
            ClientMessage::CastVote { .. } => "cast_vote",
            ClientMessage::RevealCards { .. } => "reveal_cards",
            ClientMessage::ResetVotes { .. } => "reset_votes",
            ClientMessage::CompleteTask { .. } => "complete_task",
            ClientMessage::DeleteTask { .. } => "delete_task",
            ClientMessage::CancelTask { .. } => "cancel_task",
            ClientMessage::LeaveRoom {} => "leave_room",
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let room_id = match self {
            ClientMessage::JoinRoom { room_id, .. }
            | ClientMessage::AddTask { room_id, .. }
            | ClientMessage::SetActiveTask { room_id, .. }
            | ClientMessage::RevealCards { room_id, .. }
            | ClientMessage::ResetVotes { room_id, .. }
            | ClientMessage::CompleteTask { room_id, .. }
            | ClientMessage::DeleteTask { room_id, .. }
            | ClientMessage::CancelTask { room_id, .. } => Some(room_id.as_str()),
            ClientMessage::CastVote { room_id, .. } => room_id.as_deref(),
            ClientMessage::LeaveRoom {} => None,
        };
        if let Some(Err(err)) = room_id.map(validate_identifier) {
            errors.add("room_id", err);
        }

        if let ClientMessage::JoinRoom { user_id, .. } = self {
            if let Err(err) = validate_identifier(user_id) {
                errors.add("user_id", err);
            }
        }

        let nested = match self {
            ClientMessage::AddTask { task, .. } => task.validate(),
            ClientMessage::SetActiveTask { action, .. }
            | ClientMessage::DeleteTask { action, .. }
            | ClientMessage::CancelTask { action, .. } => action.validate(),
            ClientMessage::CastVote { vote, .. } => vote.validate(),
            ClientMessage::RevealCards { actor, .. } => actor.validate(),
            ClientMessage::ResetVotes { reset, .. } => reset.validate(),
            ClientMessage::CompleteTask { completion, .. } => completion.validate(),
            ClientMessage::JoinRoom { .. } | ClientMessage::LeaveRoom {} => Ok(()),
        };

        if errors.errors().is_empty() {
            nested
        } else {
            Err(errors)
        }
    }
}

/// Payload of the `error` event sent back to the offending connection.
#[derive(Debug, Serialize, ToSchema)]
pub struct WsErrorMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::deck::Card;

    #[test]
    fn cast_vote_parses_without_room() {
        let message = ClientMessage::from_json_str(
            r#"{"type": "cast_vote", "user_id": "u1", "task_id": "t1", "value": "?"}"#,
        )
        .unwrap();

        let ClientMessage::CastVote { room_id, vote } = message else {
            panic!("expected cast_vote");
        };
        assert_eq!(room_id, None);
        assert_eq!(vote.value, Card::Unknown);
    }

    #[test]
    fn leave_room_ignores_extra_fields() {
        let message =
            ClientMessage::from_json_str(r#"{"type": "leave_room", "room_id": "X"}"#).unwrap();
        assert_eq!(message.kind(), "leave_room");
    }

    #[test]
    fn invalid_payloads_are_reported() {
        assert!(matches!(
            ClientMessage::from_json_str(r#"{"type": "dance"}"#),
            Err(WsError::Parse(_))
        ));
        assert!(matches!(
            ClientMessage::from_json_str(
                r#"{"type": "add_task", "room_id": "ABCD1234", "title": "   "}"#
            ),
            Err(WsError::Invalid(_))
        ));
        assert!(matches!(
            ClientMessage::from_json_str(
                r#"{"type": "reveal_cards", "room_id": "bad id", "user_id": "u1"}"#
            ),
            Err(WsError::Invalid(_))
        ));
    }
}
