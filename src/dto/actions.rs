//! Payloads of the broadcasting actions and their acknowledgements.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{
    task::TaskDto,
    validation::{validate_identifier, validate_not_blank},
};
use crate::state::deck::Card;

/// Request carrying only the acting user (reveal, leave).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UserRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
}

/// Admin action targeting a task (activate, delete, cancel).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TaskActionRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub task_id: String,
}

/// A user's estimate for a task.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CastVoteRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub task_id: String,
    /// A card of the deck, as a number or a string (`"?"`).
    #[schema(value_type = Object, example = 5)]
    pub value: Card,
}

/// Clear the votes of a task and hide cards again.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ResetVotesRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
    /// Task whose votes are dropped. Without it only the reveal flag is reset.
    #[serde(default)]
    #[validate(custom(function = "validate_identifier"))]
    pub task_id: Option<String>,
}

/// Close a task with its agreed estimate.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CompleteTaskRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub task_id: String,
    /// Free-form final estimate; numbers are accepted and kept as text.
    #[serde(deserialize_with = "string_or_number")]
    #[schema(value_type = String, example = "8")]
    #[validate(
        length(min = 1, max = 32),
        custom(function = "validate_not_blank")
    )]
    pub final_score: String,
}

/// Acknowledgement of a broadcasting action.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ActionResponse {
    /// `false` when a precondition did not hold and nothing changed.
    pub applied: bool,
}

/// Acknowledgement of a task creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskCreatedResponse {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskDto>,
}

/// The estimation deck.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeckResponse {
    #[schema(value_type = Vec<Object>, example = json!([0, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, "?"]))]
    pub values: Vec<Card>,
}

/// Banner served at the API root.
#[derive(Debug, Serialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_score_accepts_numbers() {
        let request: CompleteTaskRequest = serde_json::from_str(
            r#"{"user_id": "u1", "task_id": "t1", "final_score": 8}"#,
        )
        .unwrap();
        assert_eq!(request.final_score, "8");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn vote_value_outside_the_deck_is_rejected() {
        let parsed = serde_json::from_str::<CastVoteRequest>(
            r#"{"user_id": "u1", "task_id": "t1", "value": 7}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn blank_identifiers_fail_validation() {
        let request: TaskActionRequest =
            serde_json::from_str(r#"{"user_id": "", "task_id": "t1"}"#).unwrap();
        assert!(request.validate().is_err());
    }
}
