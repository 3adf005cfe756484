//! API response types.

use chrono::{DateTime, Utc};
use condo_db::entities::voting;
use serde::Serialize;
use uuid::Uuid;

/// A voting as returned by the public API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingResponse {
    pub id: Uuid,
    pub question_put: String,
    pub response_options: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub completed: bool,
    pub decision: Option<String>,
}

impl From<voting::Model> for VotingResponse {
    fn from(voting: voting::Model) -> Self {
        Self {
            id: voting.id,
            response_options: voting.options(),
            question_put: voting.question_put,
            start_time: voting.start_time.with_timezone(&Utc),
            end_time: voting.end_time.with_timezone(&Utc),
            completed: voting.completed,
            decision: voting.decision,
        }
    }
}

/// What the Telegram bridge needs to render a poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalVotingResponse {
    pub id: Uuid,
    pub question_put: String,
    pub response_options: Vec<String>,
}

impl From<voting::Model> for InternalVotingResponse {
    fn from(voting: voting::Model) -> Self {
        Self {
            id: voting.id,
            response_options: voting.options(),
            question_put: voting.question_put,
        }
    }
}

/// Plain confirmation message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
