//! Event publisher service.
//!
//! Provides an abstraction for publishing voting lifecycle events.
//! The broker implementation is provided by the queue crate (AMQP).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use condo_common::{AppError, AppResult};
use condo_db::entities::{voting, voting_owner};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A (user, apartment) pair allowed to vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: Uuid,
    pub apartment_id: Uuid,
}

/// Published once per voting, after it has been persisted.
///
/// The Telegram bridge turns it into one native poll per participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingCreatedEvent {
    pub voting_id: Uuid,
    pub question_put: String,
    pub response_options: Vec<String>,
    pub end_time: DateTime<Utc>,
    pub participants: Vec<Participant>,
}

impl VotingCreatedEvent {
    /// Build the event from a persisted voting and its owner snapshot.
    #[must_use]
    pub fn new(voting: &voting::Model, owners: &[voting_owner::Model]) -> Self {
        Self {
            voting_id: voting.id,
            question_put: voting.question_put.clone(),
            response_options: voting.options(),
            end_time: voting.end_time.with_timezone(&Utc),
            participants: owners
                .iter()
                .map(|o| Participant {
                    user_id: o.user_id,
                    apartment_id: o.apartment_id,
                })
                .collect(),
        }
    }
}

/// Trait for publishing voting events.
///
/// This allows the voting service to publish events
/// without depending on the broker implementation.
#[async_trait]
pub trait VotingEventPublisher: Send + Sync {
    /// Publish a voting created event.
    async fn publish_voting_created(&self, event: &VotingCreatedEvent) -> AppResult<()>;
}

/// A no-op implementation for when no broker is configured.
#[derive(Clone, Default)]
pub struct NoOpVotingEventPublisher;

#[async_trait]
impl VotingEventPublisher for NoOpVotingEventPublisher {
    async fn publish_voting_created(&self, _event: &VotingCreatedEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Keeps published events in memory; can be told to fail.
#[derive(Default)]
pub struct RecordingVotingEventPublisher {
    events: Mutex<Vec<VotingCreatedEvent>>,
    fail: bool,
}

impl RecordingVotingEventPublisher {
    /// Publisher that records every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher whose every publish fails like an unreachable broker.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            events: Mutex::default(),
            fail: true,
        }
    }

    /// Events published so far.
    pub async fn events(&self) -> Vec<VotingCreatedEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl VotingEventPublisher for RecordingVotingEventPublisher {
    async fn publish_voting_created(&self, event: &VotingCreatedEvent) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Queue("Broker unavailable".to_string()));
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Wrapper for boxed VotingEventPublisher trait object.
pub type VotingEventPublisherService = Arc<dyn VotingEventPublisher>;
