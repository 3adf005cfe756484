//! Voting service.
//!
//! Owns the voting lifecycle: creation from an ownership snapshot, weighted
//! vote submission through the web and Telegram channels, completion by full
//! participation or by time, results and decisions.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use condo_common::{AppError, AppResult, IdGenerator};
use condo_db::{
    entities::{voting, voting_owner},
    repositories::{VoteOutcome, VotingStore},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::apartment::{ApartmentDirectoryService, ApartmentInfo};
use super::event_publisher::{VotingCreatedEvent, VotingEventPublisherService};

/// Shown in results until a decision is recorded.
pub const DECISION_PLACEHOLDER: &str = "Decision not yet made";

/// Input for creating a voting.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVotingInput {
    #[validate(length(min = 1, max = 1000))]
    pub question_put: String,
    #[validate(length(min = 2, max = 20))]
    pub response_options: Vec<String>,
    #[validate(length(min = 1))]
    pub house_ids: Vec<Uuid>,
    #[validate(range(min = 1, max = 8760))]
    pub duration_in_hours: i64,
}

/// A web vote for one apartment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteInput {
    pub user_id: Uuid,
    pub apartment_id: Uuid,
    pub response: String,
}

/// A Telegram poll answer, applied to every apartment of the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramVoteInput {
    pub user_id: Uuid,
    pub response: String,
}

/// Outcome of a web vote.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    pub vote_weight: f64,
    /// Whether this vote completed the voting.
    pub completed: bool,
}

impl VoteReceipt {
    /// Human-readable confirmation.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Vote recorded with weight {}", self.vote_weight)
    }
}

/// Outcome of a Telegram vote.
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramVoteReceipt {
    pub apartments_voted: usize,
    pub total_weight: f64,
    pub completed: bool,
}

impl TelegramVoteReceipt {
    /// Human-readable confirmation.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Vote recorded for {} apartment(s) with total weight {}",
            self.apartments_voted, self.total_weight
        )
    }
}

/// Weighted results of a completed voting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingResults {
    pub question_put: String,
    pub total_voted_weight: f64,
    /// Percentage of the voted weight per declared option.
    pub responses: BTreeMap<String, f64>,
    pub decision: String,
}

/// One apartment of a user inside a voting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentVote {
    pub apartment_id: Uuid,
    pub house_id: Uuid,
    pub response: Option<String>,
    pub vote_weight: f64,
}

/// A voting as seen by one participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVotingSummary {
    pub id: Uuid,
    pub question_put: String,
    pub response_options: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub completed: bool,
    pub decision: Option<String>,
    pub apartments: Vec<ApartmentVote>,
}

/// A completed voting still waiting for its decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedVotingSummary {
    pub id: Uuid,
    pub question_put: String,
    pub end_time: DateTime<Utc>,
    pub voted_owners: usize,
    pub total_owners: usize,
}

/// Voting service for business logic.
#[derive(Clone)]
pub struct VotingService {
    store: Arc<dyn VotingStore>,
    apartments: ApartmentDirectoryService,
    publisher: VotingEventPublisherService,
    id_gen: IdGenerator,
}

impl VotingService {
    /// Create a new voting service.
    #[must_use]
    pub fn new(
        store: Arc<dyn VotingStore>,
        apartments: ApartmentDirectoryService,
        publisher: VotingEventPublisherService,
    ) -> Self {
        Self {
            store,
            apartments,
            publisher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a voting for the owners of the given houses.
    ///
    /// The owner snapshot is taken now and never refreshed. The voting is
    /// persisted before the created event is published; a publish failure
    /// is reported but the voting stays.
    pub async fn create_voting(&self, input: CreateVotingInput) -> AppResult<voting::Model> {
        input.validate()?;

        let question_put = input.question_put.trim().to_string();
        if question_put.is_empty() {
            return Err(AppError::InvalidArgument(
                "Question cannot be blank".to_string(),
            ));
        }

        let mut options: Vec<String> = Vec::with_capacity(input.response_options.len());
        for option in &input.response_options {
            let option = option.trim();
            if option.is_empty() {
                return Err(AppError::InvalidArgument(
                    "Response options cannot be blank".to_string(),
                ));
            }
            if options.iter().any(|o| o == option) {
                return Err(AppError::InvalidArgument(format!(
                    "Duplicate response option: {option}"
                )));
            }
            options.push(option.to_string());
        }

        let mut seen_houses = HashSet::new();
        let house_ids: Vec<Uuid> = input
            .house_ids
            .into_iter()
            .filter(|id| seen_houses.insert(*id))
            .collect();

        let voting_id = self.id_gen.generate();
        let mut owners = Vec::new();
        let mut seen_pairs = HashSet::new();
        for house_id in house_ids {
            let apartments = self.apartments.apartments_by_house(house_id).await?;
            for apartment in apartments {
                validate_apartment(&apartment)?;
                for user in &apartment.users {
                    if !seen_pairs.insert((user.user_id, apartment.id)) {
                        continue;
                    }
                    owners.push(voting_owner::Model {
                        id: self.id_gen.generate(),
                        voting_id,
                        user_id: user.user_id,
                        apartment_id: apartment.id,
                        house_id,
                        apartment_area: apartment.total_area,
                        share: user.share,
                        response: String::new(),
                        vote_weight: 0.0,
                    });
                }
            }
        }

        if owners.is_empty() {
            tracing::warn!(%voting_id, "Voting has no eligible owners; it can only expire");
        }

        let now = Utc::now();
        let model = voting::Model {
            id: voting_id,
            question_put,
            response_options: json!(options),
            start_time: now.into(),
            end_time: (now + Duration::hours(input.duration_in_hours)).into(),
            completed: false,
            decision: None,
        };

        let event = VotingCreatedEvent::new(&model, &owners);
        let owner_count = owners.len();
        let created = self.store.create_with_owners(model, owners).await?;

        tracing::info!(
            voting_id = %created.id,
            owners = owner_count,
            "Voting created"
        );

        if let Err(e) = self.publisher.publish_voting_created(&event).await {
            tracing::error!(voting_id = %created.id, error = %e, "Failed to publish voting created event");
            return Err(e);
        }

        Ok(created)
    }

    /// All votings, newest first.
    pub async fn list_votings(&self) -> AppResult<Vec<voting::Model>> {
        self.store.list_all().await
    }

    /// Get a voting by ID.
    pub async fn get_voting(&self, voting_id: Uuid) -> AppResult<voting::Model> {
        self.store.get_by_id(voting_id).await
    }

    /// Record a web vote for one apartment.
    ///
    /// `caller` is the authenticated user; it must match the voter.
    pub async fn submit_vote(
        &self,
        voting_id: Uuid,
        caller: Uuid,
        input: SubmitVoteInput,
    ) -> AppResult<VoteReceipt> {
        let voting = self.store.get_by_id(voting_id).await?;
        ensure_open(&voting)?;
        ensure_option(&voting, &input.response)?;

        if caller != input.user_id {
            return Err(AppError::Unauthorized);
        }

        let owners = self.store.find_owners(voting_id).await?;
        let owner = owners
            .iter()
            .find(|o| o.user_id == input.user_id && o.apartment_id == input.apartment_id)
            .ok_or_else(|| {
                AppError::InvalidArgument(
                    "User is not an owner of this apartment in the voting".to_string(),
                )
            })?;

        if owner.has_voted() {
            return Err(already_voted_operation());
        }

        let weight = vote_weight(owner, &owners)?;
        match self
            .store
            .record_vote(voting_id, owner.id, &input.response, weight)
            .await?
        {
            VoteOutcome::Recorded => {}
            VoteOutcome::AlreadyVoted => return Err(already_voted_operation()),
            VoteOutcome::VotingClosed => return Err(voting_closed()),
        }

        tracing::info!(
            %voting_id,
            user_id = %input.user_id,
            apartment_id = %input.apartment_id,
            weight,
            "Vote recorded"
        );

        let completed = self.complete_if_all_voted(voting_id).await?;
        Ok(VoteReceipt {
            vote_weight: weight,
            completed,
        })
    }

    /// Record a Telegram answer for every apartment the user has not voted
    /// for yet.
    ///
    /// Fails with [`AppError::AlreadyVoted`] when nothing was left to vote.
    pub async fn submit_vote_from_telegram(
        &self,
        voting_id: Uuid,
        input: TelegramVoteInput,
    ) -> AppResult<TelegramVoteReceipt> {
        let voting = self.store.get_by_id(voting_id).await?;
        ensure_open(&voting)?;
        ensure_option(&voting, &input.response)?;

        let mine = self
            .store
            .find_owners_for_user(voting_id, input.user_id)
            .await?;
        if mine.is_empty() {
            return Err(AppError::InvalidArgument(
                "User is not an owner in this voting".to_string(),
            ));
        }

        let pending: Vec<&voting_owner::Model> = mine.iter().filter(|o| !o.has_voted()).collect();
        if pending.is_empty() {
            return Err(already_voted(&mine));
        }

        let owners = self.store.find_owners(voting_id).await?;
        let weighted = pending
            .into_iter()
            .map(|owner| vote_weight(owner, &owners).map(|w| (owner.id, w)))
            .collect::<AppResult<Vec<_>>>()?;

        let mut apartments_voted = 0;
        let mut total_weight = 0.0;
        let mut closed = false;
        for (owner_id, weight) in weighted {
            match self
                .store
                .record_vote(voting_id, owner_id, &input.response, weight)
                .await
            {
                Ok(VoteOutcome::Recorded) => {
                    apartments_voted += 1;
                    total_weight += weight;
                }
                Ok(VoteOutcome::AlreadyVoted) => {}
                Ok(VoteOutcome::VotingClosed) => {
                    closed = true;
                    break;
                }
                Err(e) => {
                    // Earlier rows of this call are already written.
                    if apartments_voted > 0
                        && let Err(check) = self.complete_if_all_voted(voting_id).await
                    {
                        tracing::warn!(%voting_id, error = %check, "Completion check failed");
                    }
                    return Err(e);
                }
            }
        }

        if apartments_voted == 0 && closed {
            return Err(voting_closed());
        }

        if apartments_voted == 0 {
            let mine = self
                .store
                .find_owners_for_user(voting_id, input.user_id)
                .await?;
            return Err(already_voted(&mine));
        }

        tracing::info!(
            %voting_id,
            user_id = %input.user_id,
            apartments = apartments_voted,
            total_weight,
            "Telegram vote recorded"
        );

        let completed = self.complete_if_all_voted(voting_id).await?;
        Ok(TelegramVoteReceipt {
            apartments_voted,
            total_weight,
            completed,
        })
    }

    /// Complete every open voting whose end time has passed.
    pub async fn expire_due_votings(&self) -> AppResult<u64> {
        self.expire_votings_at(Utc::now()).await
    }

    /// Complete every open voting whose end time is at or before `now`.
    pub async fn expire_votings_at(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let expired = self.store.complete_expired(now).await?;
        if expired > 0 {
            tracing::info!(count = expired, "Expired votings completed");
        }
        Ok(expired)
    }

    /// Weighted results of a completed voting.
    pub async fn get_results(&self, voting_id: Uuid) -> AppResult<VotingResults> {
        let voting = self.store.get_by_id(voting_id).await?;
        if !voting.completed {
            return Err(AppError::InvalidOperation(
                "Voting is not completed yet".to_string(),
            ));
        }

        let owners = self.store.find_owners(voting_id).await?;
        let (total_voted_weight, responses) = tally(&voting.options(), &owners);

        Ok(VotingResults {
            question_put: voting.question_put,
            total_voted_weight,
            responses,
            decision: voting
                .decision
                .unwrap_or_else(|| DECISION_PLACEHOLDER.to_string()),
        })
    }

    /// Record (or overwrite) the decision of a completed voting.
    pub async fn set_decision(&self, voting_id: Uuid, decision: &str) -> AppResult<()> {
        let voting = self.store.get_by_id(voting_id).await?;
        if !voting.completed {
            return Err(AppError::InvalidOperation(
                "Decision can only be set on a completed voting".to_string(),
            ));
        }

        let decision = decision.trim();
        if decision.is_empty() {
            return Err(AppError::InvalidArgument(
                "Decision cannot be blank".to_string(),
            ));
        }

        if !self.store.set_decision(voting_id, decision).await? {
            return Err(AppError::NotFound(format!("Voting not found: {voting_id}")));
        }

        tracing::info!(%voting_id, "Voting decision recorded");
        Ok(())
    }

    /// Delete a voting with its owner snapshot.
    pub async fn delete_voting(&self, voting_id: Uuid) -> AppResult<()> {
        if !self.store.delete(voting_id).await? {
            return Err(AppError::NotFound(format!("Voting not found: {voting_id}")));
        }
        tracing::info!(%voting_id, "Voting deleted");
        Ok(())
    }

    /// Votings the user takes part in, with the user's own apartments.
    pub async fn user_votings(
        &self,
        user_id: Uuid,
        completed: bool,
    ) -> AppResult<Vec<UserVotingSummary>> {
        let votings = self.store.find_by_participant(user_id, completed).await?;
        Ok(votings
            .into_iter()
            .map(|(voting, owners)| UserVotingSummary {
                id: voting.id,
                response_options: voting.options(),
                question_put: voting.question_put,
                start_time: voting.start_time.with_timezone(&Utc),
                end_time: voting.end_time.with_timezone(&Utc),
                completed: voting.completed,
                decision: voting.decision,
                apartments: owners
                    .into_iter()
                    .map(|o| ApartmentVote {
                        apartment_id: o.apartment_id,
                        house_id: o.house_id,
                        response: o.has_voted().then_some(o.response),
                        vote_weight: o.vote_weight,
                    })
                    .collect(),
            })
            .collect())
    }

    /// Completed votings that still need a decision, oldest first.
    pub async fn completed_without_decision(&self) -> AppResult<Vec<UnresolvedVotingSummary>> {
        let votings = self.store.find_completed_without_decision().await?;
        Ok(votings
            .into_iter()
            .map(|(voting, owners)| UnresolvedVotingSummary {
                id: voting.id,
                question_put: voting.question_put,
                end_time: voting.end_time.with_timezone(&Utc),
                voted_owners: owners.iter().filter(|o| o.has_voted()).count(),
                total_owners: owners.len(),
            })
            .collect())
    }

    /// Flip the voting to completed once every owner has a response.
    async fn complete_if_all_voted(&self, voting_id: Uuid) -> AppResult<bool> {
        let owners = self.store.find_owners(voting_id).await?;
        if owners.is_empty() || !owners.iter().all(voting_owner::Model::has_voted) {
            return Ok(false);
        }

        let flipped = self.store.mark_completed(voting_id).await?;
        if flipped {
            tracing::info!(%voting_id, "All owners voted; voting completed");
        }
        Ok(true)
    }
}

fn ensure_open(voting: &voting::Model) -> AppResult<()> {
    if voting.completed {
        return Err(voting_closed());
    }
    Ok(())
}

fn ensure_option(voting: &voting::Model, response: &str) -> AppResult<()> {
    if voting.options().iter().any(|o| o == response) {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!(
            "Invalid response: {response}"
        )))
    }
}

fn voting_closed() -> AppError {
    AppError::InvalidOperation("Voting is already completed".to_string())
}

fn already_voted_operation() -> AppError {
    AppError::InvalidOperation("Owner has already voted".to_string())
}

fn already_voted(mine: &[voting_owner::Model]) -> AppError {
    let previous_response = mine
        .iter()
        .find(|o| o.has_voted())
        .map(|o| o.response.clone())
        .unwrap_or_default();
    AppError::AlreadyVoted { previous_response }
}

/// Reject ownership data that would produce meaningless weights.
fn validate_apartment(apartment: &ApartmentInfo) -> AppResult<()> {
    if !apartment.total_area.is_finite() || apartment.total_area < 0.0 {
        return Err(AppError::ExternalService(format!(
            "Apartment {} has invalid area {}",
            apartment.id, apartment.total_area
        )));
    }
    if let Some(user) = apartment
        .users
        .iter()
        .find(|u| !(u.share > 0.0 && u.share <= 1.0))
    {
        return Err(AppError::ExternalService(format!(
            "Apartment {} has invalid share {} for user {}",
            apartment.id, user.share, user.user_id
        )));
    }
    Ok(())
}

/// Sum of apartment areas of a house, each apartment counted once.
fn house_area(owners: &[voting_owner::Model], house_id: Uuid) -> f64 {
    let mut seen = HashSet::new();
    owners
        .iter()
        .filter(|o| o.house_id == house_id && seen.insert(o.apartment_id))
        .map(|o| o.apartment_area)
        .sum()
}

/// `area * share / total house area`.
fn vote_weight(owner: &voting_owner::Model, owners: &[voting_owner::Model]) -> AppResult<f64> {
    let total = house_area(owners, owner.house_id);
    if total <= 0.0 {
        return Err(AppError::InvalidOperation(format!(
            "House {} has no area to weigh votes against",
            owner.house_id
        )));
    }
    Ok(owner.apartment_area * owner.share / total)
}

/// Total voted weight and the percentage per declared option.
fn tally(options: &[String], owners: &[voting_owner::Model]) -> (f64, BTreeMap<String, f64>) {
    let mut sums: BTreeMap<String, f64> = options.iter().map(|o| (o.clone(), 0.0)).collect();
    let mut total = 0.0;
    for owner in owners.iter().filter(|o| o.has_voted()) {
        total += owner.vote_weight;
        *sums.entry(owner.response.clone()).or_insert(0.0) += owner.vote_weight;
    }

    let percentages = sums
        .into_iter()
        .map(|(option, sum)| {
            let percent = if total > 0.0 {
                round2(sum / total * 100.0)
            } else {
                0.0
            };
            (option, percent)
        })
        .collect();
    (total, percentages)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
