//! Voting repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use condo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::entities::{Voting, VotingOwner, voting, voting_owner};

/// Rows per multi-row owner insert; keeps each statement well below the
/// `PostgreSQL` bind parameter limit.
const OWNER_INSERT_CHUNK: usize = 1000;

/// A voting together with (a subset of) its owner snapshot.
pub type VotingWithOwners = (voting::Model, Vec<voting_owner::Model>);

/// Result of a conditional vote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The response was stored.
    Recorded,
    /// The owner already carries a response.
    AlreadyVoted,
    /// The voting was completed before the write.
    VotingClosed,
}

/// Persistence operations the voting engine relies on.
///
/// Every state transition is a conditional update so concurrent callers
/// cannot both win: `record_vote` only touches an owner whose response is
/// still empty in a voting that is still open, `mark_completed` and
/// `complete_expired` only touch votings that are still open.
#[async_trait]
pub trait VotingStore: Send + Sync {
    /// Persist a voting and its full owner snapshot atomically.
    async fn create_with_owners(
        &self,
        voting: voting::Model,
        owners: Vec<voting_owner::Model>,
    ) -> AppResult<voting::Model>;

    /// Find a voting by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<voting::Model>>;

    /// Get a voting by ID, returning error if not found.
    async fn get_by_id(&self, id: Uuid) -> AppResult<voting::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Voting not found: {id}")))
    }

    /// All votings, newest first.
    async fn list_all(&self) -> AppResult<Vec<voting::Model>>;

    /// Every owner record of a voting.
    async fn find_owners(&self, voting_id: Uuid) -> AppResult<Vec<voting_owner::Model>>;

    /// The owner records a user holds in a voting (one per apartment).
    async fn find_owners_for_user(
        &self,
        voting_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<voting_owner::Model>>;

    /// Record a response if the owner has not voted yet and the voting is
    /// still open at the time of the write.
    ///
    /// Fails with [`AppError::NotFound`] when the voting is gone.
    async fn record_vote(
        &self,
        voting_id: Uuid,
        owner_id: Uuid,
        response: &str,
        vote_weight: f64,
    ) -> AppResult<VoteOutcome>;

    /// Flip an open voting to completed. Returns `false` if it already was.
    async fn mark_completed(&self, voting_id: Uuid) -> AppResult<bool>;

    /// Complete every open voting whose end time is at or before `now`.
    async fn complete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Overwrite the decision of a completed voting.
    ///
    /// Returns `false` if the voting is missing or not completed.
    async fn set_decision(&self, voting_id: Uuid, decision: &str) -> AppResult<bool>;

    /// Delete a voting and its owners. Returns `false` if nothing was deleted.
    async fn delete(&self, voting_id: Uuid) -> AppResult<bool>;

    /// Votings the user participates in, filtered by completion, each paired
    /// with that user's own owner records.
    async fn find_by_participant(
        &self,
        user_id: Uuid,
        completed: bool,
    ) -> AppResult<Vec<VotingWithOwners>>;

    /// Completed votings without a decision, each with its full owner set.
    async fn find_completed_without_decision(&self) -> AppResult<Vec<VotingWithOwners>>;
}

/// Voting repository backed by `PostgreSQL`.
#[derive(Clone)]
pub struct VotingRepository {
    db: Arc<DatabaseConnection>,
}

impl VotingRepository {
    /// Create a new voting repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn voting_active(model: voting::Model) -> voting::ActiveModel {
    voting::ActiveModel {
        id: Set(model.id),
        question_put: Set(model.question_put),
        response_options: Set(model.response_options),
        start_time: Set(model.start_time),
        end_time: Set(model.end_time),
        completed: Set(model.completed),
        decision: Set(model.decision),
    }
}

fn owner_active(model: voting_owner::Model) -> voting_owner::ActiveModel {
    voting_owner::ActiveModel {
        id: Set(model.id),
        voting_id: Set(model.voting_id),
        user_id: Set(model.user_id),
        apartment_id: Set(model.apartment_id),
        house_id: Set(model.house_id),
        apartment_area: Set(model.apartment_area),
        share: Set(model.share),
        response: Set(model.response),
        vote_weight: Set(model.vote_weight),
    }
}

/// Pair each voting with its owners, keeping the voting order.
pub(crate) fn group_owners(
    votings: Vec<voting::Model>,
    owners: Vec<voting_owner::Model>,
) -> Vec<VotingWithOwners> {
    let mut by_voting: HashMap<Uuid, Vec<voting_owner::Model>> = HashMap::new();
    for owner in owners {
        by_voting.entry(owner.voting_id).or_default().push(owner);
    }
    votings
        .into_iter()
        .map(|v| {
            let owners = by_voting.remove(&v.id).unwrap_or_default();
            (v, owners)
        })
        .collect()
}

#[async_trait]
impl VotingStore for VotingRepository {
    async fn create_with_owners(
        &self,
        voting: voting::Model,
        owners: Vec<voting_owner::Model>,
    ) -> AppResult<voting::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = voting_active(voting)
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut owners = owners.into_iter().map(owner_active).peekable();
        while owners.peek().is_some() {
            let chunk: Vec<_> = owners.by_ref().take(OWNER_INSERT_CHUNK).collect();
            VotingOwner::insert_many(chunk)
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<voting::Model>> {
        Voting::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_all(&self) -> AppResult<Vec<voting::Model>> {
        Voting::find()
            .order_by_desc(voting::Column::StartTime)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_owners(&self, voting_id: Uuid) -> AppResult<Vec<voting_owner::Model>> {
        VotingOwner::find()
            .filter(voting_owner::Column::VotingId.eq(voting_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_owners_for_user(
        &self,
        voting_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<voting_owner::Model>> {
        VotingOwner::find()
            .filter(voting_owner::Column::VotingId.eq(voting_id))
            .filter(voting_owner::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn record_vote(
        &self,
        voting_id: Uuid,
        owner_id: Uuid,
        response: &str,
        vote_weight: f64,
    ) -> AppResult<VoteOutcome> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // The share lock holds off completion until this transaction ends.
        let voting = Voting::find_by_id(voting_id)
            .lock_shared()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Voting not found: {voting_id}")))?;

        if voting.completed {
            return Ok(VoteOutcome::VotingClosed);
        }

        let result = VotingOwner::update_many()
            .col_expr(voting_owner::Column::Response, Expr::value(response))
            .col_expr(voting_owner::Column::VoteWeight, Expr::value(vote_weight))
            .filter(voting_owner::Column::Id.eq(owner_id))
            .filter(voting_owner::Column::VotingId.eq(voting_id))
            .filter(voting_owner::Column::Response.eq(""))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 1 {
            Ok(VoteOutcome::Recorded)
        } else {
            Ok(VoteOutcome::AlreadyVoted)
        }
    }

    async fn mark_completed(&self, voting_id: Uuid) -> AppResult<bool> {
        let result = Voting::update_many()
            .col_expr(voting::Column::Completed, Expr::value(true))
            .filter(voting::Column::Id.eq(voting_id))
            .filter(voting::Column::Completed.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    async fn complete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = Voting::update_many()
            .col_expr(voting::Column::Completed, Expr::value(true))
            .filter(voting::Column::Completed.eq(false))
            .filter(voting::Column::EndTime.lte(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    async fn set_decision(&self, voting_id: Uuid, decision: &str) -> AppResult<bool> {
        let result = Voting::update_many()
            .col_expr(voting::Column::Decision, Expr::value(decision))
            .filter(voting::Column::Id.eq(voting_id))
            .filter(voting::Column::Completed.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    async fn delete(&self, voting_id: Uuid) -> AppResult<bool> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        VotingOwner::delete_many()
            .filter(voting_owner::Column::VotingId.eq(voting_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Voting::delete_by_id(voting_id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    async fn find_by_participant(
        &self,
        user_id: Uuid,
        completed: bool,
    ) -> AppResult<Vec<VotingWithOwners>> {
        let owners = VotingOwner::find()
            .filter(voting_owner::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut voting_ids: Vec<Uuid> = owners.iter().map(|o| o.voting_id).collect();
        voting_ids.sort_unstable();
        voting_ids.dedup();
        if voting_ids.is_empty() {
            return Ok(Vec::new());
        }

        let votings = Voting::find()
            .filter(voting::Column::Id.is_in(voting_ids))
            .filter(voting::Column::Completed.eq(completed))
            .order_by_desc(voting::Column::StartTime)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(group_owners(votings, owners))
    }

    async fn find_completed_without_decision(&self) -> AppResult<Vec<VotingWithOwners>> {
        let votings = Voting::find()
            .filter(voting::Column::Completed.eq(true))
            .filter(voting::Column::Decision.is_null())
            .order_by_asc(voting::Column::EndTime)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if votings.is_empty() {
            return Ok(Vec::new());
        }

        let owners = VotingOwner::find()
            .filter(voting_owner::Column::VotingId.is_in(votings.iter().map(|v| v.id)))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(group_owners(votings, owners))
    }
}
