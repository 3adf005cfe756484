//! Test utilities for database operations.
//!
//! Provides helpers for setting up and tearing down test databases, and an
//! in-memory [`VotingStore`] for engine tests that do not need `PostgreSQL`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use condo_common::{AppError, AppResult};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::entities::{voting, voting_owner};
use crate::repositories::voting::{VoteOutcome, VotingStore, VotingWithOwners, group_owners};

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "condo_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "condo_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "condo_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Get URL for connecting to postgres database (for creating test DB).
    #[must_use]
    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/postgres",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A test database context that manages the lifecycle of a test database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: DatabaseConnection,
    /// Database configuration.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the configured test database and run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect with a custom configuration and run migrations.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        use sea_orm_migration::MigratorTrait;

        let conn = Database::connect(&config.database_url()).await?;
        crate::migrations::Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self { conn, config })
    }

    /// Create a unique, migrated test database (for parallel tests).
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let unique_suffix = Uuid::new_v4().simple().to_string();
        config.database = format!("condo_test_{}", &unique_suffix[..8]);

        let postgres_conn = Database::connect(&config.postgres_url()).await?;
        let create_db = format!("CREATE DATABASE \"{}\"", config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, create_db))
            .await?;
        postgres_conn.close().await?;

        info!(database = %config.database, "Created unique test database");

        Self::with_config(config).await
    }

    /// Get the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Remove all votings (owners go with them through the cascade).
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        self.conn
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                "TRUNCATE TABLE \"voting\" CASCADE".to_string(),
            ))
            .await?;

        info!("Cleaned up test database");
        Ok(())
    }

    /// Drop the test database (for unique databases).
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;

        let postgres_conn = Database::connect(&self.config.postgres_url()).await?;
        let drop_db = format!("DROP DATABASE IF EXISTS \"{}\"", self.config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, drop_db))
            .await?;
        postgres_conn.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    votings: Vec<voting::Model>,
    owners: Vec<voting_owner::Model>,
    close_before_next_vote: bool,
    votes_until_failure: Option<usize>,
}

/// In-memory [`VotingStore`] with the same conditional-update semantics as
/// the `PostgreSQL` repository.
#[derive(Default)]
pub struct InMemoryVotingStore {
    state: Mutex<MemoryState>,
}

impl InMemoryVotingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one owner record, for assertions.
    pub async fn owner(&self, owner_id: Uuid) -> Option<voting_owner::Model> {
        let state = self.state.lock().await;
        state.owners.iter().find(|o| o.id == owner_id).cloned()
    }

    /// Number of owner records across all votings.
    pub async fn owner_count(&self) -> usize {
        self.state.lock().await.owners.len()
    }

    /// Complete the target voting right before the next `record_vote`
    /// writes, as if the expiration sweep ran in between.
    pub async fn close_before_next_vote(&self) {
        self.state.lock().await.close_before_next_vote = true;
    }

    /// Let `count` more votes through; every later `record_vote` still
    /// writes but reports a database error, like a connection lost before
    /// the reply arrived.
    pub async fn lose_vote_acks_after(&self, count: usize) {
        self.state.lock().await.votes_until_failure = Some(count);
    }
}

#[async_trait]
impl VotingStore for InMemoryVotingStore {
    async fn create_with_owners(
        &self,
        voting: voting::Model,
        owners: Vec<voting_owner::Model>,
    ) -> AppResult<voting::Model> {
        let mut state = self.state.lock().await;
        state.votings.push(voting.clone());
        state.owners.extend(owners);
        Ok(voting)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<voting::Model>> {
        let state = self.state.lock().await;
        Ok(state.votings.iter().find(|v| v.id == id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<voting::Model>> {
        let state = self.state.lock().await;
        let mut votings = state.votings.clone();
        votings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(votings)
    }

    async fn find_owners(&self, voting_id: Uuid) -> AppResult<Vec<voting_owner::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .owners
            .iter()
            .filter(|o| o.voting_id == voting_id)
            .cloned()
            .collect())
    }

    async fn find_owners_for_user(
        &self,
        voting_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<voting_owner::Model>> {
        let state = self.state.lock().await;
        Ok(state
            .owners
            .iter()
            .filter(|o| o.voting_id == voting_id && o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn record_vote(
        &self,
        voting_id: Uuid,
        owner_id: Uuid,
        response: &str,
        vote_weight: f64,
    ) -> AppResult<VoteOutcome> {
        let mut state = self.state.lock().await;

        let budget = state.votes_until_failure;
        let lose_ack = match budget {
            Some(0) => true,
            Some(left) => {
                state.votes_until_failure = Some(left - 1);
                false
            }
            None => false,
        };

        let close_first = std::mem::take(&mut state.close_before_next_vote);
        let voting = state
            .votings
            .iter_mut()
            .find(|v| v.id == voting_id)
            .ok_or_else(|| AppError::NotFound(format!("Voting not found: {voting_id}")))?;
        if close_first {
            voting.completed = true;
        }
        if voting.completed {
            return Ok(VoteOutcome::VotingClosed);
        }

        let outcome = match state
            .owners
            .iter_mut()
            .find(|o| o.id == owner_id && o.voting_id == voting_id && o.response.is_empty())
        {
            Some(owner) => {
                owner.response = response.to_string();
                owner.vote_weight = vote_weight;
                VoteOutcome::Recorded
            }
            None => VoteOutcome::AlreadyVoted,
        };

        if lose_ack {
            return Err(AppError::Database(
                "Connection lost after write".to_string(),
            ));
        }
        Ok(outcome)
    }

    async fn mark_completed(&self, voting_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .votings
            .iter_mut()
            .find(|v| v.id == voting_id && !v.completed)
        {
            Some(voting) => {
                voting.completed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut count = 0;
        for voting in state
            .votings
            .iter_mut()
            .filter(|v| !v.completed && v.end_time <= now)
        {
            voting.completed = true;
            count += 1;
        }
        Ok(count)
    }

    async fn set_decision(&self, voting_id: Uuid, decision: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .votings
            .iter_mut()
            .find(|v| v.id == voting_id && v.completed)
        {
            Some(voting) => {
                voting.decision = Some(decision.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, voting_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.votings.len();
        state.votings.retain(|v| v.id != voting_id);
        state.owners.retain(|o| o.voting_id != voting_id);
        Ok(state.votings.len() != before)
    }

    async fn find_by_participant(
        &self,
        user_id: Uuid,
        completed: bool,
    ) -> AppResult<Vec<VotingWithOwners>> {
        let state = self.state.lock().await;
        let owners: Vec<_> = state
            .owners
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        let voting_ids: HashSet<Uuid> = owners.iter().map(|o| o.voting_id).collect();
        let mut votings: Vec<_> = state
            .votings
            .iter()
            .filter(|v| v.completed == completed && voting_ids.contains(&v.id))
            .cloned()
            .collect();
        votings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(group_owners(votings, owners))
    }

    async fn find_completed_without_decision(&self) -> AppResult<Vec<VotingWithOwners>> {
        let state = self.state.lock().await;
        let mut votings: Vec<_> = state
            .votings
            .iter()
            .filter(|v| v.completed && v.decision.is_none())
            .cloned()
            .collect();
        votings.sort_by(|a, b| a.end_time.cmp(&b.end_time));
        Ok(group_owners(votings, state.owners.clone()))
    }
}
