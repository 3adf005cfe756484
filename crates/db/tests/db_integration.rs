//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `condo_test`)
//!   `TEST_DB_PASSWORD` (default: `condo_test`)
//!   `TEST_DB_NAME` (default: `condo_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use condo_db::entities::{voting, voting_owner};
use condo_db::repositories::{VoteOutcome, VotingRepository, VotingStore};
use condo_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::SqlxPostgresConnector;
use serde_json::json;
use uuid::Uuid;

fn voting_ending_in(hours: i64) -> voting::Model {
    let now = Utc::now();
    voting::Model {
        id: Uuid::new_v4(),
        question_put: "Replace the elevator?".to_string(),
        response_options: json!(["Yes", "No"]),
        start_time: (now - Duration::hours(48)).into(),
        end_time: (now + Duration::hours(hours)).into(),
        completed: false,
        decision: None,
    }
}

fn owner(voting_id: Uuid, user_id: Uuid, area: f64, share: f64) -> voting_owner::Model {
    voting_owner::Model {
        id: Uuid::new_v4(),
        voting_id,
        user_id,
        apartment_id: Uuid::new_v4(),
        house_id: Uuid::nil(),
        apartment_area: area,
        share,
        response: String::new(),
        vote_weight: 0.0,
    }
}

async fn repository() -> (TestDatabase, VotingRepository) {
    let db = TestDatabase::create_unique()
        .await
        .expect("Failed to create test database");
    // `DatabaseConnection` is not `Clone` with sea-orm's `mock` feature
    // (enabled for unit tests), so share the underlying pool instead.
    let conn = SqlxPostgresConnector::from_sqlx_postgres_pool(
        db.connection().get_postgres_connection_pool().clone(),
    );
    let repo = VotingRepository::new(Arc::new(conn));
    (db, repo)
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_create_and_read_back_snapshot() {
    let (db, repo) = repository().await;
    let voting = voting_ending_in(24);
    let user = Uuid::new_v4();
    let owners = vec![owner(voting.id, user, 60.0, 1.0), owner(voting.id, user, 40.0, 0.5)];

    repo.create_with_owners(voting.clone(), owners).await.unwrap();

    let found = repo.get_by_id(voting.id).await.unwrap();
    assert_eq!(found.options(), vec!["Yes", "No"]);
    assert_eq!(repo.find_owners(voting.id).await.unwrap().len(), 2);
    assert_eq!(repo.find_owners_for_user(voting.id, user).await.unwrap().len(), 2);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_record_vote_first_write_wins() {
    let (db, repo) = repository().await;
    let voting = voting_ending_in(24);
    let single = owner(voting.id, Uuid::new_v4(), 60.0, 1.0);
    let owner_id = single.id;
    repo.create_with_owners(voting.clone(), vec![single]).await.unwrap();

    let (a, b) = tokio::join!(
        repo.record_vote(voting.id, owner_id, "Yes", 1.0),
        repo.record_vote(voting.id, owner_id, "No", 1.0)
    );
    let mut outcomes = [a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == VoteOutcome::AlreadyVoted);
    assert_eq!(outcomes, [VoteOutcome::Recorded, VoteOutcome::AlreadyVoted]);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_record_vote_after_completion_is_rejected() {
    let (db, repo) = repository().await;
    let voting = voting_ending_in(24);
    let single = owner(voting.id, Uuid::new_v4(), 60.0, 1.0);
    let owner_id = single.id;
    repo.create_with_owners(voting.clone(), vec![single]).await.unwrap();

    assert!(repo.mark_completed(voting.id).await.unwrap());
    assert_eq!(
        repo.record_vote(voting.id, owner_id, "Yes", 1.0).await.unwrap(),
        VoteOutcome::VotingClosed
    );
    assert!(!repo.find_owners(voting.id).await.unwrap()[0].has_voted());

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_complete_expired_only_touches_overdue_votings() {
    let (db, repo) = repository().await;
    let overdue = voting_ending_in(-1);
    let open = voting_ending_in(1);
    repo.create_with_owners(overdue.clone(), vec![]).await.unwrap();
    repo.create_with_owners(open.clone(), vec![]).await.unwrap();

    assert_eq!(repo.complete_expired(Utc::now()).await.unwrap(), 1);
    assert_eq!(repo.complete_expired(Utc::now()).await.unwrap(), 0);
    assert!(repo.get_by_id(overdue.id).await.unwrap().completed);
    assert!(!repo.get_by_id(open.id).await.unwrap().completed);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_removes_owners() {
    let (db, repo) = repository().await;
    let voting = voting_ending_in(24);
    repo.create_with_owners(voting.clone(), vec![owner(voting.id, Uuid::new_v4(), 50.0, 1.0)])
        .await
        .unwrap();

    assert!(repo.delete(voting.id).await.unwrap());
    assert!(!repo.delete(voting.id).await.unwrap());
    assert!(repo.find_owners(voting.id).await.unwrap().is_empty());

    db.drop_database().await.unwrap();
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("5432"));
    assert!(url.contains("testuser"));
    assert!(url.contains("testdb"));
}
