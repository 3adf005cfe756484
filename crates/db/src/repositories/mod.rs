//! Database repositories.

pub mod voting;

pub use voting::{VoteOutcome, VotingRepository, VotingStore, VotingWithOwners};
