//! Database entities.

pub mod voting;
pub mod voting_owner;

pub use voting::Entity as Voting;
pub use voting_owner::Entity as VotingOwner;
