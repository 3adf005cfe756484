//! Core business logic for condo-voting.
//!
//! The voting engine lives in [`services::voting`]; its collaborators are
//! reached through the [`ApartmentDirectory`] and [`VotingEventPublisher`]
//! traits so they can be swapped for in-memory doubles.

pub mod services;

pub use services::*;
