//! Background work and messaging for condo-voting.
//!
//! - **Publisher**: voting events to an AMQP topic exchange
//! - **Scheduler**: periodic voting expiration sweep

pub mod publisher;
pub mod scheduler;

pub use publisher::AmqpVotingPublisher;
pub use scheduler::{JobExecutor, SchedulerConfig, VotingJobExecutor, run_scheduler};
