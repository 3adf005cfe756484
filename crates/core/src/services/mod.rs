//! Business logic services.

pub mod apartment;
pub mod event_publisher;
pub mod voting;

pub use apartment::{
    ApartmentDirectory, ApartmentDirectoryService, ApartmentInfo, ApartmentShare,
    HttpApartmentDirectory, InMemoryApartmentDirectory,
};
pub use event_publisher::{
    NoOpVotingEventPublisher, Participant, RecordingVotingEventPublisher, VotingCreatedEvent,
    VotingEventPublisher, VotingEventPublisherService,
};
pub use voting::{
    ApartmentVote, CreateVotingInput, DECISION_PLACEHOLDER, SubmitVoteInput, TelegramVoteInput,
    TelegramVoteReceipt, UnresolvedVotingSummary, UserVotingSummary, VoteReceipt, VotingResults,
    VotingService,
};
