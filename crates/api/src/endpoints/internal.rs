//! Internal endpoints used by the Telegram bridge.
//!
//! These are reachable without a bearer token and must only be exposed on
//! the internal network.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use condo_common::AppResult;
use condo_core::TelegramVoteInput;
use uuid::Uuid;

use crate::{
    middleware::AppState,
    response::{InternalVotingResponse, MessageResponse},
};

/// Question and options of a voting.
async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<InternalVotingResponse>> {
    let voting = state.voting_service.get_voting(id).await?;
    Ok(Json(voting.into()))
}

/// Apply a Telegram poll answer to the user's apartments.
async fn vote_telegram(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TelegramVoteInput>,
) -> AppResult<Json<MessageResponse>> {
    let receipt = state
        .voting_service
        .submit_vote_from_telegram(id, input)
        .await?;
    Ok(Json(MessageResponse {
        message: receipt.message(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/internal/votings/{id}", get(show))
        .route("/internal/votings/{id}/vote-telegram", post(vote_telegram))
}
