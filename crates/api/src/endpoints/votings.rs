//! Voting endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use condo_common::AppResult;
use condo_core::{
    CreateVotingInput, SubmitVoteInput, UnresolvedVotingSummary, UserVotingSummary, VotingResults,
};
use uuid::Uuid;

use crate::{extractors::AuthUser, middleware::AppState, response::VotingResponse};

/// List all votings.
async fn list(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<VotingResponse>>> {
    let votings = state.voting_service.list_votings().await?;
    Ok(Json(votings.into_iter().map(Into::into).collect()))
}

/// Create a voting for the owners of the given houses.
async fn create(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateVotingInput>,
) -> AppResult<(StatusCode, Json<VotingResponse>)> {
    tracing::debug!(%user_id, houses = input.house_ids.len(), "Creating voting");
    let voting = state.voting_service.create_voting(input).await?;
    Ok((StatusCode::CREATED, Json(voting.into())))
}

/// Get a voting.
async fn show(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<VotingResponse>> {
    let voting = state.voting_service.get_voting(id).await?;
    Ok(Json(voting.into()))
}

/// Vote for one apartment.
async fn vote(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SubmitVoteInput>,
) -> AppResult<String> {
    let receipt = state.voting_service.submit_vote(id, user_id, input).await?;
    Ok(receipt.message())
}

/// Weighted results of a completed voting.
async fn results(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<VotingResults>> {
    Ok(Json(state.voting_service.get_results(id).await?))
}

/// Record the decision. The body is the decision text, optionally as a
/// JSON string literal.
async fn decision(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: String,
) -> AppResult<StatusCode> {
    let text = serde_json::from_str::<String>(&body).unwrap_or(body);
    state.voting_service.set_decision(id, &text).await?;
    Ok(StatusCode::OK)
}

/// Delete a voting.
async fn delete(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.voting_service.delete_voting(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn user_active(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<UserVotingSummary>>> {
    Ok(Json(state.voting_service.user_votings(user_id, false).await?))
}

async fn user_completed(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<UserVotingSummary>>> {
    Ok(Json(state.voting_service.user_votings(user_id, true).await?))
}

/// Completed votings still waiting for a decision.
async fn completed_without_decision(
    AuthUser(_): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UnresolvedVotingSummary>>> {
    Ok(Json(
        state.voting_service.completed_without_decision().await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/votings", get(list).post(create))
        .route(
            "/votings/completed-without-decision",
            get(completed_without_decision),
        )
        .route("/votings/user/{user_id}/active", get(user_active))
        .route("/votings/user/{user_id}/completed", get(user_completed))
        .route("/votings/{id}", get(show).delete(delete))
        .route("/votings/{id}/vote", post(vote))
        .route("/votings/{id}/results", get(results))
        .route("/votings/{id}/decision", post(decision))
}
