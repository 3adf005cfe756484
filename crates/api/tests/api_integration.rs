//! API integration tests.
//!
//! These tests drive the router end to end over in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware,
    routing::get,
};
use condo_api::{AppState, Claims, JwtVerifier, auth_middleware, health, router as api_router};
use condo_core::{
    ApartmentInfo, ApartmentShare, InMemoryApartmentDirectory, RecordingVotingEventPublisher,
    VotingService,
};
use condo_db::test_utils::InMemoryVotingStore;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    publisher: Arc<RecordingVotingEventPublisher>,
    house: Uuid,
    a1: Uuid,
    a2: Uuid,
    u1: Uuid,
    u2: Uuid,
}

/// House with A1 (60 m2, U1) and A2 (40 m2, U2).
fn create_test_app() -> TestApp {
    let (house, a1, a2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

    let directory = InMemoryApartmentDirectory::new().with_house(
        house,
        vec![
            ApartmentInfo {
                id: a1,
                number: 1,
                total_area: 60.0,
                users: vec![ApartmentShare {
                    user_id: u1,
                    share: 1.0,
                }],
            },
            ApartmentInfo {
                id: a2,
                number: 2,
                total_area: 40.0,
                users: vec![ApartmentShare {
                    user_id: u2,
                    share: 1.0,
                }],
            },
        ],
    );
    let publisher = Arc::new(RecordingVotingEventPublisher::new());
    let voting_service = VotingService::new(
        Arc::new(InMemoryVotingStore::new()),
        Arc::new(directory),
        publisher.clone(),
    );
    let state = AppState {
        voting_service,
        jwt: JwtVerifier::new(SECRET),
    };

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    TestApp {
        router,
        publisher,
        house,
        a1,
        a2,
        u1,
        u2,
    }
}

fn bearer(user: Uuid) -> String {
    let claims = Claims {
        sub: user,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<String>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn json_of(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

async fn create_voting(app: &TestApp) -> Uuid {
    let body = json!({
        "questionPut": "Replace the elevator?",
        "responseOptions": ["Yes", "No"],
        "houseIds": [app.house],
        "durationInHours": 48,
    });
    let (status, bytes) = send(
        app,
        "POST",
        "/api/votings",
        Some(app.u1),
        Some(body.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_of(&bytes);
    created["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, bytes) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&bytes)["status"], "ok");
}

#[tokio::test]
async fn test_public_endpoints_require_token() {
    let app = create_test_app();

    let (status, bytes) = send(&app, "GET", "/api/votings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_of(&bytes)["error"]["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/votings")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_list_votings() {
    let app = create_test_app();
    let id = create_voting(&app).await;

    let (status, bytes) = send(&app, "GET", "/api/votings", Some(app.u2), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = json_of(&bytes);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], json!(id));
    assert_eq!(list[0]["responseOptions"], json!(["Yes", "No"]));
    assert_eq!(list[0]["completed"], false);

    let (status, bytes) = send(&app, "GET", &format!("/api/votings/{id}"), Some(app.u2), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&bytes)["questionPut"], "Replace the elevator?");

    let events = app.publisher.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].participants.len(), 2);
}

#[tokio::test]
async fn test_create_with_single_option_is_rejected() {
    let app = create_test_app();
    let body = json!({
        "questionPut": "Q",
        "responseOptions": ["Yes"],
        "houseIds": [app.house],
        "durationInHours": 1,
    });

    let (status, _) = send(&app, "POST", "/api/votings", Some(app.u1), Some(body.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vote_flow_until_results() {
    let app = create_test_app();
    let id = create_voting(&app).await;

    let (status, _) = send(&app, "GET", &format!("/api/votings/{id}/results"), Some(app.u1), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let vote = json!({ "userId": app.u1, "apartmentId": app.a1, "response": "Yes" });
    let (status, bytes) = send(
        &app,
        "POST",
        &format!("/api/votings/{id}/vote"),
        Some(app.u1),
        Some(vote.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("0.6"));

    let vote = json!({ "userId": app.u2, "apartmentId": app.a2, "response": "No" });
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/votings/{id}/vote"),
        Some(app.u2),
        Some(vote.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, bytes) = send(&app, "GET", &format!("/api/votings/{id}/results"), Some(app.u1), None).await;
    assert_eq!(status, StatusCode::OK);
    let results = json_of(&bytes);
    assert_eq!(results["responses"]["Yes"], 60.0);
    assert_eq!(results["responses"]["No"], 40.0);
    assert_eq!(results["decision"], "Decision not yet made");
}

#[tokio::test]
async fn test_vote_for_someone_else_is_unauthorized() {
    let app = create_test_app();
    let id = create_voting(&app).await;

    let vote = json!({ "userId": app.u1, "apartmentId": app.a1, "response": "Yes" });
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/votings/{id}/vote"),
        Some(app.u2),
        Some(vote.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_vote_on_unknown_voting_is_not_found() {
    let app = create_test_app();

    let vote = json!({ "userId": app.u1, "apartmentId": app.a1, "response": "Yes" });
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/votings/{}/vote", Uuid::new_v4()),
        Some(app.u1),
        Some(vote.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_telegram_vote_and_already_voted() {
    let app = create_test_app();
    let id = create_voting(&app).await;

    let (status, bytes) = send(&app, "GET", &format!("/api/internal/votings/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&bytes)["responseOptions"], json!(["Yes", "No"]));

    let answer = json!({ "userId": app.u1, "response": "No" });
    let uri = format!("/api/internal/votings/{id}/vote-telegram");
    let (status, bytes) = send(&app, "POST", &uri, None, Some(answer.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_of(&bytes)["message"].as_str().unwrap().contains('1'));

    let answer = json!({ "userId": app.u1, "response": "Yes" });
    let (status, bytes) = send(&app, "POST", &uri, None, Some(answer.to_string())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let body = json_of(&bytes);
    assert_eq!(body["alreadyVoted"], true);
    assert_eq!(body["previousResponse"], "No");

    // The web channel sees the Telegram vote too.
    let vote = json!({ "userId": app.u1, "apartmentId": app.a1, "response": "Yes" });
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/votings/{id}/vote"),
        Some(app.u1),
        Some(vote.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_decision_accepts_raw_and_json_string() {
    let app = create_test_app();
    let id = create_voting(&app).await;
    let uri = format!("/api/votings/{id}/decision");

    // Not completed yet.
    let (status, _) = send(&app, "POST", &uri, Some(app.u1), Some("Approved".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (user, apartment) in [(app.u1, app.a1), (app.u2, app.a2)] {
        let vote = json!({ "userId": user, "apartmentId": apartment, "response": "Yes" });
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/votings/{id}/vote"),
            Some(user),
            Some(vote.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, bytes) = send(
        &app,
        "GET",
        "/api/votings/completed-without-decision",
        Some(app.u1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let unresolved = json_of(&bytes);
    assert_eq!(unresolved[0]["votedOwners"], 2);
    assert_eq!(unresolved[0]["totalOwners"], 2);

    let (status, _) = send(&app, "POST", &uri, Some(app.u1), Some("Approved".to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        &uri,
        Some(app.u1),
        Some("\"Approved unanimously\"".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, bytes) = send(&app, "GET", &format!("/api/votings/{id}/results"), Some(app.u1), None).await;
    assert_eq!(json_of(&bytes)["decision"], "Approved unanimously");

    let (_, bytes) = send(
        &app,
        "GET",
        "/api/votings/completed-without-decision",
        Some(app.u1),
        None,
    )
    .await;
    assert!(json_of(&bytes).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_user_listings() {
    let app = create_test_app();
    let id = create_voting(&app).await;

    let (status, bytes) = send(
        &app,
        "GET",
        &format!("/api/votings/user/{}/active", app.u2),
        Some(app.u2),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let active = json_of(&bytes);
    assert_eq!(active[0]["id"], json!(id));
    assert_eq!(active[0]["apartments"][0]["apartmentId"], json!(app.a2));
    assert!(active[0]["apartments"][0]["response"].is_null());

    let (status, bytes) = send(
        &app,
        "GET",
        &format!("/api/votings/user/{}/completed", app.u2),
        Some(app.u2),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_of(&bytes).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_voting() {
    let app = create_test_app();
    let id = create_voting(&app).await;
    let uri = format!("/api/votings/{id}");

    let (status, _) = send(&app, "DELETE", &uri, Some(app.u1), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &uri, Some(app.u1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &uri, Some(app.u1), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_app();

    let (status, _) = send(&app, "GET", "/nonexistent/endpoint", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
