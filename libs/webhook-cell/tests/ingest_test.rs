mod common;

use std::sync::Arc;

use axum::body::Body;
use chrono::Utc;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use shared_utils::signature::encrypt_token;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser, WebhookTestUtils};
use webhook_cell::{webhook_routes, WebhookEventStatus, WebhookEventStore};

use common::{Fixture, ScriptedProvider, MEETING_ID};

fn signed_request(body: Vec<u8>, signature: &str, timestamp: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/zoom")
        .header("content-type", "application/json")
        .header("x-zm-signature", signature)
        .header("x-zm-request-timestamp", timestamp)
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_before_persistence() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    let app = webhook_routes(fixture.config.clone(), fixture.ingestor.clone());

    let body = WebhookTestUtils::event_body("meeting.ended", json!({"id": MEETING_ID}));
    let (_, timestamp) = WebhookTestUtils::sign("test-webhook-secret-token", &body);
    let (forged, _) = WebhookTestUtils::sign("not-the-secret", &body);

    let response = app
        .clone()
        .oneshot(signed_request(body.clone(), &forged, &timestamp))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Missing headers are rejected the same way.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/zoom")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(fixture.events.is_empty().await);
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    let app = webhook_routes(fixture.config.clone(), fixture.ingestor.clone());

    let body = WebhookTestUtils::event_body("meeting.started", json!({"id": MEETING_ID}));
    let old = (Utc::now().timestamp() - 3600).to_string();
    let signature =
        shared_utils::signature::sign_request("test-webhook-secret-token", &old, &body).unwrap();

    let response = app.oneshot(signed_request(body, &signature, &old)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(fixture.events.is_empty().await);
}

#[tokio::test]
async fn test_url_validation_handshake_is_not_persisted() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    let app = webhook_routes(fixture.config.clone(), fixture.ingestor.clone());

    let body = json!({
        "event": "endpoint.url_validation",
        "payload": {"plainToken": "qgg8vlvZRS6UYooatFL8Aw"},
        "event_ts": Utc::now().timestamp_millis()
    })
    .to_string()
    .into_bytes();
    let (signature, timestamp) = WebhookTestUtils::sign("test-webhook-secret-token", &body);

    let response = app.oneshot(signed_request(body, &signature, &timestamp)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let answer = body_json(response).await;
    assert_eq!(answer["plainToken"], "qgg8vlvZRS6UYooatFL8Aw");
    assert_eq!(
        answer["encryptedToken"],
        encrypt_token("test-webhook-secret-token", "qgg8vlvZRS6UYooatFL8Aw").unwrap()
    );
    assert!(fixture.events.is_empty().await);
}

#[tokio::test]
async fn test_supported_and_unsupported_events_are_acknowledged() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    let app = webhook_routes(fixture.config.clone(), fixture.ingestor.clone());

    // Orphan meeting: still a 200 "received".
    let body = WebhookTestUtils::event_body("meeting.started", json!({"id": 99988877766u64}));
    let (signature, timestamp) = WebhookTestUtils::sign("test-webhook-secret-token", &body);
    let response = app
        .clone()
        .oneshot(signed_request(body, &signature, &timestamp))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "received"}));

    let body = WebhookTestUtils::event_body("webinar.started", json!({"id": 1}));
    let (signature, timestamp) = WebhookTestUtils::sign("test-webhook-secret-token", &body);
    let response = app.oneshot(signed_request(body, &signature, &timestamp)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ignored"}));

    let stored = fixture.events.all().await;
    assert_eq!(stored.len(), 2);
    for event in stored {
        let done = fixture.wait_until_done(event.id).await;
        assert_eq!(done.status, WebhookEventStatus::Ignored);
    }
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    let app = webhook_routes(fixture.config.clone(), fixture.ingestor.clone());

    let body = b"{not json".to_vec();
    let (signature, timestamp) = WebhookTestUtils::sign("test-webhook-secret-token", &body);
    let response = app.oneshot(signed_request(body, &signature, &timestamp)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fixture.events.is_empty().await);
}

#[tokio::test]
async fn test_failed_events_are_listed_for_admins_only() {
    let test_config = TestConfig::default();
    let fixture = Fixture::new(Arc::new(ScriptedProvider::default()));
    fixture.seed_appointment().await;

    let broken = fixture
        .store_event("meeting.participant_joined", json!({"id": MEETING_ID}))
        .await;
    fixture.processor.process(broken).await.unwrap();
    assert_eq!(fixture.events.list_failed().await.unwrap().len(), 1);

    let app = webhook_routes(fixture.config.clone(), fixture.ingestor.clone());
    let get = |token: String| {
        Request::builder()
            .uri("/events/failed")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };

    let doctor = JwtTestUtils::create_test_token(&TestUser::doctor("dr.ada@clinic.test"), &test_config.jwt_secret, Some(1));
    let response = app.clone().oneshot(get(doctor)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = JwtTestUtils::create_test_token(&TestUser::admin("ops@clinic.test"), &test_config.jwt_secret, Some(1));
    let response = app.oneshot(get(admin)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listing = body_json(response).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["exhausted"], 0);
    assert_eq!(listing["events"][0]["status"], "FAILED");
    assert_eq!(listing["events"][0]["retry_count"], 1);
}

#[tokio::test]
async fn test_stalled_pending_events_are_listed_for_admins() {
    let test_config = TestConfig::default();
    let mut config = test_config.to_app_config();
    config.webhook_pending_grace_seconds = 0;
    let fixture = Fixture::build(config, Arc::new(ScriptedProvider::default()));

    let stranded = fixture
        .store_event("meeting.started", json!({"id": MEETING_ID}))
        .await;

    let app = webhook_routes(fixture.config.clone(), fixture.ingestor.clone());
    let admin = JwtTestUtils::create_test_token(&TestUser::admin("ops@clinic.test"), &test_config.jwt_secret, Some(1));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/events/failed")
                .header("authorization", format!("Bearer {}", admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listing = body_json(response).await;
    assert_eq!(listing["total"], 0);
    assert_eq!(listing["stalled"][0]["id"], stranded.to_string());
    assert_eq!(listing["stalled"][0]["status"], "PENDING");
}
