//! Integration tests for the webhook endpoint.
//!
//! These drive the full router with an in-memory tracker and a fixed clock.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, TimeZone, Utc};
use due_date_hook::client::{InMemoryTaskService, ServiceCall};
use due_date_hook::clock::{FixedClock, SharedClock};
use due_date_hook::config::LedgerConfig;
use due_date_hook::dispatch::Dispatcher;
use due_date_hook::ledger::DedupLedger;
use due_date_hook::rules::RuleEngine;
use due_date_hook::server::{WebhookServer, build_router};
use due_date_hook::types::TaskRecord;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper to build a router over the given tracker, with "today" fixed at
/// 2024-01-03.
fn setup(service: &InMemoryTaskService) -> Router {
    let clock: SharedClock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap(),
    ));
    let ledger = Arc::new(DedupLedger::new(&LedgerConfig::default(), clock.clone()));
    let dispatcher = Dispatcher::new(
        Arc::new(service.clone()),
        ledger,
        RuleEngine::default(),
        clock,
    );
    build_router(WebhookServer::new(Arc::new(dispatcher)), "/webhook")
}

fn delivery(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn changed(ts: &str, gid: &str) -> Value {
    json!({
        "created_at": ts,
        "action": "changed",
        "resource": {"gid": gid, "resource_type": "task"}
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn echoes_hook_secret() {
        let service = InMemoryTaskService::new();
        let app = setup(&service);

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("X-Hook-Secret", "abc123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-hook-secret").unwrap(), "abc123");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn handshake_accepted_on_get() {
        let app = setup(&InMemoryTaskService::new());

        let request = Request::builder()
            .method("GET")
            .uri("/webhook")
            .header("X-Hook-Secret", "s3cret")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-hook-secret").unwrap(), "s3cret");
    }

    #[tokio::test]
    async fn get_without_secret_is_rejected() {
        let app = setup(&InMemoryTaskService::new());

        let request = Request::builder()
            .method("GET")
            .uri("/webhook")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod delivery_tests {
    use super::*;

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let service = InMemoryTaskService::new();
        let app = setup(&service);

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "MALFORMED_PAYLOAD");
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn array_body_is_rejected() {
        let service = InMemoryTaskService::new();
        let app = setup(&service);

        for body in [json!([]), json!([[]])] {
            let response = app.clone().oneshot(delivery(body)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["code"], "MALFORMED_PAYLOAD");
        }
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_delivery_is_acknowledged() {
        let app = setup(&InMemoryTaskService::new());

        let response = app.oneshot(delivery(json!({}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "success"}));
    }

    #[tokio::test]
    async fn acknowledged_when_lookup_fails() {
        let service = InMemoryTaskService::new();
        service.insert(TaskRecord::new("A").with_field("Priority", "High"));
        service.fail_fetches_for("A");
        let app = setup(&service);

        let response = app
            .oneshot(delivery(json!({ "events": [changed("t1", "A")] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(service.due_on("A"), None);
    }

    #[tokio::test]
    async fn health_check() {
        let app = setup(&InMemoryTaskService::new());

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }
}

mod rule_tests {
    use super::*;

    #[tokio::test]
    async fn priority_sets_default_due_date() {
        let service = InMemoryTaskService::with_tasks([
            TaskRecord::new("H").with_field("Priority", "High"),
            TaskRecord::new("M").with_field("Priority", "Medium"),
            TaskRecord::new("L").with_field("Priority", "Low"),
            TaskRecord::new("N"),
        ]);
        let app = setup(&service);

        let events = json!({
            "events": [
                changed("t1", "H"),
                changed("t2", "M"),
                changed("t3", "L"),
                changed("t4", "N")
            ]
        });
        let response = app.oneshot(delivery(events)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(service.due_on("H"), Some(date(2024, 1, 5)));
        assert_eq!(service.due_on("M"), Some(date(2024, 1, 10)));
        assert_eq!(service.due_on("L"), Some(date(2024, 1, 17)));
        assert_eq!(service.due_on("N"), None);
    }

    #[tokio::test]
    async fn existing_due_date_is_left_alone() {
        let service = InMemoryTaskService::with_tasks([TaskRecord::new("A")
            .with_field("Priority", "Low")
            .with_due_on(date(2024, 2, 1))]);
        let app = setup(&service);

        app.oneshot(delivery(json!({ "events": [changed("t1", "A")] })))
            .await
            .unwrap();

        assert_eq!(service.due_on("A"), Some(date(2024, 2, 1)));
        assert!(service.updates().is_empty());
    }

    #[tokio::test]
    async fn in_progress_cascade_and_redelivery() {
        let service = InMemoryTaskService::with_tasks([
            TaskRecord::new("T1")
                .in_project("P")
                .with_field("Stage", "In Progress")
                .with_field("Priority", "High")
                .with_due_on(date(2024, 1, 10)),
            TaskRecord::new("T2")
                .in_project("P")
                .with_field("Stage", "In Progress")
                .with_due_on(date(2024, 1, 5)),
            TaskRecord::new("T3")
                .in_project("P")
                .with_field("Stage", "In Progress")
                .with_due_on(date(2024, 1, 6)),
            TaskRecord::new("T4")
                .in_project("P")
                .with_field("Stage", "Done")
                .with_due_on(date(2024, 1, 4)),
        ]);
        let app = setup(&service);
        let payload = json!({ "events": [changed("2024-01-03T12:00:00.000Z", "T1")] });

        let response = app.clone().oneshot(delivery(payload.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(service.due_on("T1"), Some(date(2024, 1, 10)));
        assert_eq!(service.due_on("T2"), Some(date(2024, 1, 7)));
        assert_eq!(service.due_on("T3"), Some(date(2024, 1, 8)));
        assert_eq!(service.due_on("T4"), Some(date(2024, 1, 4)));

        service.clear_calls();
        let response = app.oneshot(delivery(payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(service.calls().is_empty());
        assert_eq!(service.due_on("T2"), Some(date(2024, 1, 7)));
        assert_eq!(service.due_on("T3"), Some(date(2024, 1, 8)));
    }

    #[tokio::test]
    async fn new_event_does_not_shift_twice() {
        let service = InMemoryTaskService::with_tasks([
            TaskRecord::new("T1")
                .in_project("P")
                .with_field("Stage", "In Progress")
                .with_field("Priority", "High")
                .with_due_on(date(2024, 1, 10)),
            TaskRecord::new("T2")
                .in_project("P")
                .with_field("Stage", "In Progress")
                .with_due_on(date(2024, 1, 5)),
        ]);
        let app = setup(&service);

        app.clone()
            .oneshot(delivery(json!({ "events": [changed("t1", "T1")] })))
            .await
            .unwrap();
        app.oneshot(delivery(json!({ "events": [changed("t2", "T1")] })))
            .await
            .unwrap();

        assert_eq!(service.due_on("T2"), Some(date(2024, 1, 7)));
        let updates: Vec<_> = service
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ServiceCall::Update(..)))
            .collect();
        assert_eq!(updates, vec![ServiceCall::Update("T2".to_string(), date(2024, 1, 7))]);
    }
}
