//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use cadence_api::rest::AppState;
use cadence_api::server::router;
use cadence_core::InMemoryDirectory;
use cadence_engine::{CadenceEngine, InMemoryRepository, TemplateDraftGenerator};

fn app() -> Router {
    let engine = CadenceEngine::new(
        Arc::new(InMemoryRepository::new()),
        Arc::new(InMemoryDirectory::new()),
        Arc::new(TemplateDraftGenerator::new()),
    );
    router(AppState {
        engine,
        node_id: "test-node".into(),
        start_time: Instant::now(),
        execute_due_limit: 50,
    })
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_sequence(app: &Router) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/sequences",
        Some(json!({
            "name": "Outbound",
            "createdBy": "alice",
            "steps": [
                {"channel": "email", "delayDays": 0},
                {"channel": "call", "delayDays": 2},
                {"channel": "linkedin_connect", "delayDays": 3}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn enroll(app: &Router, sequence_id: &str, contact: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/enrollments",
        Some(json!({
            "sequenceId": sequence_id,
            "contactId": contact,
            "companyDomain": "acme.io",
            "enrolledBy": "alice"
        })),
    )
    .await
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["nodeId"], "test-node");

    assert_eq!(call(&app, Method::GET, "/ready", None).await.0, StatusCode::OK);
    assert_eq!(call(&app, Method::GET, "/live", None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_sequence_validation_messages() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/sequences",
        Some(json!({"name": "Bad", "steps": [{"channel": "telegram", "delayDays": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "Invalid channel \"telegram\"");

    let (status, body) = call(
        &app,
        Method::POST,
        "/sequences",
        Some(json!({"name": "Bad", "steps": [{"channel": "email", "delayDays": "soon"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "delayDays must be a non-negative number");

    let (status, body) = call(&app, Method::POST, "/sequences", Some(json!({"steps": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name is required");
}

#[tokio::test]
async fn test_sequence_crud() {
    let app = app();
    let id = create_sequence(&app).await;

    let (status, body) = call(&app, Method::GET, &format!("/sequences/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["steps"][1]["channel"], "call");
    assert_eq!(body["steps"][1]["delayDays"], 2.0);
    assert_eq!(body["isTemplate"], false);

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/sequences/{id}"),
        Some(json!({"isTemplate": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isTemplate"], true);
    assert_eq!(body["name"], "Outbound");

    let (_, body) = call(&app, Method::GET, "/sequences?templatesOnly=true", None).await;
    assert_eq!(body["sequences"].as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::DELETE, &format!("/sequences/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = call(&app, Method::GET, &format!("/sequences/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_enrollment_lifecycle_over_http() {
    let app = app();
    let sequence_id = create_sequence(&app).await;

    let (status, enrollment) = enroll(&app, &sequence_id, "contact-1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(enrollment["status"], "active");
    assert_eq!(enrollment["currentStep"], 0);
    let id = enrollment["id"].as_str().unwrap().to_string();

    let (status, dup) = enroll(&app, &sequence_id, "contact-1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["error"], "duplicate_enrollment");
    assert_eq!(dup["enrollmentId"], id.as_str());
    assert_eq!(dup["status"], "active");

    let (status, executed) =
        call(&app, Method::POST, &format!("/enrollments/{id}/execute"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(executed["completed"], false);
    assert_eq!(executed["enrollment"]["currentStep"], 1);
    assert!(executed["draftContent"].as_str().unwrap().contains("acme.io"));

    let uri = format!("/enrollments/{id}");
    let (status, paused) = call(&app, Method::PUT, &uri, Some(json!({"action": "pause"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paused["enrollment"]["status"], "paused");
    assert!(paused["enrollment"]["nextStepDueAt"].is_null());

    let (status, body) = call(&app, Method::PUT, &uri, Some(json!({"action": "advance"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_transition");

    let (status, body) = call(&app, Method::PUT, &uri, Some(json!({"action": "snooze"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_action");

    call(&app, Method::PUT, &uri, Some(json!({"action": "resume"}))).await;
    let (status, advanced) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({"action": "advance", "outcome": "connected"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(advanced["enrollment"]["currentStep"], 2);

    let (status, detail) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = detail["stepLogs"].as_array().unwrap();
    assert_eq!(logs[0]["outcome"], "executed");
    assert_eq!(logs[1]["status"], "cancelled");
    assert_eq!(logs[2]["outcome"], "connected");
    assert_eq!(logs.iter().filter(|l| l["status"] == "pending").count(), 1);

    let (status, body) = call(&app, Method::DELETE, &format!("/sequences/{sequence_id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "sequence_in_use");
}

#[tokio::test]
async fn test_list_and_execute_due() {
    let app = app();
    let sequence_id = create_sequence(&app).await;
    enroll(&app, &sequence_id, "contact-1").await;
    let (_, second) = enroll(&app, &sequence_id, "contact-2").await;
    let second_id = second["id"].as_str().unwrap();
    call(
        &app,
        Method::PUT,
        &format!("/enrollments/{second_id}"),
        Some(json!({"action": "unenroll"})),
    )
    .await;

    let (_, listed) = call(&app, Method::GET, "/enrollments?contactId=contact-2", None).await;
    assert_eq!(listed["enrollments"][0]["status"], "unenrolled");

    let (status, body) = call(&app, Method::GET, "/enrollments?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, report) = call(&app, Method::POST, "/enrollments/execute-due", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["executed"].as_array().unwrap().len(), 1);
    assert_eq!(report["executed"][0]["draftGenerated"], true);
    assert!(report["failed"].as_array().unwrap().is_empty());

    let (_, report) = call(
        &app,
        Method::POST,
        "/enrollments/execute-due",
        Some(json!({"limit": 10})),
    )
    .await;
    assert!(report["executed"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_ids() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/enrollments/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = enroll(&app, &uuid::Uuid::new_v4().to_string(), "contact-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().starts_with("Sequence"));
}

#[tokio::test]
async fn test_malformed_query_gets_json_error() {
    let app = app();
    for uri in [
        "/enrollments?dueBy=tomorrow",
        "/enrollments?limit=-1",
        "/sequences?templatesOnly=maybe",
    ] {
        let (status, body) = call(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "invalid_query", "{uri}");
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    let (status, _) = call(
        &app,
        Method::GET,
        "/enrollments?dueBy=2030-01-01T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
