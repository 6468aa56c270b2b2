//! HTTP API integration tests
//!
//! Drives the router with `oneshot` requests against an in-memory database and
//! scripted provider/store fakes.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::*;
use http_body_util::BodyExt;
use plate_gen::db::section_images;
use plate_gen::models::{Section, SectionImageRecord};
use plate_gen::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    state: AppState,
    provider: Arc<ScriptedProvider>,
}

async fn test_app(provider: ScriptedProvider) -> TestApp {
    let pool = test_pool().await;
    let provider = Arc::new(provider);
    let store = Arc::new(RecordingStore::new());
    let orchestrator = orchestrator(&pool, provider.clone(), store, fast_settings());
    TestApp {
        state: AppState::new(pool, orchestrator),
        provider,
    }
}

async fn send(state: &AppState, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn generate_uri(artifact_id: Uuid) -> String {
    format!("/artifacts/{}/images/generate", artifact_id)
}

/// TC-API-001: POST generate returns 202 without waiting for generation
#[tokio::test]
async fn tc_api_001_generate_returns_accepted() {
    // Given: an artifact with 2 sections and a slow provider
    let app = test_app(ScriptedProvider::new().with_latency(Duration::from_millis(200))).await;
    let artifact = seed_artifact(&app.state.db, "Mug", sections(&["Abstract", "Claims"])).await;

    // When
    let (status, body) = send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;

    // Then: accepted with job details, before any section finished
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["artifact_id"], artifact.artifact_id.to_string());
    assert_eq!(body["total_sections"], 2);
    assert_eq!(
        body["progress_url"],
        format!("/artifacts/{}/images/progress", artifact.artifact_id)
    );
    assert!(Uuid::parse_str(body["job_id"].as_str().unwrap()).is_ok());
    assert_eq!(
        section_images::count_records(&app.state.db, artifact.artifact_id)
            .await
            .unwrap(),
        0
    );

    let record = app.state.jobs.get(artifact.artifact_id).await.unwrap();
    let terminal = wait_terminal(&record.channel).await;
    assert_eq!(terminal.current, 2);
}

/// TC-API-002: unknown artifact is 404
#[tokio::test]
async fn tc_api_002_generate_unknown_artifact() {
    let app = test_app(ScriptedProvider::new()).await;

    let (status, body) = send(&app.state, "POST", &generate_uri(Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(app.provider.call_count(), 0);
}

/// TC-API-003: a second start while a job runs is 409
#[tokio::test]
async fn tc_api_003_second_generate_conflicts() {
    let app = test_app(ScriptedProvider::new().with_latency(Duration::from_millis(300))).await;
    let artifact = seed_artifact(&app.state.db, "Mug", sections(&["Abstract", "Claims"])).await;

    let (first, _) = send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;
    let (second, body) = send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;

    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Once the first job finished a new one may start
    let record = app.state.jobs.get(artifact.artifact_id).await.unwrap();
    wait_terminal(&record.channel).await;
    let (third, _) = send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;
    assert_eq!(third, StatusCode::ACCEPTED);
}

/// TC-API-004: a section with an empty heading is rejected with 400
#[tokio::test]
async fn tc_api_004_invalid_sections_rejected() {
    let app = test_app(ScriptedProvider::new()).await;
    let artifact = plate_gen::models::Artifact {
        artifact_id: Uuid::new_v4(),
        title: "Broken".to_string(),
        sections: vec![Section::new("Abstract", "a", 1), Section::new("", "b", 2)],
    };
    let state = app
        .state
        .clone()
        .with_artifact_source(Arc::new(FixedSource(artifact.clone())));

    let (status, body) = send(&state, "POST", &generate_uri(artifact.artifact_id)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("empty heading"));
    assert!(state.jobs.get(artifact.artifact_id).await.is_none());
}

struct FixedSource(plate_gen::models::Artifact);

#[async_trait::async_trait]
impl plate_gen::services::ArtifactSource for FixedSource {
    async fn load_artifact(
        &self,
        artifact_id: Uuid,
    ) -> plate_common::Result<Option<plate_gen::models::Artifact>> {
        Ok(Some(self.0.clone()).filter(|a| a.artifact_id == artifact_id))
    }
}

/// TC-API-005: status reflects the finished job
#[tokio::test]
async fn tc_api_005_status_after_completion() {
    let app = test_app(ScriptedProvider::new()).await;
    let artifact = seed_artifact(
        &app.state.db,
        "Mug",
        sections(&["Abstract", "Background", "Claims"]),
    )
    .await;

    let (status, _) = send(
        &app.state,
        "GET",
        &format!("/artifacts/{}/images/status", artifact.artifact_id),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;
    let record = app.state.jobs.get(artifact.artifact_id).await.unwrap();
    wait_terminal(&record.channel).await;

    let (status, body) = send(
        &app.state,
        "GET",
        &format!("/artifacts/{}/images/status", artifact.artifact_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "terminal");
    assert_eq!(body["percentage"], 100);
    assert_eq!(body["progress"]["stage"], "complete");
    assert_eq!(body["progress"]["current"], 3);
    assert_eq!(body["progress"]["complete"], true);
}

/// TC-API-006: SSE stream ends with the terminal snapshot
#[tokio::test]
async fn tc_api_006_progress_stream_closes_after_terminal() {
    // Given: a running job
    let app = test_app(ScriptedProvider::new().with_latency(Duration::from_millis(20))).await;
    let artifact = seed_artifact(&app.state.db, "Mug", sections(&["Abstract", "Claims"])).await;
    send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;

    // When: a client reads the whole progress stream
    let response = build_router(app.state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/artifacts/{}/images/progress", artifact.artifact_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let bytes = tokio::time::timeout(Duration::from_secs(10), response.into_body().collect())
        .await
        .expect("stream closed by server")
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    // Then: progress events only, the last one terminal
    let data: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|json| serde_json::from_str(json.trim()).unwrap())
        .collect();
    assert!(!data.is_empty());
    assert!(text
        .lines()
        .filter_map(|line| line.strip_prefix("event:"))
        .all(|name| name.trim() == "progress"));
    let last = data.last().unwrap();
    assert_eq!(last["complete"], true);
    assert_eq!(last["current"], 2);
    assert_eq!(last["total"], 2);
    assert_eq!(data.iter().filter(|d| d["complete"] == true).count(), 1);
}

/// TC-API-007: subscribing after completion yields only the terminal snapshot
#[tokio::test]
async fn tc_api_007_late_subscriber_gets_terminal() {
    let app = test_app(ScriptedProvider::new()).await;
    let artifact = seed_artifact(&app.state.db, "Mug", sections(&["Abstract"])).await;
    send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;
    let record = app.state.jobs.get(artifact.artifact_id).await.unwrap();
    wait_terminal(&record.channel).await;

    let response = build_router(app.state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/artifacts/{}/images/progress", artifact.artifact_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = tokio::time::timeout(Duration::from_secs(5), response.into_body().collect())
        .await
        .unwrap()
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let events: Vec<&str> = text.lines().filter(|l| l.starts_with("data:")).collect();
    assert_eq!(events.len(), 1);
    assert!(events[0].contains("\"complete\":true"));
}

/// TC-API-008: progress for an artifact without a job is 404
#[tokio::test]
async fn tc_api_008_progress_without_job() {
    let app = test_app(ScriptedProvider::new()).await;
    let (status, _) = send(
        &app.state,
        "GET",
        &format!("/artifacts/{}/images/progress", Uuid::new_v4()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// TC-API-009: cancel stops a running job; cancelling again is 400
#[tokio::test]
async fn tc_api_009_cancel_running_job() {
    let app = test_app(ScriptedProvider::new().with_latency(Duration::from_millis(200))).await;
    let artifact = seed_artifact(
        &app.state.db,
        "Mug",
        sections(&["Abstract", "Background", "Claims"]),
    )
    .await;
    let cancel_uri = format!("/artifacts/{}/images/cancel", artifact.artifact_id);

    let (status, _) = send(&app.state, "POST", &cancel_uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;
    let (status, body) = send(&app.state, "POST", &cancel_uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancel_requested"], true);

    let record = app.state.jobs.get(artifact.artifact_id).await.unwrap();
    let terminal = wait_terminal(&record.channel).await;
    assert_eq!(terminal.stage.as_str(), "cancelled");
    assert_eq!(terminal.current, terminal.total);
    assert!(app.provider.call_count() < 3);

    let (status, _) = send(&app.state, "POST", &cancel_uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// TC-API-010: image listing returns all records or only current ones
#[tokio::test]
async fn tc_api_010_list_images() {
    let app = test_app(ScriptedProvider::new()).await;
    let artifact_id = Uuid::new_v4();

    let base = chrono::Utc::now();
    for (order, offset_ms, url) in [(1u32, 0i64, "old-1"), (0, 5, "only-0"), (1, 10, "new-1")] {
        let record = SectionImageRecord {
            image_id: Uuid::new_v4(),
            artifact_id,
            section_heading: format!("Section {}", order),
            section_order: order,
            image_url: format!("https://store.test/{}", url),
            prompt_used: "prompt".to_string(),
            revised_prompt: None,
            image_size: "1024x1024".to_string(),
            generation_cost: 0.04,
            created_at: base + chrono::Duration::milliseconds(offset_ms),
        };
        section_images::insert_record(&app.state.db, &record)
            .await
            .unwrap();
    }

    let (status, body) = send(&app.state, "GET", &format!("/artifacts/{}/images", artifact_id)).await;
    assert_eq!(status, StatusCode::OK);
    let urls: Vec<&str> = body["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["image_url"].as_str().unwrap())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://store.test/only-0",
            "https://store.test/old-1",
            "https://store.test/new-1"
        ]
    );
    assert!((body["total_cost"].as_f64().unwrap() - 0.12).abs() < 1e-9);

    let (_, body) = send(
        &app.state,
        "GET",
        &format!("/artifacts/{}/images?current=true", artifact_id),
    )
    .await;
    let urls: Vec<&str> = body["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["image_url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["https://store.test/only-0", "https://store.test/new-1"]);
    assert!((body["total_cost"].as_f64().unwrap() - 0.08).abs() < 1e-9);
}

/// TC-API-011: health reports module identity and active jobs
#[tokio::test]
async fn tc_api_011_health() {
    let app = test_app(ScriptedProvider::new()).await;

    let (status, body) = send(&app.state, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "plate-gen");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["active_jobs"], 0);
}

/// TC-API-012: empty listing for an artifact with no images
#[tokio::test]
async fn tc_api_012_list_images_empty() {
    let app = test_app(ScriptedProvider::new()).await;
    let (status, body) = send(
        &app.state,
        "GET",
        &format!("/artifacts/{}/images", Uuid::new_v4()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"].as_array().unwrap().len(), 0);
    assert_eq!(body["total_cost"], 0.0);
}

/// Open the progress stream, read one event, then hang up
///
/// Returns the job's terminal snapshot stage and the provider call count.
async fn disconnect_after_first_event(cancel_on_disconnect: bool) -> (String, usize) {
    let app = test_app(ScriptedProvider::new().with_latency(Duration::from_millis(100))).await;
    let artifact = seed_artifact(
        &app.state.db,
        "Mug",
        sections(&["Abstract", "Background", "Summary", "Claims"]),
    )
    .await;
    send(&app.state, "POST", &generate_uri(artifact.artifact_id)).await;

    let response = build_router(app.state.clone())
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/artifacts/{}/images/progress?cancel_on_disconnect={}",
                    artifact.artifact_id, cancel_on_disconnect
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("first event in time")
        .expect("stream open")
        .unwrap();
    let chunk = frame.into_data().unwrap();
    assert!(String::from_utf8_lossy(&chunk).contains("data:"));
    drop(body);

    let record = app.state.jobs.get(artifact.artifact_id).await.unwrap();
    let terminal = wait_terminal(&record.channel).await;
    assert!(terminal.complete);
    assert_eq!(terminal.current, terminal.total);
    (terminal.stage.as_str().to_string(), app.provider.call_count())
}

/// TC-API-013: leaving the stream early cancels the job only when asked to
#[tokio::test]
async fn tc_api_013_cancel_on_disconnect() {
    // Given/When: the subscriber opted in, then disconnected after one event
    let (stage, calls) = disconnect_after_first_event(true).await;

    // Then: the job stopped early
    assert_eq!(stage, "cancelled");
    assert!(calls < 4, "expected early stop, provider called {} times", calls);

    // Given/When: same disconnect without opting in
    let (stage, calls) = disconnect_after_first_event(false).await;

    // Then: the job ran every section
    assert_eq!(stage, "complete");
    assert_eq!(calls, 4);
}
