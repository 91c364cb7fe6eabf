//! Router tests against the in-memory store and the mock inference backend.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use mande_api::services::ContextConfig;
use mande_api::{router, AppState, Repositories, ServerConfig};
use mande_core::{CancelHandle, DocumentStatus, Error};
use mande_db::InMemoryStore;
use mande_inference::mock::MockInferenceBackend;
use mande_inference::ResilientEmbedder;
use mande_jobs::{DocumentConfig, ExtractionConfig, ExtractionEngine};

const BOUNDARY: &str = "mande-test-boundary";

async fn test_state(generator: MockInferenceBackend) -> AppState {
    let store = InMemoryStore::new();
    let repos = Repositories::in_memory(&store);
    let extraction = Arc::new(
        ExtractionEngine::initialize(ExtractionConfig::default().with_pandoc(false)).await,
    );
    let embeddings = repos.embedding_tasks(Arc::new(ResilientEmbedder::fallback_only(64)));
    AppState::new(
        repos,
        extraction,
        embeddings,
        Arc::new(generator),
        ContextConfig::default(),
        DocumentConfig::default(),
    )
}

async fn app() -> Router {
    router(
        test_state(MockInferenceBackend::new()).await,
        &ServerConfig::default(),
    )
}

fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(path: &str, owner: Uuid, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let body = multipart_body(filename, content_type, data);
    Request::builder()
        .method("POST")
        .uri(path)
        .header("x-owner-id", owner.to_string())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn get(path: &str, owner: Uuid) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("x-owner-id", owner.to_string())
        .body(Body::empty())
        .unwrap()
}

fn chat_request(owner: Uuid, message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("x-owner-id", owner.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "message": message }).to_string(),
        ))
        .unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_extractors() {
    let response = app()
        .await
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["extractors"]["methods"]["utf8_text"], true);
    assert_eq!(body["extractors"]["methods"]["byte_scan"], true);
}

#[tokio::test]
async fn test_missing_owner_is_forbidden() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/api/v1/knowledge")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_knowledge_upload_search_stats_delete() {
    let app = app().await;
    let owner = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(upload(
            "/api/v1/knowledge",
            owner,
            "review.txt",
            "text/plain",
            b"Quarterly Budget Review\r\nSpending stayed within plan.",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let item = json(response).await;
    assert_eq!(item["title"], "review");
    assert_eq!(item["source"], "file_upload");
    let id = item["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get("/api/v1/knowledge/search?q=budget", owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let search = json(response).await;
    assert_eq!(search["total"], 1);
    assert!(search["results"][0]["score"].as_f64().unwrap() > 0.1);
    assert_eq!(search["results"][0]["id"], id.as_str());

    let stats = json(
        app.clone()
            .oneshot(get("/api/v1/knowledge/stats", owner))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(stats["total_entries"], 1);
    assert_eq!(stats["counts_by_type"]["text"], 1);

    let delete = |owner: Uuid| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/knowledge/{id}"))
            .header("x-owner-id", owner.to_string())
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(delete(Uuid::new_v4())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(delete(owner)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let list = json(
        app.clone()
            .oneshot(get("/api/v1/knowledge", owner))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_identical_content_stays_owner_scoped() {
    let app = app().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    for owner in [alice, bob] {
        let response = app
            .clone()
            .oneshot(upload(
                "/api/v1/knowledge",
                owner,
                "plan.md",
                "text/markdown",
                b"# Water plan\nborehole maintenance schedule",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    for owner in [alice, bob] {
        let search = json(
            app.clone()
                .oneshot(get("/api/v1/knowledge/search?q=borehole", owner))
                .await
                .unwrap(),
        )
        .await;
        let results = search["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["owner_id"], owner.to_string());
    }
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let data = vec![b'a'; 60 * 1024 * 1024];
    let response = app()
        .await
        .oneshot(upload(
            "/api/v1/knowledge",
            Uuid::new_v4(),
            "huge.txt",
            "text/plain",
            &data,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_service_rejects_oversized_before_extraction() {
    let state = test_state(MockInferenceBackend::new()).await;
    let data = vec![b'a'; 60 * 1024 * 1024];
    let err = state
        .knowledge
        .upload_knowledge_file(&data, Some("text/plain"), "huge.txt", Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge(_)));
}

#[tokio::test]
async fn test_unsupported_and_empty_uploads() {
    let app = app().await;
    let owner = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(upload(
            "/api/v1/knowledge",
            owner,
            "image.gif",
            "image/gif",
            b"GIF89a\x01\x00\x01\x00",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = app
        .clone()
        .oneshot(upload("/api/v1/knowledge", owner, "empty.txt", "text/plain", b""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_document_upload_then_ready() {
    let app = app().await;
    let owner = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(upload(
            "/api/v1/documents",
            owner,
            "minutes.txt",
            "text/plain",
            b"Meeting minutes: the clinic opens in March.",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let doc = json(response).await;
    assert_eq!(doc["status"], "processing");
    let id = doc["id"].as_str().unwrap().to_string();

    let mut status = Value::Null;
    for _ in 0..50 {
        let body = json(
            app.clone()
                .oneshot(get(&format!("/api/v1/documents/{id}"), owner))
                .await
                .unwrap(),
        )
        .await;
        status = body["status"].clone();
        if status != "processing" {
            assert!(body["content"].as_str().unwrap().contains("clinic"));
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "ready");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/documents/{id}"), Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_uses_knowledge_context() {
    let mock = MockInferenceBackend::new().with_fixed_response("The budget is on track.");
    let app = router(test_state(mock.clone()).await, &ServerConfig::default());
    let owner = Uuid::new_v4();

    app.clone()
        .oneshot(upload(
            "/api/v1/knowledge",
            owner,
            "review.txt",
            "text/plain",
            b"Quarterly Budget Review",
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(chat_request(owner, "quarterly budget"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply = json(response).await;
    assert_eq!(reply["response"], "The budget is on track.");
    assert_eq!(reply["sources"][0]["type"], "knowledge");

    let prompts = mock.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].prompt.contains("Quarterly Budget Review"));
    assert!(prompts[0].prompt.contains("User question: quarterly budget"));
}

#[tokio::test]
async fn test_chat_errors_map_to_status() {
    let app = app().await;
    let response = app
        .oneshot(chat_request(Uuid::new_v4(), "   "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let failing = MockInferenceBackend::new().with_generation_failure(Error::Transient);
    let app = router(test_state(failing).await, &ServerConfig::default());
    let response = app
        .oneshot(chat_request(Uuid::new_v4(), "hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("temporarily unavailable"));
}

#[tokio::test]
async fn test_chat_cancelled_when_signal_fires() {
    let state = test_state(MockInferenceBackend::new().with_latency_ms(5_000)).await;
    let handle = CancelHandle::new();
    let signal = handle.signal();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });
    let err = state
        .chat
        .respond(Uuid::new_v4(), "hello", &[], &signal)
        .await
        .unwrap_err();
    canceller.await.unwrap();
    assert!(matches!(err, Error::Cancelled(_)));
}

#[tokio::test]
async fn test_referenced_processing_document_in_prompt() {
    let mock = MockInferenceBackend::new();
    let state = test_state(mock.clone()).await;
    let owner = Uuid::new_v4();
    let doc = state
        .documents
        .upload(owner, "late.txt", Some("text/plain"), b"later".to_vec())
        .await
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Processing);

    let reply = state
        .chat
        .respond(
            owner,
            &format!("what does [document:{}] say", doc.id),
            &[],
            &CancelHandle::new().signal(),
        )
        .await
        .unwrap();
    assert!(reply
        .sources
        .iter()
        .any(|s| matches!(s, mande_api::services::ContextSource::Document { id, .. } if *id == doc.id)));
    assert!(!mock.prompts()[0].prompt.contains("[document:"));
}
