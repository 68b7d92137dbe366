use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use doclens::config::EngineConfig;
use doclens::engine::{HttpEngineClient, RemoteAnalysisClient};
use doclens_core::error::{EngineError, ErrorCategory};

#[derive(Clone, Default)]
struct Seen {
    correlation_ids: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

async fn fake_analyze(
    State(seen): State<Seen>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if let Some(cid) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        seen.correlation_ids.lock().unwrap().push(cid.to_string());
    }
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap().to_vec();
            seen.uploads.lock().unwrap().push((name, bytes));
        }
    }
    Json(serde_json::json!({
        "summary": "ok",
        "keywords": ["x"],
        "sentiment": "neutral",
        "fullText": "hello world"
    }))
}

async fn fake_quiz(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    Json(serde_json::json!({
        "questions": [{ "question": format!("What is {}?", text), "answer": text }]
    }))
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, timeout_secs: u64) -> HttpEngineClient {
    HttpEngineClient::new(&EngineConfig {
        base_url: base_url.to_string(),
        timeout_secs,
    })
    .unwrap()
}

#[tokio::test]
async fn test_analyze_success_sends_file_and_correlation_id() {
    let seen = Seen::default();
    let app = Router::new()
        .route("/analyze", post(fake_analyze))
        .with_state(seen.clone());
    let base = spawn(app).await;

    let data = client(&base, 5)
        .analyze(b"hello".to_vec(), "a.txt", "cid-123", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(data.summary, "ok");
    assert_eq!(data.keywords, vec!["x"]);
    assert_eq!(data.full_text, "hello world");
    assert_eq!(*seen.correlation_ids.lock().unwrap(), vec!["cid-123"]);
    assert_eq!(
        *seen.uploads.lock().unwrap(),
        vec![("a.txt".to_string(), b"hello".to_vec())]
    );
}

#[tokio::test]
async fn test_quiz_round_trip() {
    let app = Router::new().route("/generate-quiz", post(fake_quiz));
    let base = spawn(app).await;

    let quiz = client(&base, 5)
        .generate_quiz("rust", "cid", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(quiz.questions.len(), 1);
    assert_eq!(quiz.questions[0].answer, "rust");
}

#[tokio::test]
async fn test_non_success_status_is_bad_status() {
    let app = Router::new().route(
        "/analyze",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    );
    let base = spawn(app).await;

    let err = client(&base, 5)
        .analyze(b"x".to_vec(), "a.txt", "cid", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BadStatus { status: 500 }));
    assert_eq!(err.category(), ErrorCategory::ServiceUnavailable);
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let app = Router::new().route("/analyze", post(|| async { "not json" }));
    let base = spawn(app).await;

    let err = client(&base, 5)
        .analyze(b"x".to_vec(), "a.txt", "cid", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));
    assert_eq!(err.category(), ErrorCategory::InternalError);
}

#[tokio::test]
async fn test_unreachable_engine_is_unavailable() {
    // Reserve a port, then release it so nothing listens there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr), 5)
        .analyze(b"x".to_vec(), "a.txt", "cid", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
}

#[tokio::test]
async fn test_slow_engine_times_out() {
    let app = Router::new().route(
        "/analyze",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "late"
        }),
    );
    let base = spawn(app).await;

    let err = client(&base, 1)
        .analyze(b"x".to_vec(), "a.txt", "cid", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_call() {
    let app = Router::new().route(
        "/analyze",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "late"
        }),
    );
    let base = spawn(app).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client(&base, 30).analyze(b"x".to_vec(), "a.txt", "cid", &cancel),
    )
    .await
    .expect("cancellation must end the call")
    .unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
}
