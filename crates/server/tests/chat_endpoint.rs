//! Router-level tests for the chat, download and health endpoints.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use kbchat_core::AppResult;
use kbchat_knowledge::{ChatSettings, InMemoryKnowledgeBase, InMemoryRegistry};
use kbchat_llm::providers::MockClient;
use kbchat_llm::{ClientFactory, LlmClient, ProviderFamily};
use kbchat_server::{router, AppState};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Hands out one scripted client for any gpt/glm model name.
struct ScriptedFactory {
    client: Arc<MockClient>,
    calls: AtomicUsize,
}

impl ClientFactory for ScriptedFactory {
    fn create_client(&self, model_name: &str) -> AppResult<Arc<dyn LlmClient>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProviderFamily::from_model_name(model_name)?;
        Ok(self.client.clone())
    }
}

struct TestApp {
    state: AppState,
    base: Arc<InMemoryKnowledgeBase>,
    factory: Arc<ScriptedFactory>,
}

fn app_with(client: MockClient, base: InMemoryKnowledgeBase, root: &Path) -> TestApp {
    let mut registry = InMemoryRegistry::new();
    let base = registry.insert(base);
    let factory = Arc::new(ScriptedFactory {
        client: Arc::new(client),
        calls: AtomicUsize::new(0),
    });
    let settings = ChatSettings {
        prompts_dir: None,
        ..ChatSettings::default()
    };

    TestApp {
        state: AppState::new(Arc::new(registry), factory.clone(), settings, root),
        base,
        factory,
    }
}

fn samples() -> InMemoryKnowledgeBase {
    InMemoryKnowledgeBase::new("samples")
        .with_passage("A", "/kb/x/a.md", 0.3)
        .with_passage("B", "/kb/x/b.md", 0.7)
}

fn app(client: MockClient) -> TestApp {
    app_with(client, samples(), Path::new("unused"))
}

async fn post_chat(state: AppState, body: Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri("/chat/knowledge_base_chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::HOST, "testserver:7861")
        .body(Body::from(body.to_string()))
        .unwrap();

    router(state).oneshot(request).await.unwrap()
}

async fn get(state: AppState, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router(state).oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Decode every SSE `data:` frame as JSON.
async fn sse_events(response: Response) -> Vec<Value> {
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_unknown_knowledge_base_is_404_without_side_effects() {
    let app = app(MockClient::new(["never"]));

    let response = post_chat(
        app.state.clone(),
        json!({"query": "hi", "knowledge_base_name": "missing", "stream": true}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], 404);
    assert!(body["msg"].as_str().unwrap().contains("missing"));

    assert_eq!(app.base.search_count(), 0);
    assert_eq!(app.factory.calls.load(Ordering::SeqCst), 0);
    assert!(app.factory.client.requests().is_empty());
}

#[tokio::test]
async fn test_non_streaming_yields_one_event() {
    let app = app(MockClient::new(["Rust ", "is ", "fast."]));

    let response = post_chat(
        app.state.clone(),
        json!({"query": "Is Rust fast?", "knowledge_base_name": "samples"}),
    )
    .await;
    let events = sse_events(response).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["answer"], "Rust is fast.");
    assert_eq!(events[0]["docs"].as_array().unwrap().len(), 2);
    assert!(!app.factory.client.requests()[0].stream);
}

#[tokio::test]
async fn test_streaming_events_concatenate_and_share_metadata() {
    let client = MockClient::new(["Rust ", "is ", "fast."]);
    let full = client.full_answer();
    let app = app(client);

    let response = post_chat(
        app.state.clone(),
        json!({"query": "Is Rust fast?", "knowledge_base_name": "samples", "stream": true}),
    )
    .await;
    let events = sse_events(response).await;

    assert_eq!(events.len(), 3);
    let answer: String = events
        .iter()
        .map(|e| e["answer"].as_str().unwrap())
        .collect();
    assert_eq!(answer, full);

    for event in &events {
        assert_eq!(event["uuid"], events[0]["uuid"]);
        assert_eq!(event["docs"], events[0]["docs"]);
        assert_eq!(event["reference"], events[0]["reference"]);
        assert_eq!(event["prompt"], events[0]["prompt"]);
    }
    assert!(app.factory.client.requests()[0].stream);
}

#[tokio::test]
async fn test_two_passage_scenario() {
    let app = app(MockClient::new(["answer"]));

    let response = post_chat(
        app.state.clone(),
        json!({
            "query": "what?",
            "knowledge_base_name": "samples",
            "top_k": 3,
            "score_threshold": 1.0,
            "local_doc_url": true
        }),
    )
    .await;
    let events = sse_events(response).await;
    let event = &events[0];

    assert_eq!(
        event["docs"],
        json!([
            "出处 [1] [a.md](file:///kb/x/a.md) \n\nA\n\n 相似度：1099.7\n\n",
            "出处 [2] [b.md](file:///kb/x/b.md) \n\nB\n\n 相似度：1099.3\n\n"
        ])
    );
    assert_eq!(
        event["reference"],
        json!({"a.md": [["A", "1099"]], "b.md": [["B", "1099"]]})
    );

    let prompt = event["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("Human: "));
    assert!(prompt.contains("A\nB"));
    assert!(prompt.contains("what?"));
}

#[tokio::test]
async fn test_download_links_use_request_host() {
    let app = app(MockClient::new(["answer"]));

    let response = post_chat(
        app.state.clone(),
        json!({"query": "q", "knowledge_base_name": "samples"}),
    )
    .await;
    let events = sse_events(response).await;

    let first = events[0]["docs"][0].as_str().unwrap();
    assert!(first.contains(
        "(http://testserver:7861/knowledge_base/download_doc?knowledge_base_name=samples&file_name=a.md)"
    ));
}

#[tokio::test]
async fn test_history_is_part_of_prompt() {
    let app = app(MockClient::new(["虎头虎脑"]));

    let response = post_chat(
        app.state.clone(),
        json!({
            "query": "继续",
            "knowledge_base_name": "samples",
            "history": [
                {"role": "user", "content": "我们来玩成语接龙，我先来，生龙活虎"},
                {"role": "assistant", "content": "虎头虎脑"}
            ]
        }),
    )
    .await;
    let events = sse_events(response).await;

    let prompt = events[0]["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("Human: 我们来玩成语接龙，我先来，生龙活虎\nAI: 虎头虎脑\nHuman: "));
    assert_eq!(app.factory.client.requests()[0].messages.len(), 4);
}

#[tokio::test]
async fn test_unsupported_model_is_400() {
    let app = app(MockClient::new(["x"]));

    let response = post_chat(
        app.state.clone(),
        json!({"query": "q", "knowledge_base_name": "samples", "model_name": "llama3"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 400);
    assert_eq!(app.base.search_count(), 0);
}

#[tokio::test]
async fn test_invalid_parameters_are_422() {
    let app = app(MockClient::new(["x"]));

    for body in [
        json!({"query": "q", "knowledge_base_name": "samples", "top_k": 0}),
        json!({"query": "q", "knowledge_base_name": "samples", "score_threshold": 1100.5}),
        json!({"query": "q", "knowledge_base_name": "samples", "score_threshold": -1}),
        json!({"knowledge_base_name": "samples"}),
    ] {
        let response = post_chat(app.state.clone(), body).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], 422);
    }
}

#[tokio::test]
async fn test_retrieval_failure_is_502() {
    let app = app_with(
        MockClient::new(["x"]),
        samples().with_failure("index offline"),
        Path::new("unused"),
    );

    let response = post_chat(
        app.state.clone(),
        json!({"query": "q", "knowledge_base_name": "samples", "stream": true}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["msg"].as_str().unwrap().contains("index offline"));
}

#[tokio::test]
async fn test_provider_failure_aborts_stream() {
    let app = app(MockClient::new(["partial"]).with_failure("quota exceeded"));

    let response = post_chat(
        app.state.clone(),
        json!({"query": "q", "knowledge_base_name": "samples", "stream": true}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let mut framed = String::new();
    let mut aborted = false;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => framed.push_str(std::str::from_utf8(&bytes).unwrap()),
            Err(_) => {
                aborted = true;
                break;
            }
        }
    }

    assert!(aborted);
    let events: Vec<Value> = framed
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["answer"], "partial");
}

#[tokio::test]
async fn test_download_doc() {
    let root = TempDir::new().unwrap();
    let content = root.path().join("samples").join("content");
    std::fs::create_dir_all(&content).unwrap();
    std::fs::write(content.join("a.md"), "# A").unwrap();

    let app = app_with(MockClient::new(["x"]), samples(), root.path());

    let response = get(
        app.state.clone(),
        "/knowledge_base/download_doc?knowledge_base_name=samples&file_name=a.md",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("a.md"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"# A");

    let missing = get(
        app.state.clone(),
        "/knowledge_base/download_doc?knowledge_base_name=samples&file_name=b.md",
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let traversal = get(
        app.state.clone(),
        "/knowledge_base/download_doc?knowledge_base_name=samples&file_name=..%2F..%2Fsecret",
    )
    .await;
    assert_eq!(traversal.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_health() {
    let app = app(MockClient::new(["x"]));

    let response = get(app.state.clone(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}
