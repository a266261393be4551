//! End-to-end tests for the coach server.
//!
//! Each test starts the real server on a free port, serves the knowledge
//! library from a second in-process HTTP server, and swaps the hosted model
//! for a stub backend.

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use golf_coach::chat::ChatService;
use golf_coach::config::{parse_config, Config};
use golf_coach::inference::{InferenceBackend, InferenceBinding, InferenceRequest};
use golf_coach::knowledge::{create_source, HttpKnowledgeSource, KnowledgeSource};
use golf_coach::models::ChatRequest;
use golf_coach::prompt::NO_MATCH_ANSWER;
use golf_coach::server::run_server_with_service;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

// ─── Knowledge server ───────────────────────────────────────────────

/// What the fake site serves at `/knowledge/golf_entries.json`, plus the
/// `Cache-Control` header of every request it saw.
struct Library {
    status: Mutex<u16>,
    body: Mutex<String>,
    cache_headers: Mutex<Vec<Option<String>>>,
}

impl Library {
    fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(200),
            body: Mutex::new(body.to_string()),
            cache_headers: Mutex::new(Vec::new()),
        })
    }

    fn set_body(&self, body: &str) {
        *self.body.lock().unwrap() = body.to_string();
    }

    fn set_status(&self, status: u16) {
        *self.status.lock().unwrap() = status;
    }
}

async fn serve_library(
    State(library): State<Arc<Library>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    library.cache_headers.lock().unwrap().push(
        headers
            .get("cache-control")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    let status = StatusCode::from_u16(*library.status.lock().unwrap()).unwrap();
    (status, library.body.lock().unwrap().clone())
}

async fn start_library_server(library: Arc<Library>) -> String {
    let app = Router::new()
        .route("/knowledge/golf_entries.json", get(serve_library))
        .with_state(library);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}/knowledge/golf_entries.json", addr)
}

// ─── Model stub ─────────────────────────────────────────────────────

struct StubModel {
    reply: Value,
    prompts: Mutex<Vec<InferenceRequest>>,
}

impl StubModel {
    fn new(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InferenceBackend for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn run(&self, _model: &str, request: &InferenceRequest) -> Result<Value> {
        self.prompts.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

const GRIP_LIBRARY: &str = r#"[
  {"id":"entry-1","title":"Grip","tags":["fundamentals"],"content":"Hold the club with a neutral grip."}
]"#;

fn test_config(port: u16, prefix: &str) -> Config {
    parse_config(&format!(
        r#"
[server]
bind = "127.0.0.1:{}"

[auth]
protected_prefix = "{}"
username = "user"
password = "pass"
"#,
        port, prefix
    ))
    .unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn spawn_coach(chat: ChatService, port: u16) -> u16 {
    tokio::spawn(async move {
        run_server_with_service(Arc::new(chat)).await.ok();
    });
    wait_for_server(port).await;
    port
}

/// Starts the coach server with `/api` protected and returns its port.
async fn start_coach(knowledge_url: String, inference: Option<Arc<StubModel>>) -> u16 {
    let port = find_free_port();
    let config = Arc::new(test_config(port, "/api"));
    let binding = match inference {
        Some(model) => InferenceBinding::with_backend(model, &config.inference),
        None => InferenceBinding::from_config(&config.inference),
    };
    let chat = ChatService::new(
        config,
        Arc::new(HttpKnowledgeSource::new(knowledge_url)),
        binding,
    );
    spawn_coach(chat, port).await
}

async fn ask(port: u16, body: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/api/chat", port))
        .basic_auth("user", Some("pass"))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

/// A matching question is grounded on the library and cites its entry.
#[tokio::test]
async fn test_grounded_answer_cites_entry() {
    let library = Library::new(GRIP_LIBRARY);
    let url = start_library_server(library.clone()).await;
    let model = StubModel::new(json!({"response": "Neutral grip, V's to the trail shoulder. Used: entry-1"}));
    let port = start_coach(url, Some(model.clone())).await;

    let request = ChatRequest {
        question: "How do I grip the club?".to_string(),
    };
    let resp = ask(port, &serde_json::to_string(&request).unwrap()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["citations"], json!(["entry-1"]));
    assert!(!body["answer"].as_str().unwrap().is_empty());

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let user = &prompts[0].messages[1].content;
    assert!(user.contains("Question: How do I grip the club?"));
    assert!(user.contains("entry-1: Grip"));
    assert!(user.contains("Hold the club with a neutral grip."));

    assert_eq!(
        library.cache_headers.lock().unwrap().as_slice(),
        &[Some("no-cache".to_string())]
    );
}

/// A question that matches nothing gets the fixed answer and no citations.
#[tokio::test]
async fn test_unmatched_question_returns_fallback() {
    let library = Library::new(GRIP_LIBRARY);
    let url = start_library_server(library).await;
    let model = StubModel::new(json!({"response": "should not be used"}));
    let port = start_coach(url, Some(model.clone())).await;

    let resp = ask(port, r#"{"question":"bunker explosion shot"}"#).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], NO_MATCH_ANSWER);
    assert_eq!(body["citations"], json!([]));
    assert!(model.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_input_validation() {
    let url = start_library_server(Library::new(GRIP_LIBRARY)).await;
    let port = start_coach(url, Some(StubModel::new(json!({})))).await;

    let resp = ask(port, "{not json").await;
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Invalid JSON");

    let resp = ask(port, r#"{"question":"  \t "}"#).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Missing question");
}

/// The library is re-fetched on every request; edits show up immediately.
#[tokio::test]
async fn test_library_is_fetched_fresh() {
    let library = Library::new(GRIP_LIBRARY);
    let url = start_library_server(library.clone()).await;
    let port = start_coach(url, Some(StubModel::new(json!({"text": "ok"})))).await;

    let body: Value = ask(port, r#"{"question":"putting green"}"#)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["citations"], json!([]));

    library.set_body(
        r#"[
          {"id":"entry-1","title":"Grip","tags":["fundamentals"],"content":"Hold the club with a neutral grip."},
          {"id":"entry-9","title":"Putting","tags":["green"],"content":"Read the green from low side."}
        ]"#,
    );

    let body: Value = ask(port, r#"{"question":"putting green"}"#)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["citations"], json!(["entry-9"]));
    assert_eq!(body["answer"], "ok");
    assert_eq!(library.cache_headers.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_knowledge_failures_are_500_with_location() {
    let library = Library::new(GRIP_LIBRARY);
    let url = start_library_server(library.clone()).await;
    let port = start_coach(url.clone(), Some(StubModel::new(json!({})))).await;

    library.set_status(404);
    let resp = ask(port, r#"{"question":"grip"}"#).await;
    assert_eq!(resp.status(), 500);
    let text = resp.text().await.unwrap();
    assert!(text.starts_with("Knowledge file not found"), "got: {}", text);
    assert!(text.contains(&url));

    library.set_status(200);
    library.set_body("{definitely not json");
    let resp = ask(port, r#"{"question":"grip"}"#).await;
    assert_eq!(resp.status(), 500);
    assert!(resp.text().await.unwrap().contains("is not valid JSON"));
}

#[tokio::test]
async fn test_missing_inference_binding_is_500() {
    let url = start_library_server(Library::new(GRIP_LIBRARY)).await;
    let port = start_coach(url, None).await;

    let resp = ask(port, r#"{"question":"grip"}"#).await;
    assert_eq!(resp.status(), 500);
    assert!(resp.text().await.unwrap().contains("[inference] provider"));

    // Unmatched questions never need the model.
    let resp = ask(port, r#"{"question":"bunker"}"#).await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_access_gate_over_http() {
    let url = start_library_server(Library::new(GRIP_LIBRARY)).await;
    let port = start_coach(url, Some(StubModel::new(json!({"response": "x"})))).await;
    let client = reqwest::Client::new();
    let chat_url = format!("http://127.0.0.1:{}/api/chat", port);

    let resp = client
        .post(&chat_url)
        .body(r#"{"question":"grip"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let challenge = resp
        .headers()
        .get("www-authenticate")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(challenge.contains("Basic"));
    assert_eq!(resp.text().await.unwrap(), "Login required");

    let resp = client
        .post(&chat_url)
        .basic_auth("user", Some("wrong"))
        .body(r#"{"question":"grip"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(resp.text().await.unwrap(), "Forbidden");

    let resp = client
        .post(&chat_url)
        .header("authorization", "Basic !!!")
        .body(r#"{"question":"grip"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

/// A relative knowledge URL is fixed by `[knowledge].base_url`; a client
/// sending its own `Host` header cannot redirect the library fetch.
#[tokio::test]
async fn test_forged_host_does_not_redirect_library_fetch() {
    let library = Library::new(GRIP_LIBRARY);
    let library_url = start_library_server(library.clone()).await;
    let base_url = library_url.trim_end_matches("/knowledge/golf_entries.json");

    let rogue = Library::new(
        r#"[{"id":"entry-rogue","title":"Grip","tags":[],"content":"Grip it however."}]"#,
    );
    let rogue_url = start_library_server(rogue.clone()).await;
    let rogue_host = rogue_url
        .trim_start_matches("http://")
        .trim_end_matches("/knowledge/golf_entries.json")
        .to_string();

    let port = find_free_port();
    let mut config = test_config(port, "/api");
    config.knowledge.url = Some("/knowledge/golf_entries.json".to_string());
    config.knowledge.base_url = Some(base_url.to_string());
    let config = Arc::new(config);
    let model = StubModel::new(json!({"response": "Neutral grip."}));
    let binding = InferenceBinding::with_backend(model, &config.inference);
    let knowledge: Arc<dyn KnowledgeSource> =
        Arc::from(create_source(&config.knowledge.location(&config.server)));
    let chat = ChatService::new(config, knowledge, binding);
    spawn_coach(chat, port).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/api/chat", port))
        .basic_auth("user", Some("pass"))
        .header("host", rogue_host)
        .header("content-type", "application/json")
        .body(r#"{"question":"How do I grip the club?"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["citations"], json!(["entry-1"]));

    assert_eq!(library.cache_headers.lock().unwrap().len(), 1);
    assert!(rogue.cache_headers.lock().unwrap().is_empty());
}
