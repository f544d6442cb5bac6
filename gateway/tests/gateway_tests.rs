use ai4all_core::Config;
use ai4all_gateway::{build_app, AppState};
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower::ServiceExt;

const UNREACHABLE: &str = "http://127.0.0.1:9";

#[derive(Clone)]
enum Reply {
    Json(Value),
    Lines(Vec<String>),
    Error(StatusCode, String),
}

#[derive(Clone)]
struct BackendState {
    requests: Arc<Mutex<Vec<Value>>>,
    reply: Arc<Mutex<Reply>>,
}

async fn backend_chat(State(state): State<BackendState>, Json(payload): Json<Value>) -> Response {
    state.requests.lock().await.push(payload);
    match state.reply.lock().await.clone() {
        Reply::Json(value) => Json(value).into_response(),
        Reply::Lines(lines) => Response::builder()
            .header("content-type", "application/x-ndjson")
            .body(Body::from(lines.join("\n") + "\n"))
            .unwrap(),
        Reply::Error(status, body) => (status, body).into_response(),
    }
}

async fn backend_tags() -> Json<Value> {
    Json(json!({ "models": [] }))
}

struct MockBackend {
    base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    join: JoinHandle<()>,
}

impl MockBackend {
    async fn start(reply: Reply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = BackendState {
            requests: requests.clone(),
            reply: Arc::new(Mutex::new(reply)),
        };
        let app = Router::new()
            .route("/api/chat", post(backend_chat))
            .route("/api/tags", get(backend_tags))
            .with_state(state);
        let (base_url, join) = serve(app).await;
        Self {
            base_url,
            requests,
            join,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/api", self.base_url)
    }

    async fn requests(&self) -> Vec<Value> {
        self.requests.lock().await.clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.join.abort();
    }
}

#[derive(Clone, Default)]
struct LedgerState {
    spends: Arc<Mutex<Vec<Value>>>,
    earns: Arc<Mutex<Vec<Value>>>,
}

async fn ledger_spend(State(state): State<LedgerState>, Json(body): Json<Value>) -> Json<Value> {
    state.spends.lock().await.push(body);
    Json(json!({ "ok": true }))
}

async fn ledger_earn(State(state): State<LedgerState>, Json(body): Json<Value>) -> Json<Value> {
    state.earns.lock().await.push(body);
    Json(json!({ "ok": true }))
}

async fn ledger_balance() -> Json<Value> {
    Json(json!({ "balance": 42, "earned": 50, "spent": 8 }))
}

async fn ledger_node_status() -> Json<Value> {
    Json(json!({ "node_id": "abc", "peers": 3 }))
}

struct MockLedger {
    base_url: String,
    state: LedgerState,
    join: JoinHandle<()>,
}

impl MockLedger {
    async fn start() -> Self {
        let state = LedgerState::default();
        let app = Router::new()
            .route("/v1/tokens/spend", post(ledger_spend))
            .route("/v1/tokens/earn", post(ledger_earn))
            .route("/v1/tokens", get(ledger_balance))
            .route("/v1/node/status", get(ledger_node_status))
            .with_state(state.clone());
        let (base_url, join) = serve(app).await;
        Self {
            base_url,
            state,
            join,
        }
    }

    /// Wait until `n` spend calls have landed, then return them.
    async fn wait_for_spends(&self, n: usize) -> Vec<Value> {
        for _ in 0..100 {
            let spends = self.state.spends.lock().await.clone();
            if spends.len() >= n {
                return spends;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.state.spends.lock().await.clone()
    }
}

impl Drop for MockLedger {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn serve(app: Router) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("local addr");
    let join = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server error");
    });
    (format!("http://{}", addr), join)
}

fn gateway(backend_url: &str, ledger_url: &str) -> Router {
    let mut config = Config::default();
    config.backend.url = backend_url.to_string();
    config.ledger.url = ledger_url.to_string();
    config.ledger.timeout_secs = 1;
    let (state, _worker) = AppState::new(config).expect("gateway state");
    build_app(Arc::new(state))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn sse_records(response: Response) -> Vec<String> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .split("\n\n")
        .filter(|r| !r.trim().is_empty())
        .map(|r| r.strip_prefix("data: ").expect("data record").to_string())
        .collect()
}

#[tokio::test]
async fn buffered_completion_end_to_end() {
    let backend = MockBackend::start(Reply::Json(json!({"message": {"content": "hello"}}))).await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({
                "model": "public/modelX",
                "messages": [{"role": "user", "content": "hi there"}],
                "stream": false
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "public/modelX");
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(
        body["choices"],
        json!([{
            "index": 0,
            "message": {"role": "assistant", "content": "hello"},
            "finish_reason": "stop"
        }])
    );
    assert_eq!(
        body["usage"],
        json!({"prompt_tokens": 2, "completion_tokens": 1, "total_tokens": 3})
    );

    let sent = backend.requests().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["model"], "public/modelX");
    assert_eq!(sent[0]["stream"], false);
    assert_eq!(sent[0]["options"]["num_predict"], 2048);

    let spends = ledger.wait_for_spends(1).await;
    assert_eq!(spends, vec![json!({"amount": 1, "memo": "inference:public/modelX"})]);
}

#[tokio::test]
async fn registry_model_and_system_prompt_are_translated() {
    let backend = MockBackend::start(Reply::Json(json!({"message": {"content": "def f(): pass"}}))).await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({
                "model": "ai4all/codellama",
                "temperature": 0.5,
                "max_tokens": 128,
                "messages": [
                    {"role": "system", "content": "You write Python."},
                    {"role": "user", "content": "stub a function"},
                    {"role": "assistant", "content": "sure"},
                    {"role": "user", "content": "go"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["model"], "ai4all/codellama");
    assert_eq!(body["usage"]["prompt_tokens"], 3 + 3 + 1 + 1);
    assert_eq!(body["usage"]["completion_tokens"], 3);

    let sent = backend.requests().await;
    assert_eq!(
        sent[0],
        json!({
            "model": "codellama",
            "messages": [
                {"role": "user", "content": "stub a function"},
                {"role": "assistant", "content": "sure"},
                {"role": "user", "content": "go"}
            ],
            "system": "You write Python.",
            "options": {"temperature": 0.5, "num_predict": 128},
            "stream": false
        })
    );
}

#[tokio::test]
async fn streaming_completion_end_to_end() {
    let backend = MockBackend::start(Reply::Lines(vec![
        r#"{"message":{"content":"he"},"done":false}"#.into(),
        r#"{"message":{"content":""},"done":true}"#.into(),
    ]))
    .await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({
                "model": "ai4all/llama3",
                "messages": [{"role": "user", "content": "hi there"}],
                "stream": true
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();

    let records = sse_records(response).await;
    assert_eq!(records.len(), 3);

    let first: Value = serde_json::from_str(&records[0]).unwrap();
    assert_eq!(first["id"], request_id.as_str());
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["model"], "ai4all/llama3");
    assert_eq!(first["choices"][0]["delta"], json!({"content": "he"}));
    assert_eq!(first["choices"][0]["finish_reason"], Value::Null);

    let last: Value = serde_json::from_str(&records[1]).unwrap();
    assert_eq!(last["choices"][0]["delta"], json!({}));
    assert_eq!(last["choices"][0]["finish_reason"], "stop");

    assert_eq!(records[2], "[DONE]");

    assert_eq!(backend.requests().await[0]["stream"], true);

    let spends = ledger.wait_for_spends(1).await;
    assert_eq!(spends, vec![json!({"amount": 1, "memo": "inference:ai4all/llama3"})]);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ledger.state.spends.lock().await.len(), 1);
}

#[tokio::test]
async fn streaming_skips_malformed_lines() {
    let backend = MockBackend::start(Reply::Lines(vec![
        r#"{"message":{"content":"Hel"},"done":false}"#.into(),
        "this is not json".into(),
        "".into(),
        r#"{"message":{"content":"lo"},"done":false}"#.into(),
    ]))
    .await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "x"}], "stream": true}),
        ))
        .await
        .unwrap();

    let records = sse_records(response).await;
    assert_eq!(records.len(), 3);
    let deltas: Vec<Value> = records[..2]
        .iter()
        .map(|r| serde_json::from_str::<Value>(r).unwrap()["choices"][0]["delta"]["content"].clone())
        .collect();
    assert_eq!(deltas, vec![json!("Hel"), json!("lo")]);
    assert_eq!(records[2], "[DONE]");
}

#[tokio::test]
async fn streaming_stops_at_done_line() {
    let backend = MockBackend::start(Reply::Lines(vec![
        r#"{"message":{"content":"a"},"done":false}"#.into(),
        r#"{"message":{"content":""},"done":true}"#.into(),
        r#"{"message":{"content":"after"},"done":false}"#.into(),
    ]))
    .await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "x"}], "stream": true}),
        ))
        .await
        .unwrap();

    let records = sse_records(response).await;
    assert_eq!(records.len(), 3);
    assert!(!records.iter().any(|r| r.contains("after")));
    assert_eq!(records[2], "[DONE]");
}

#[tokio::test]
async fn out_of_range_requests_are_rejected_before_backend() {
    let backend = MockBackend::start(Reply::Json(json!({"message": {"content": "x"}}))).await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let cases = [
        json!({"messages": [{"role": "user", "content": "x"}], "max_tokens": 32769}),
        json!({"messages": [{"role": "user", "content": "x"}], "max_tokens": 0}),
        json!({"messages": [{"role": "user", "content": "x"}], "temperature": 2.01}),
        json!({"messages": [{"role": "user", "content": "x"}], "temperature": 2.00000001}),
        json!({"messages": [{"role": "user", "content": "x"}], "temperature": -1.0}),
        json!({"messages": [{"role": "tool", "content": "x"}]}),
        json!({"model": "ai4all/llama3"}),
    ];

    for body in cases {
        let response = app
            .clone()
            .oneshot(post_json("/v1/chat/completions", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let error = body_json(response).await;
        assert_eq!(error["error"]["type"], "invalid_request_error");
    }

    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn boundary_values_are_accepted() {
    let backend = MockBackend::start(Reply::Json(json!({"message": {"content": "ok"}}))).await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({
                "messages": [{"role": "user", "content": "x"}],
                "max_tokens": 32768,
                "temperature": 2.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.requests().await[0]["options"]["num_predict"], 32768);
}

#[tokio::test]
async fn backend_error_status_is_bad_gateway() {
    let backend = MockBackend::start(Reply::Error(
        StatusCode::NOT_FOUND,
        r#"{"error":"model \"nope\" not found"}"#.into(),
    ))
    .await;
    let ledger = MockLedger::start().await;
    let app = gateway(&backend.api_url(), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"model": "nope", "messages": [{"role": "user", "content": "x"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error = body_json(response).await;
    assert_eq!(error["error"]["type"], "backend_error");
    assert!(error["error"]["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn unreachable_backend_is_service_unavailable() {
    let ledger = MockLedger::start().await;
    let app = gateway(&format!("{UNREACHABLE}/api"), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "x"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error = body_json(response).await;
    assert_eq!(error["error"]["type"], "connection_error");
    assert!(error["error"]["message"].as_str().unwrap().contains("ollama serve"));
}

#[tokio::test]
async fn unreachable_backend_while_streaming_emits_error_then_done() {
    let ledger = MockLedger::start().await;
    let app = gateway(&format!("{UNREACHABLE}/api"), &ledger.base_url);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "x"}], "stream": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let records = sse_records(response).await;
    assert_eq!(records.len(), 2);
    let error: Value = serde_json::from_str(&records[0]).unwrap();
    assert_eq!(error["error"]["type"], "connection_error");
    assert_eq!(records[1], "[DONE]");
}

#[tokio::test]
async fn ledger_outage_does_not_affect_completions() {
    let backend = MockBackend::start(Reply::Json(json!({"message": {"content": "fine"}}))).await;
    let app = gateway(&backend.api_url(), UNREACHABLE);

    let response = app
        .oneshot(post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "x"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["choices"][0]["message"]["content"], "fine");
}

#[tokio::test]
async fn starter_grant_is_issued_once() {
    let ledger = MockLedger::start().await;
    let app = gateway(&format!("{UNREACHABLE}/api"), &ledger.base_url);

    let first = body_json(
        app.clone()
            .oneshot(post_json("/v1/tokens/starter", json!({"session_id": "sess-1"})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["granted"], true);
    assert_eq!(first["amount"], 10);
    assert!(first["message"].is_string());

    let second = body_json(
        app.clone()
            .oneshot(post_json("/v1/tokens/starter", json!({"session_id": "sess-1"})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(second, json!({"granted": false, "amount": 0, "reason": "already_granted"}));

    let other = body_json(
        app.oneshot(post_json("/v1/tokens/starter", json!({"session_id": "sess-2"})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(other["granted"], true);

    let earns = ledger.state.earns.lock().await.clone();
    assert_eq!(
        earns,
        vec![
            json!({"amount": 10, "memo": "welcome_bonus"}),
            json!({"amount": 10, "memo": "welcome_bonus"}),
        ]
    );
}

#[tokio::test]
async fn starter_grant_rejects_bad_bodies_with_400() {
    let ledger = MockLedger::start().await;
    let app = gateway(&format!("{UNREACHABLE}/api"), &ledger.base_url);

    for body in [json!({}), json!({"session_id": 7})] {
        let response = app
            .clone()
            .oneshot(post_json("/v1/tokens/starter", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");
    }

    assert!(ledger.state.earns.lock().await.is_empty());
}

#[tokio::test]
async fn models_listing_follows_registry_order() {
    let app = gateway(&format!("{UNREACHABLE}/api"), UNREACHABLE);

    let response = app
        .oneshot(Request::get("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["object"], "list");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 8);
    assert_eq!(data[0]["id"], "ai4all/llama3");
    assert_eq!(data[0]["object"], "model");
    assert_eq!(data[0]["owned_by"], "ai4all-community");
    assert_eq!(data[0]["category"], "general");
    assert!(data[0]["created"].is_i64());
    assert_eq!(data[2]["category"], "code");
    assert_eq!(data[7]["id"], "ai4all/gemma2");
}

#[tokio::test]
async fn health_reports_backend_reachability() {
    let backend = MockBackend::start(Reply::Json(json!({}))).await;

    let up = body_json(
        gateway(&backend.api_url(), UNREACHABLE)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(up["status"], "ok");
    assert_eq!(up["backend"], "reachable");
    assert!(up["version"].is_string());

    let down = body_json(
        gateway(&format!("{UNREACHABLE}/api"), UNREACHABLE)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(down["status"], "ok");
    assert_eq!(down["backend"], "unreachable");
}

#[tokio::test]
async fn ledger_passthrough_and_fallbacks() {
    let ledger = MockLedger::start().await;
    let app = gateway(&format!("{UNREACHABLE}/api"), &ledger.base_url);

    let balance = body_json(
        app.clone()
            .oneshot(Request::get("/v1/tokens/balance").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(balance["balance"], 42);

    let status = body_json(
        app.oneshot(Request::get("/v1/node/status").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status["peers"], 3);

    let offline = gateway(&format!("{UNREACHABLE}/api"), UNREACHABLE);
    let balance = body_json(
        offline
            .clone()
            .oneshot(Request::get("/v1/tokens/balance").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(balance, json!({"balance": 0}));

    let status = body_json(
        offline
            .oneshot(Request::get("/v1/node/status").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, json!({"error": "Node daemon not reachable"}));
}

#[tokio::test]
async fn telemetry_endpoints_never_fail() {
    let app = gateway(&format!("{UNREACHABLE}/api"), UNREACHABLE);

    let gpu = app
        .clone()
        .oneshot(Request::get("/v1/gpu").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(gpu.status(), StatusCode::OK);
    let gpu = body_json(gpu).await;
    assert!(gpu["devices"].is_array());
    assert_eq!(gpu["available"], !gpu["devices"].as_array().unwrap().is_empty());

    let stats = app
        .oneshot(Request::get("/v1/system/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(stats.status(), StatusCode::OK);
    let stats = body_json(stats).await;
    assert!(stats["cpu_pct"].is_number());
    assert!(stats["ram_total_gb"].is_u64());
    assert!(stats["gpu"].is_array());
}
