//! Nodes that talk to collaborators: api targets, webhook receivers, LLM
//! providers and integration handlers, all served locally.

mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use common::*;
use nodeflow::llm::{AnthropicProvider, OpenAiProvider};
use nodeflow::runtime::error::ErrorCategory;
use nodeflow::runtime::nodes::webhook::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use nodeflow::{Edge, EngineServices, ExecutionEngine, Node, NodeStatus, NodeType};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn api_response_mapping_accepts_dot_paths_and_jsonpath() {
    let addr = serve(Router::new().route(
        "/users",
        get(|| async {
            Json(json!({ "data": { "users": [{ "name": "ada" }, { "name": "grace" }] } }))
        }),
    ))
    .await;

    let api = Node::new(
        "fetch",
        NodeType::Api,
        json!({
            "url": format!("http://{}/users", addr),
            "responseMapping": {
                "first": "data.users.0.name",
                "names": "$.data.users[*].name",
                "missing": "data.nope"
            }
        }),
    );

    let result = engine()
        .execute(vec![api, output("out")], vec![Edge::new("fetch", "out")], json!({}))
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(
        result.output,
        Some(json!({ "first": "ada", "names": ["ada", "grace"], "missing": null }))
    );
    assert_eq!(result.credits_used, 1);
}

#[tokio::test]
async fn api_body_templates_keep_json_types() {
    let addr = serve(Router::new().route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))).await;

    let api = Node::new(
        "send",
        NodeType::Api,
        json!({
            "url": format!("http://{}/echo", addr),
            "method": "POST",
            "body": { "name": "{{input.name}}", "count": "{{input.count}}", "greeting": "hi {{input.name}}" }
        }),
    );

    let result = engine()
        .execute(
            vec![input("form"), api, output("out")],
            vec![Edge::new("form", "send"), Edge::new("send", "out")],
            json!({ "name": "Ada", "count": 3 }),
        )
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(result.output, Some(json!({ "name": "Ada", "count": 3, "greeting": "hi Ada" })));
}

#[tokio::test]
async fn api_non_json_body_passes_through_as_text() {
    let addr = serve(Router::new().route("/plain", get(|| async { "just text" }))).await;
    let api = Node::new("fetch", NodeType::Api, json!({ "url": format!("http://{}/plain", addr) }));

    let result = engine()
        .execute(vec![api, output("out")], vec![Edge::new("fetch", "out")], json!({}))
        .await;

    assert_eq!(result.output, Some(json!("just text")));
}

#[tokio::test]
async fn api_unreachable_host_is_a_network_failure() {
    let api = Node::new("fetch", NodeType::Api, json!({ "url": "http://127.0.0.1:9/nothing", "timeoutMs": 2000 }));

    let result = engine()
        .execute(vec![api, output("out")], vec![Edge::new("fetch", "out")], json!({}))
        .await;

    assert_eq!(result.log("fetch").unwrap().status, NodeStatus::Failed);
    let category = result.error_analysis.unwrap().category;
    assert!(matches!(category, ErrorCategory::Network | ErrorCategory::Timeout));
}

type Captured = Arc<Mutex<Option<(String, String, String)>>>;

async fn capture_hook(State(captured): State<Captured>, headers: HeaderMap, body: String) -> (StatusCode, Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    *captured.lock().unwrap() = Some((header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), body));
    (StatusCode::ACCEPTED, Json(json!({ "received": true })))
}

#[tokio::test]
async fn webhook_delivery_is_signed_and_verifiable() {
    let captured: Captured = Arc::new(Mutex::new(None));
    let addr = serve(
        Router::new()
            .route("/hook", post(capture_hook))
            .with_state(captured.clone()),
    )
    .await;

    let services = EngineServices::default().with_webhook_secret("shh");
    let engine = ExecutionEngine::new(services);
    let hook = Node::new(
        "notify",
        NodeType::Webhook,
        json!({ "url": format!("http://{}/hook", addr), "payload": { "user": "{{input.user}}" } }),
    );

    let result = engine
        .execute(
            vec![hook, output("out")],
            vec![Edge::new("notify", "out")],
            json!({ "user": "ada" }),
        )
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(result.output, Some(json!({ "status": 202, "body": { "received": true } })));

    let (timestamp, signature, body) = captured.lock().unwrap().clone().unwrap();
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "user": "ada" }));
    assert!(timestamp.parse::<i64>().is_ok());
    assert_eq!(signature, sign("shh", &timestamp, &body).unwrap());
    assert_ne!(signature, sign("other", &timestamp, &body).unwrap());
}

#[tokio::test]
async fn webhook_without_any_secret_never_sends() {
    let captured: Captured = Arc::new(Mutex::new(None));
    let addr = serve(
        Router::new()
            .route("/hook", post(capture_hook))
            .with_state(captured.clone()),
    )
    .await;

    let hook = Node::new("notify", NodeType::Webhook, json!({ "url": format!("http://{}/hook", addr) }));
    let result = engine()
        .execute(vec![hook, output("out")], vec![Edge::new("notify", "out")], json!({}))
        .await;

    assert_eq!(result.log("notify").unwrap().status, NodeStatus::Failed);
    assert_eq!(result.error_analysis.unwrap().category, ErrorCategory::Validation);
    assert!(captured.lock().unwrap().is_none());
}

#[tokio::test]
async fn openai_provider_speaks_chat_completions() {
    let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::new(Mutex::new(None));
    let addr = serve(
        Router::new()
            .route(
                "/v1/chat/completions",
                post(
                    |State(seen): State<Arc<Mutex<Option<(String, Value)>>>>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|value| value.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        *seen.lock().unwrap() = Some((auth, body));
                        Json(json!({
                            "model": "gpt-4o-mini",
                            "choices": [{ "message": { "role": "assistant", "content": "{\"summary\":\"ok\"}" } }]
                        }))
                    },
                ),
            )
            .with_state(seen.clone()),
    )
    .await;

    let services = EngineServices::default();
    services.providers.register(Arc::new(OpenAiProvider::new(
        reqwest::Client::new(),
        "test-key",
        format!("http://{}/v1", addr),
    )));
    let engine = ExecutionEngine::new(services);

    let ai = Node::new(
        "summarise",
        NodeType::Ai,
        json!({
            "model": "gpt-4o-mini",
            "systemPrompt": "Be brief",
            "userPromptTemplate": "Summarise: {{input.text}}",
            "outputSchema": { "type": "object", "required": ["summary"] }
        }),
    );

    let result = engine
        .execute(
            vec![ai, output("out")],
            vec![Edge::new("summarise", "out")],
            json!({ "text": "a long story" }),
        )
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(result.output, Some(json!({ "summary": "ok" })));

    let (auth, body) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(auth, "Bearer test-key");
    assert_eq!(body["messages"][0], json!({ "role": "system", "content": "Be brief" }));
    assert_eq!(body["messages"][1]["content"], json!("Summarise: a long story"));
    assert_eq!(body["response_format"], json!({ "type": "json_object" }));
}

#[tokio::test]
async fn anthropic_provider_speaks_messages() {
    let addr = serve(Router::new().route(
        "/v1/messages",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let key_ok = headers.get("x-api-key").map(|v| v == "anthropic-key").unwrap_or(false);
            let version_ok = headers.contains_key("anthropic-version");
            if !key_ok || !version_ok || body["max_tokens"].as_u64().is_none() {
                return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad request" })));
            }
            (
                StatusCode::OK,
                Json(json!({ "content": [{ "type": "text", "text": "hello there" }] })),
            )
        }),
    ))
    .await;

    let services = EngineServices::default();
    services.providers.register(Arc::new(AnthropicProvider::new(
        reqwest::Client::new(),
        "anthropic-key",
        format!("http://{}", addr),
    )));
    let engine = ExecutionEngine::new(services);

    let ai = Node::new(
        "chat",
        NodeType::Ai,
        json!({ "provider": "anthropic", "model": "claude-test", "userPromptTemplate": "Say hi" }),
    );

    let result = engine
        .execute(vec![ai, output("out")], vec![Edge::new("chat", "out")], json!({}))
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(result.output, Some(json!({ "text": "hello there" })));
}

#[tokio::test]
async fn integration_receives_resolved_connection_and_input() {
    let handler = TestIntegration::new();
    let engine = engine_with_integration(handler.clone());

    let node = Node::new(
        "post",
        NodeType::Integration,
        json!({
            "integrationId": "test",
            "actionId": "echo",
            "connection": { "token": "{{input.token}}" },
            "input": { "text": "hello {{input.user}}" }
        }),
    );

    let result = engine
        .execute(
            vec![node, output("out")],
            vec![Edge::new("post", "out")],
            json!({ "token": "t-1", "user": "ada" }),
        )
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(
        result.output,
        Some(json!({ "connection": { "token": "t-1" }, "input": { "text": "hello ada" } }))
    );
    assert_eq!(result.credits_used, 1);
}

#[tokio::test]
async fn unregistered_integration_fails_the_node() {
    let result = engine()
        .execute(
            vec![integration("post", "slack", "send_message"), output("out")],
            vec![Edge::new("post", "out")],
            json!({}),
        )
        .await;

    let entry = result.log("post").unwrap();
    assert_eq!(entry.status, NodeStatus::Failed);
    assert!(entry.error.as_deref().unwrap().contains("slack"));
}
