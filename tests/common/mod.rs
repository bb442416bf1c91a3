//! Shared helpers for integration tests: graph builders, a local mock HTTP
//! server and in-process collaborator doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use nodeflow::integration::{ActionOutcome, ActionRequest, IntegrationAction};
use nodeflow::llm::{LlmProvider, LlmRequest, LlmResponse};
use nodeflow::runtime::error::NodeError;
use nodeflow::{EngineServices, ExecutionEngine, Node, NodeType};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Barrier;

pub fn engine() -> ExecutionEngine {
    ExecutionEngine::new(EngineServices::default())
}

pub fn input(id: &str) -> Node {
    Node::new(id, NodeType::Input, json!({}))
}

pub fn output(id: &str) -> Node {
    Node::new(id, NodeType::Output, json!({}))
}

pub fn logic(id: &str, config: Value) -> Node {
    Node::new(id, NodeType::Logic, config)
}

pub fn integration(id: &str, integration_id: &str, action_id: &str) -> Node {
    Node::new(
        id,
        NodeType::Integration,
        json!({ "integrationId": integration_id, "actionId": action_id }),
    )
}

/// Serve `router` on an ephemeral local port
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });
    addr
}

/// Provider double that always answers with the same text and keeps every prompt
pub struct CannedProvider {
    pub name: String,
    pub reply: String,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl CannedProvider {
    pub fn new(name: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for CannedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(LlmResponse {
            text: self.reply.clone(),
            model: request.model.clone(),
        })
    }
}

/// Integration double with a few behaviours keyed by action id:
/// `echo`, `fail`, `panic`, `sleep` (200ms), `barrier` and `slow` (tracks peak concurrency)
pub struct TestIntegration {
    pub invocations: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub barrier: Option<Arc<Barrier>>,
}

impl TestIntegration {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    pub fn with_barrier(parties: usize) -> Arc<Self> {
        Self::build(Some(Arc::new(Barrier::new(parties))))
    }

    fn build(barrier: Option<Arc<Barrier>>) -> Arc<Self> {
        Arc::new(Self {
            invocations: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            barrier,
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntegrationAction for TestIntegration {
    fn integration_id(&self) -> &str {
        "test"
    }

    fn supports(&self, action_id: &str) -> bool {
        matches!(action_id, "echo" | "fail" | "panic" | "sleep" | "barrier" | "slow")
    }

    async fn execute_action(&self, action_id: &str, request: ActionRequest) -> ActionOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match action_id {
            "echo" => ActionOutcome::Success(json!({ "connection": request.connection, "input": request.input })),
            "fail" => ActionOutcome::Failure("remote said no".to_string()),
            "panic" => panic!("integration exploded"),
            "sleep" => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                ActionOutcome::Success(json!("slept"))
            }
            "barrier" => {
                if let Some(barrier) = &self.barrier {
                    barrier.wait().await;
                }
                ActionOutcome::Success(json!("met"))
            }
            _ => {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                ActionOutcome::Success(request.input)
            }
        }
    }
}

/// Engine whose services carry `handler` as the `test` integration
pub fn engine_with_integration(handler: Arc<TestIntegration>) -> ExecutionEngine {
    let services = EngineServices::default();
    services.integrations.register(handler);
    ExecutionEngine::new(services)
}
