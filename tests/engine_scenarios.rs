//! End-to-end runs of small graphs through `ExecutionEngine`.

mod common;

use axum::{http::StatusCode, routing::get, Router};
use common::*;
use nodeflow::runtime::error::ErrorCategory;
use nodeflow::runtime::{SkipReason, VecProgressSink};
use nodeflow::{Edge, Node, NodeStatus, NodeType, RunOptions};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn filter_gt_one(id: &str) -> Node {
    logic(id, json!({ "operation": "filter", "field": "items", "condition": "item > 1" }))
}

#[tokio::test]
async fn filter_chain_produces_output_and_costs_one_credit() {
    let result = engine()
        .execute(
            vec![input("A"), filter_gt_one("B"), output("C")],
            vec![Edge::new("A", "B"), Edge::new("B", "C")],
            json!({ "items": [1, 2, 3] }),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, Some(json!({ "items": [2, 3] })));
    assert_eq!(result.logs.len(), 3);
    assert!(result.logs.iter().all(|entry| entry.status == NodeStatus::Success));
    assert_eq!(result.credits_used, 1);
    assert_eq!(result.error, None);
    assert!(result.error_analysis.is_none());
}

#[tokio::test]
async fn failing_api_skips_output_and_charges_only_the_api() {
    let addr = serve(Router::new().route(
        "/fail",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream broke") }),
    ))
    .await;

    let api = Node::new("B", NodeType::Api, json!({ "url": format!("http://{}/fail", addr) }));
    let result = engine()
        .execute(
            vec![input("A"), api, output("C")],
            vec![Edge::new("A", "B"), Edge::new("B", "C")],
            json!({}),
        )
        .await;

    assert!(!result.success);
    let b = result.log("B").unwrap();
    assert_eq!(b.status, NodeStatus::Failed);
    assert!(b.error.as_deref().unwrap().contains("500"));
    let c = result.log("C").unwrap();
    assert_eq!(c.status, NodeStatus::Skipped);
    assert_eq!(c.skip_reason, Some(SkipReason::UpstreamFailed));
    assert_eq!(result.credits_used, 1);

    let analysis = result.error_analysis.unwrap();
    assert_eq!(analysis.category, ErrorCategory::Network);
    assert!(result.error.unwrap().contains("'B'"));
}

#[tokio::test]
async fn independent_chain_survives_a_failing_sibling() {
    let strict_input = Node::new(
        "A",
        NodeType::Input,
        json!({ "fields": [{ "name": "missing", "type": "string", "required": true }] }),
    );

    let result = engine()
        .execute(
            vec![strict_input, output("B"), input("C"), output("D")],
            vec![Edge::new("A", "B"), Edge::new("C", "D")],
            json!({ "present": 1 }),
        )
        .await;

    assert_eq!(result.log("A").unwrap().status, NodeStatus::Failed);
    assert_eq!(result.log("B").unwrap().status, NodeStatus::Skipped);
    assert_eq!(result.log("C").unwrap().status, NodeStatus::Success);
    assert_eq!(result.log("D").unwrap().status, NodeStatus::Success);
    assert_eq!(result.output, Some(json!({ "D": { "present": 1 } })));
    assert!(!result.success);
    assert_eq!(result.error_analysis.unwrap().category, ErrorCategory::Validation);
}

#[tokio::test]
async fn ai_reply_that_breaks_the_schema_fails_but_is_charged() {
    let provider = CannedProvider::new("openai", "not json");
    let services = nodeflow::EngineServices::default();
    services.providers.register(provider.clone());
    let engine = nodeflow::ExecutionEngine::new(services);

    let ai = Node::new(
        "B",
        NodeType::Ai,
        json!({
            "model": "gpt-4o-mini",
            "userPromptTemplate": "Summarise {{input.text}}",
            "outputSchema": {
                "type": "object",
                "properties": { "summary": { "type": "string" } },
                "required": ["summary"]
            }
        }),
    );

    let result = engine
        .execute(
            vec![input("A"), ai, output("C")],
            vec![Edge::new("A", "B"), Edge::new("B", "C")],
            json!({ "text": "long article" }),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.log("B").unwrap().status, NodeStatus::Failed);
    assert_eq!(result.error_analysis.unwrap().category, ErrorCategory::SchemaMismatch);
    assert_eq!(result.credits_used, 10);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ai_reply_matching_the_schema_flows_downstream() {
    let provider = CannedProvider::new("openai", "```json\n{\"summary\": \"short\"}\n```");
    let services = nodeflow::EngineServices::default();
    services.providers.register(provider);
    let engine = nodeflow::ExecutionEngine::new(services);

    let ai = Node::new(
        "B",
        NodeType::Ai,
        json!({
            "model": "gpt-4o-mini",
            "userPromptTemplate": "Summarise",
            "outputSchema": { "properties": { "summary": { "type": "string" } }, "required": ["summary"] }
        }),
    );
    let out = Node::new("C", NodeType::Output, json!({ "format": "text", "template": "Summary: {{B.summary}}" }));

    let result = engine
        .execute(vec![ai, out], vec![Edge::new("B", "C")], json!({}))
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(result.output, Some(json!("Summary: short")));
}

#[tokio::test]
async fn cycle_is_rejected_before_anything_runs() {
    let result = engine()
        .execute(
            vec![input("A"), filter_gt_one("B"), output("C")],
            vec![Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("C", "B")],
            json!({ "items": [] }),
        )
        .await;

    assert!(!result.success);
    assert!(result.logs.is_empty());
    assert_eq!(result.credits_used, 0);
    assert!(result.error.unwrap().contains("cycle"));
}

#[tokio::test]
async fn graph_without_output_node_is_structural() {
    let result = engine()
        .execute(vec![input("A")], Vec::new(), json!({}))
        .await;

    assert!(!result.success);
    assert!(result.logs.is_empty());
    assert_eq!(result.error.as_deref(), Some("workflow has no output node"));
}

#[tokio::test]
async fn skipped_nodes_are_never_started_or_invoked() {
    let handler = TestIntegration::new();
    let engine = engine_with_integration(handler.clone());
    let sink = Arc::new(VecProgressSink::new());

    let result = engine
        .execute_with(
            vec![
                integration("A", "test", "fail"),
                integration("B", "test", "echo"),
                integration("C", "test", "echo"),
                output("D"),
            ],
            vec![Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("C", "D")],
            json!({}),
            RunOptions::default().with_progress(sink.clone()),
        )
        .await;

    assert_eq!(handler.invocations(), 1);
    assert_eq!(result.credits_used, 1);
    assert_eq!(result.log("A").unwrap().error.as_deref(), Some("remote said no"));
    for id in ["B", "C", "D"] {
        let entry = result.log(id).unwrap();
        assert_eq!(entry.status, NodeStatus::Skipped);
        assert!(entry.started_at.is_none());
        assert!(entry.output.is_none());
    }

    let seen = sink.entries();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|entry| entry.is_terminal()));
    let order: Vec<&str> = seen.iter().map(|entry| entry.node_id.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn adding_a_charged_node_raises_the_cost() {
    let short = engine()
        .execute(
            vec![input("A"), filter_gt_one("B"), output("C")],
            vec![Edge::new("A", "B"), Edge::new("B", "C")],
            json!({ "items": [1, 2, 3] }),
        )
        .await;

    let doubled = logic("B2", json!({ "operation": "map", "field": "items", "expression": "item * 2" }));
    let long = engine()
        .execute(
            vec![input("A"), filter_gt_one("B"), doubled, output("C")],
            vec![Edge::new("A", "B"), Edge::new("B", "B2"), Edge::new("B2", "C")],
            json!({ "items": [1, 2, 3] }),
        )
        .await;

    assert!(short.success && long.success);
    assert_eq!(long.output, Some(json!({ "items": [4, 6] })));
    assert!(long.credits_used > short.credits_used);
}

#[tokio::test]
async fn condition_routes_to_one_branch_only() {
    let nodes = vec![
        input("in"),
        logic("check", json!({ "operation": "condition", "condition": "input.score >= 50" })),
        Node::new("pass", NodeType::Output, json!({ "format": "text", "template": "passed" })),
        logic("retry", json!({ "operation": "transform", "mappings": { "again": "true" } })),
        output("fail"),
    ];
    let edges = vec![
        Edge::new("in", "check"),
        Edge::new("check", "pass").from_handle("true"),
        Edge::new("check", "retry").from_handle("false"),
        Edge::new("retry", "fail"),
    ];

    let result = engine().execute(nodes, edges, json!({ "score": 72 })).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.log("check").unwrap().branch.as_deref(), Some("true"));
    assert_eq!(result.log("retry").unwrap().skip_reason, Some(SkipReason::BranchNotTaken));
    assert_eq!(result.log("fail").unwrap().skip_reason, Some(SkipReason::BranchNotTaken));
    assert_eq!(result.output, Some(json!({ "pass": "passed" })));
    assert_eq!(result.credits_used, 1);
}

#[tokio::test]
async fn multi_parent_node_sees_every_parent_output() {
    let nodes = vec![
        input("in"),
        logic("double", json!({ "operation": "transform", "expression": "input.n * 2" })),
        logic("square", json!({ "operation": "transform", "expression": "input.n * input.n" })),
        output("out"),
    ];
    let edges = vec![
        Edge::new("in", "double"),
        Edge::new("in", "square"),
        Edge::new("double", "out").into_handle("doubled"),
        Edge::new("square", "out"),
    ];

    let result = engine().execute(nodes, edges, json!({ "n": 3 })).await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(result.output, Some(json!({ "doubled": 6, "square": 9 })));
}

#[tokio::test]
async fn templates_reach_upstream_outputs_and_warn_on_gaps() {
    let nodes = vec![
        input("form"),
        Node::new(
            "out",
            NodeType::Output,
            json!({ "format": "text", "template": "Hi {{form.name}}{{form.nickname}}" }),
        ),
    ];

    let result = engine()
        .execute(nodes, vec![Edge::new("form", "out")], json!({ "name": "Ada" }))
        .await;

    assert!(result.success);
    assert_eq!(result.output, Some(json!("Hi Ada")));
    assert_eq!(result.log("out").unwrap().warnings.len(), 1);
}

#[tokio::test]
async fn ai_prompt_reads_the_upstream_logic_output() {
    let provider = CannedProvider::new("openai", "done");
    let services = nodeflow::EngineServices::default();
    services.providers.register(provider.clone());
    let engine = nodeflow::ExecutionEngine::new(services);

    let ai = Node::new(
        "C",
        NodeType::Ai,
        json!({ "model": "gpt-4o-mini", "userPromptTemplate": "Summarise: {{$in.text}} (asked: {{input.text}})" }),
    );

    let result = engine
        .execute(
            vec![
                input("A"),
                logic("B", json!({ "operation": "transform", "expression": "{ text = 'from-upstream' }" })),
                ai,
                output("D"),
            ],
            vec![Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("C", "D")],
            json!({ "text": "global" }),
        )
        .await;

    assert!(result.success, "{:?}", result.logs);
    assert_eq!(provider.prompts(), vec!["Summarise: from-upstream (asked: global)"]);
    assert_eq!(result.log("C").unwrap().input, Some(json!({ "text": "from-upstream" })));
    assert_eq!(result.credits_used, 11);
}
