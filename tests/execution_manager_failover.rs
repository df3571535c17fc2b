//! Sibling-pipeline failover and rate-limit destroy ladder (§4.8,
//! §4.9, §4.10).

use chrono::Utc;
use linkrelay::config::providers::ApiKeyConfig;
use linkrelay::config::ProviderConfig;
use linkrelay::execution::{
    BlacklistManager, BlacklistSettings, EventBus, ExecutionInputs, ExecutionManager, FinalStatus,
};
use linkrelay::model::request::WireFormat;
use linkrelay::pipeline::WireRequest;
use linkrelay::provider::openai::{OpenAiChatRequest, OpenAiMessage};
use linkrelay::router::route_info::RouteMetadata;
use linkrelay::router::{HealthStatus, RouteInfo, RouteTable, RoutingDecision};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(name: &str, endpoint: &str) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        endpoint: endpoint.to_string(),
        api_key: ApiKeyConfig::Single("sk-x".to_string()),
        custom_headers: None,
        models: vec!["gpt-4".to_string()],
        provider_type: "openai-compatible".to_string(),
        timeout_secs: 5,
        max_retries: 1,
    }
}

fn route(id: &str, provider_id: &str, endpoint: &str) -> RouteInfo {
    RouteInfo {
        id: id.to_string(),
        provider_id: provider_id.to_string(),
        provider_type: "openai-compatible".to_string(),
        supported_models: vec!["*".to_string()],
        weight: 1.0,
        available: true,
        health: HealthStatus::Healthy,
        tags: vec![],
        metadata: RouteMetadata {
            endpoint_url: format!("{endpoint}/v1"),
            api_key_ref: Some("sk-x".to_string()),
            custom_headers: HashMap::new(),
        },
    }
}

fn decision(selected: &str, siblings: Vec<String>) -> RoutingDecision {
    RoutingDecision {
        request_id: "req-1".to_string(),
        selected_provider_id: "whatever".to_string(),
        selected_model: "gpt-4".to_string(),
        selected_route_id: selected.to_string(),
        reasoning: "test".to_string(),
        confidence: 90,
        estimated_latency_ms: 50,
        decision_timestamp: Utc::now(),
        processing_time_ms: 0,
        sibling_pipeline_ids: siblings,
    }
}

fn origin_request() -> WireRequest {
    WireRequest::OpenAi(OpenAiChatRequest {
        model: "gpt-4".to_string(),
        messages: vec![OpenAiMessage {
            role: "user".to_string(),
            content: Some("hi".to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }],
        max_tokens: Some(16),
        temperature: None,
        top_p: None,
        stop: None,
        tools: None,
        tool_choice: None,
        stream: false,
    })
}

fn success_body() -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 0,
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "ok"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
    })
}

#[tokio::test]
async fn failing_route_fails_over_to_healthy_sibling() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&failing)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&healthy)
        .await;

    let routes = RouteTable::new();
    routes.insert(route("r-failing", "p-failing", &failing.uri()));
    routes.insert(route("r-healthy", "p-healthy", &healthy.uri()));

    let mut providers = HashMap::new();
    providers.insert("p-failing".to_string(), provider("p-failing", &failing.uri()));
    providers.insert("p-healthy".to_string(), provider("p-healthy", &healthy.uri()));

    let blacklist = Arc::new(BlacklistManager::new(BlacklistSettings::default()));
    let manager = ExecutionManager::new(
        blacklist,
        EventBus::new(),
        reqwest::Client::new(),
        3,
        Duration::from_secs(5),
    );

    let decision = decision("r-failing", vec!["r-healthy".to_string()]);
    let origin = origin_request();

    let result = manager
        .execute(ExecutionInputs {
            decision: &decision,
            route_table: &routes,
            providers: &providers,
            origin_request: &origin,
            origin_format: WireFormat::OpenAi,
            caller_format: WireFormat::OpenAi,
        })
        .await;

    assert_eq!(result.final_status, FinalStatus::Success);
    assert!(result.attempts.len() >= 2);
    assert!(result.succeeded_pipeline_id.unwrap().starts_with("p-healthy"));
}

#[tokio::test]
async fn provider_body_missing_top_level_model_still_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"choices":[{"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":2}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let routes = RouteTable::new();
    routes.insert(route("r-lmstudio", "p-lmstudio", &server.uri()));
    let mut providers = HashMap::new();
    providers.insert("p-lmstudio".to_string(), provider("p-lmstudio", &server.uri()));

    let blacklist = Arc::new(BlacklistManager::new(BlacklistSettings::default()));
    let manager = ExecutionManager::new(
        blacklist,
        EventBus::new(),
        reqwest::Client::new(),
        1,
        Duration::from_secs(5),
    );

    let decision = decision("r-lmstudio", vec![]);
    let origin = origin_request();

    let result = manager
        .execute(ExecutionInputs {
            decision: &decision,
            route_table: &routes,
            providers: &providers,
            origin_request: &origin,
            origin_format: WireFormat::OpenAi,
            caller_format: WireFormat::OpenAi,
        })
        .await;

    assert_eq!(result.final_status, FinalStatus::Success);
}

#[tokio::test]
async fn no_eligible_siblings_is_no_pipelines_available() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&failing)
        .await;

    let routes = RouteTable::new();
    routes.insert(route("r-only", "p-only", &failing.uri()));

    let mut providers = HashMap::new();
    providers.insert("p-only".to_string(), provider("p-only", &failing.uri()));

    let blacklist = Arc::new(BlacklistManager::new(BlacklistSettings::default()));
    let manager = ExecutionManager::new(
        blacklist,
        EventBus::new(),
        reqwest::Client::new(),
        3,
        Duration::from_secs(5),
    );

    let decision = decision("r-only", vec![]);
    let origin = origin_request();

    let result = manager
        .execute(ExecutionInputs {
            decision: &decision,
            route_table: &routes,
            providers: &providers,
            origin_request: &origin,
            origin_format: WireFormat::OpenAi,
            caller_format: WireFormat::OpenAi,
        })
        .await;

    assert_eq!(result.final_status, FinalStatus::NoPipelinesAvailable);
    assert!(!result.success);
}
