//! 429 rate-limit handling and the fallback-blocked event (§4.10,
//! §4.11, §6.5).

use chrono::Utc;
use linkrelay::config::providers::ApiKeyConfig;
use linkrelay::config::ProviderConfig;
use linkrelay::execution::{
    BlacklistManager, BlacklistSettings, EngineEvent, EventBus, ExecutionInputs, ExecutionManager,
    FinalStatus,
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

fn provider(endpoint: &str) -> ProviderConfig {
    ProviderConfig {
        name: "p-ratelimited".to_string(),
        endpoint: endpoint.to_string(),
        api_key: ApiKeyConfig::Single("sk-x".to_string()),
        custom_headers: None,
        models: vec!["gpt-4".to_string()],
        provider_type: "openai-compatible".to_string(),
        timeout_secs: 5,
        max_retries: 1,
    }
}

fn route(endpoint: &str) -> RouteInfo {
    RouteInfo {
        id: "r-ratelimited".to_string(),
        provider_id: "p-ratelimited".to_string(),
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

fn decision() -> RoutingDecision {
    RoutingDecision {
        request_id: "req-1".to_string(),
        selected_provider_id: "p-ratelimited".to_string(),
        selected_model: "gpt-4".to_string(),
        selected_route_id: "r-ratelimited".to_string(),
        reasoning: "test".to_string(),
        confidence: 90,
        estimated_latency_ms: 50,
        decision_timestamp: Utc::now(),
        processing_time_ms: 0,
        sibling_pipeline_ids: vec![],
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

#[tokio::test]
async fn first_429_temporarily_blocks_and_leaves_no_pipelines_available() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let routes = RouteTable::new();
    routes.insert(route(&server.uri()));
    let mut providers = HashMap::new();
    providers.insert("p-ratelimited".to_string(), provider(&server.uri()));

    let blacklist = Arc::new(BlacklistManager::new(BlacklistSettings::default()));
    let manager = ExecutionManager::new(
        blacklist,
        EventBus::new(),
        reqwest::Client::new(),
        3,
        Duration::from_secs(5),
    );

    let decision = decision();
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
    assert!(manager.blacklist().is_blacklisted("p-ratelimited-gpt-4-0"));
    assert!(!manager.blacklist().is_destroyed("p-ratelimited-gpt-4-0"));
}

#[tokio::test]
async fn third_consecutive_429_destroys_the_pipeline() {
    let blacklist = BlacklistManager::new(BlacklistSettings::default());
    assert!(matches!(
        blacklist.handle_429("p-ratelimited-gpt-4-0"),
        linkrelay::execution::BlockAction::TemporaryBlock { .. }
    ));
    assert!(matches!(
        blacklist.handle_429("p-ratelimited-gpt-4-0"),
        linkrelay::execution::BlockAction::TemporaryBlock { .. }
    ));
    assert!(matches!(
        blacklist.handle_429("p-ratelimited-gpt-4-0"),
        linkrelay::execution::BlockAction::Destroy
    ));
    assert!(blacklist.is_destroyed("p-ratelimited-gpt-4-0"));
}

#[tokio::test]
async fn destroyed_pipeline_publishes_fallback_blocked_event() {
    let server = MockServer::start().await;

    let routes = RouteTable::new();
    routes.insert(route(&server.uri()));
    let mut providers = HashMap::new();
    providers.insert("p-ratelimited".to_string(), provider(&server.uri()));

    let blacklist = Arc::new(BlacklistManager::new(BlacklistSettings::default()));
    blacklist.destroy("p-ratelimited-gpt-4-0");
    let events = EventBus::new();
    let mut rx = events.subscribe();

    let manager = ExecutionManager::new(blacklist, events, reqwest::Client::new(), 3, Duration::from_secs(5));

    let decision = decision();
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
    let event = rx.recv().await.unwrap();
    assert!(matches!(event, EngineEvent::FallbackBlocked { .. }));
}
