//! Category-based rule matching and weighted-provider scoring (§4.1).

use linkrelay::model::{Priority, RoutingRequest};
use linkrelay::router::{
    Condition, ConditionValue, HealthStatus, Operator, RouteInfo, RouteMetadata, RouteTable,
    Router, RoutingRule, RoutingRules,
};
use std::collections::HashMap;

fn route(id: &str, provider: &str, weight: f64) -> RouteInfo {
    RouteInfo {
        id: id.to_string(),
        provider_id: provider.to_string(),
        provider_type: "openai-compatible".to_string(),
        supported_models: vec!["*".to_string()],
        weight,
        available: true,
        health: HealthStatus::Healthy,
        tags: vec![],
        metadata: RouteMetadata {
            endpoint_url: "http://localhost:9/v1".to_string(),
            api_key_ref: Some("sk-x".to_string()),
            custom_headers: HashMap::new(),
        },
    }
}

fn rules_with_category() -> RoutingRules {
    let default_rule = RoutingRule {
        id: "default".to_string(),
        name: "default".to_string(),
        enabled: true,
        priority: 0,
        conditions: vec![],
        target_providers: vec!["general".to_string()],
        weights: None,
        description: None,
        tags: vec![],
    };

    let mut category_rules = HashMap::new();
    category_rules.insert(
        "coding".to_string(),
        RoutingRule {
            id: "coding".to_string(),
            name: "coding".to_string(),
            enabled: true,
            priority: 10,
            conditions: vec![Condition {
                field: "category".to_string(),
                operator: Operator::Equals,
                value: ConditionValue::Single("coding".to_string()),
            }],
            target_providers: vec!["coder".to_string()],
            weights: None,
            description: None,
            tags: vec![],
        },
    );

    RoutingRules {
        version: "1".to_string(),
        default_rule,
        category_rules,
        model_rules: HashMap::new(),
        custom_rules: vec![],
    }
}

#[test]
fn category_request_routes_to_its_own_rule() {
    let routes = RouteTable::new();
    routes.insert(route("general-r1", "general", 1.0));
    routes.insert(route("coder-r1", "coder", 1.0));
    let router = Router::new(rules_with_category(), routes, 50);

    let request = RoutingRequest::new("req-1".into(), "gpt-4".into())
        .unwrap()
        .with_category("coding");
    let decision = router.route(&request).unwrap();

    assert_eq!(decision.selected_provider_id, "coder");
}

#[test]
fn uncategorized_request_falls_back_to_default_rule() {
    let routes = RouteTable::new();
    routes.insert(route("general-r1", "general", 1.0));
    routes.insert(route("coder-r1", "coder", 1.0));
    let router = Router::new(rules_with_category(), routes, 50);

    let request = RoutingRequest::new("req-1".into(), "gpt-4".into()).unwrap();
    let decision = router.route(&request).unwrap();

    assert_eq!(decision.selected_provider_id, "general");
}

#[test]
fn higher_weight_route_wins_among_siblings() {
    let routes = RouteTable::new();
    routes.insert(route("light", "general", 0.2));
    routes.insert(route("heavy", "general", 5.0));
    let default_rule = RoutingRule {
        id: "default".to_string(),
        name: "default".to_string(),
        enabled: true,
        priority: 0,
        conditions: vec![],
        target_providers: vec!["general".to_string()],
        weights: None,
        description: None,
        tags: vec![],
    };
    let rules = RoutingRules {
        version: "1".to_string(),
        default_rule,
        category_rules: HashMap::new(),
        model_rules: HashMap::new(),
        custom_rules: vec![],
    };
    let router = Router::new(rules, routes, 50);

    let request = RoutingRequest::new("req-1".into(), "gpt-4".into()).unwrap();
    let decision = router.route(&request).unwrap();

    assert_eq!(decision.selected_route_id, "heavy");
    assert_eq!(decision.sibling_pipeline_ids, vec!["light".to_string()]);
}

#[test]
fn high_priority_requests_score_higher_confidence() {
    let routes = RouteTable::new();
    routes.insert(route("general-r1", "general", 1.0));
    let rules = rules_with_category();
    let router = Router::new(rules, routes, 50);

    let low = RoutingRequest::new("req-low".into(), "gpt-4".into())
        .unwrap()
        .with_priority(Priority::Low);
    let high = RoutingRequest::new("req-high".into(), "gpt-4".into())
        .unwrap()
        .with_priority(Priority::High);

    let low_decision = router.route(&low).unwrap();
    let high_decision = router.route(&high).unwrap();

    assert!(high_decision.confidence >= low_decision.confidence);
}
