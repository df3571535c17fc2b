//! Serve command implementation.

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::{EngineConfig, LogFormat, LoggingConfig, ProviderConfig};
use crate::execution::blacklist::{self, DestroyRule};
use crate::execution::{BlacklistManager, BlacklistSettings, EventBus, ExecutionManager};
use crate::metrics::MetricsCollector;
use crate::router::{
    Condition, ConditionValue, HealthStatus, Operator, RouteInfo, RouteMetadata, RouteTable,
    Router, RoutingRule, RoutingRules,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides applied on top of env overrides.
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        EngineConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("config file not found, using defaults");
        EngineConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Initialize tracing based on configuration.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.enable_content_logging {
        eprintln!(
            "WARNING: content logging is enabled. Request/response message bodies will be logged."
        );
        eprintln!("         This may include sensitive data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Build a default-rule-plus-category-rules `RoutingRules` snapshot from
/// the flat `router.<category> = "provider,model;..."` config table.
pub fn build_routing_rules(
    router_config: &crate::config::RouterConfig,
) -> Result<RoutingRules, String> {
    let default_expr = router_config
        .default_expression()
        .ok_or_else(|| "router.default is required".to_string())?;
    let default_providers: Vec<String> = crate::config::RouterConfig::parse_expression(default_expr)
        .into_iter()
        .map(|(provider, _model)| provider)
        .collect();
    if default_providers.is_empty() {
        return Err("router.default must name at least one pipeline".to_string());
    }

    let default_rule = RoutingRule {
        id: "default".to_string(),
        name: "default".to_string(),
        enabled: true,
        priority: 0,
        conditions: vec![],
        target_providers: default_providers,
        weights: None,
        description: None,
        tags: vec![],
    };

    let mut category_rules = HashMap::new();
    for (key, expr) in &router_config.0 {
        if key == "default" {
            continue;
        }
        let providers: Vec<String> = crate::config::RouterConfig::parse_expression(expr)
            .into_iter()
            .map(|(provider, _model)| provider)
            .collect();
        if providers.is_empty() {
            continue;
        }
        let rule = RoutingRule {
            id: key.clone(),
            name: key.clone(),
            enabled: true,
            priority: 10,
            conditions: vec![Condition {
                field: "category".to_string(),
                operator: Operator::Equals,
                value: ConditionValue::Single(key.clone()),
            }],
            target_providers: providers,
            weights: None,
            description: None,
            tags: vec![],
        };
        category_rules.insert(key.clone(), rule);
    }

    Ok(RoutingRules {
        version: "1".to_string(),
        default_rule,
        category_rules,
        model_rules: HashMap::new(),
        custom_rules: vec![],
    })
}

/// Build one `RouteInfo` per configured provider, covering all of its
/// declared model globs.
pub fn build_route_table(providers: &[ProviderConfig]) -> RouteTable {
    let routes: Vec<RouteInfo> = providers
        .iter()
        .map(|provider| RouteInfo {
            id: provider.name.clone(),
            provider_id: provider.name.clone(),
            provider_type: provider.provider_type.clone(),
            supported_models: provider.models.clone(),
            weight: 1.0,
            available: true,
            health: HealthStatus::Healthy,
            tags: vec![],
            metadata: RouteMetadata {
                endpoint_url: provider.endpoint.clone(),
                api_key_ref: Some(provider.name.clone()),
                custom_headers: provider.custom_headers.clone().unwrap_or_default(),
            },
        })
        .collect();
    RouteTable::from_routes(routes)
}

fn build_blacklist_settings(config: &crate::config::BlacklistSettingsConfig) -> BlacklistSettings {
    BlacklistSettings {
        rate_limit_block_duration: Duration::from_secs(config.rate_limit_rule.block_duration_secs),
        rate_limit_max_consecutive_failures: config.rate_limit_rule.max_consecutive_failures,
        rate_limit_reset_interval: Duration::from_secs(config.rate_limit_rule.reset_interval_secs),
        max_blacklist_duration: Duration::from_secs(config.max_blacklist_duration_secs),
        destroy_rules: config
            .destroy_rules
            .iter()
            .map(|rule| DestroyRule {
                status_code: Some(rule.status_code),
                error_patterns: rule.error_patterns.clone(),
                enabled: rule.enabled,
            })
            .collect(),
    }
}

/// Build the shared `AppState` (and the router built on top of it) from a
/// validated configuration snapshot. Spawns the blacklist's debounced
/// persistence writer, so this must run on a tokio runtime.
pub async fn build_app_state(
    config: EngineConfig,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let rules = build_routing_rules(&config.router)?;
    let routes = build_route_table(&config.providers);
    let router = Arc::new(Router::new(rules, routes, config.performance.history_retention));

    let blacklist_settings = build_blacklist_settings(&config.blacklist_settings);
    let persistence_path = config.blacklist_settings.persistence_file.clone();
    let persisted = blacklist::load_state(&persistence_path).await;
    let blacklist = BlacklistManager::new(blacklist_settings)
        .with_persistence(persistence_path, Duration::from_millis(500));
    blacklist.rehydrate(persisted);

    let events = EventBus::new();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.request_timeout_seconds))
        .pool_max_idle_per_host(10)
        .build()?;
    let max_retries = config
        .routing
        .zero_fallback_policy
        .max_retries
        .unwrap_or(crate::execution::DEFAULT_MAX_RETRIES);
    let max_execution_time = Duration::from_millis(config.performance.decision_timeout_ms);
    let execution = Arc::new(ExecutionManager::new(
        blacklist,
        events,
        client,
        max_retries,
        max_execution_time,
    ));

    let providers: HashMap<String, ProviderConfig> = config
        .providers
        .iter()
        .map(|p| (p.name.clone(), p.clone()))
        .collect();

    Ok(AppState {
        config: Arc::new(config),
        router,
        execution,
        providers: Arc::new(providers),
        metrics: Arc::new(MetricsCollector::new()),
    })
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }

    cancel_token.cancel();
}

/// Main `serve` command handler.
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;
    tracing::info!("starting linkrelay gateway");
    tracing::debug!(?config, "loaded configuration");

    let port = config.server.port;
    let host = config.server.host.clone();
    let state = build_app_state(config).await?;
    let app = create_router(state);

    let cancel_token = CancellationToken::new();

    let addr = format!("{host}:{port}");
    tracing::info!(addr = %addr, "linkrelay listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    tracing::info!("linkrelay stopped");
    Ok(())
}
