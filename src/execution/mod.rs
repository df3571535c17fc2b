//! Execution Manager (§4.8): the coordinator that binds Router output
//! to the Health / Blacklist / Classifier components and drives the
//! Server-layer HTTP call across sibling pipelines.

pub mod attempt;
pub mod blacklist;
pub mod classifier;
pub mod events;
pub mod health;
pub mod load_balancer;

pub use attempt::{ErrorAction, ExecutionAttempt, ExecutionResult, FinalStatus};
pub use blacklist::{BlacklistManager, BlacklistSettings, BlockAction};
pub use events::{EngineEvent, EventBus};
pub use health::HealthManager;
pub use load_balancer::{LoadBalancer, Strategy};

use crate::config::ProviderConfig;
use crate::error::EngineError;
use crate::model::request::WireFormat;
use crate::pipeline::{self, WireRequest, WireResponse};
use crate::router::{pipeline_id, RouteTable, RoutingDecision};
use chrono::Utc;
use classifier::{classify, ClassifyContext, FailureShape};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(30);

pub struct ExecutionManager {
    health: HealthManager,
    blacklist: Arc<BlacklistManager>,
    load_balancer: LoadBalancer,
    events: EventBus,
    client: reqwest::Client,
    max_retries: u32,
    max_execution_time: Duration,
}

pub struct ExecutionInputs<'a> {
    pub decision: &'a RoutingDecision,
    pub route_table: &'a RouteTable,
    pub providers: &'a HashMap<String, ProviderConfig>,
    pub origin_request: &'a WireRequest,
    pub origin_format: WireFormat,
    pub caller_format: WireFormat,
}

impl ExecutionManager {
    pub fn new(
        blacklist: Arc<BlacklistManager>,
        events: EventBus,
        client: reqwest::Client,
        max_retries: u32,
        max_execution_time: Duration,
    ) -> Self {
        Self {
            health: HealthManager::new(),
            blacklist,
            load_balancer: LoadBalancer::new(Strategy::default()),
            events,
            client,
            max_retries: if max_retries == 0 { DEFAULT_MAX_RETRIES } else { max_retries },
            max_execution_time: if max_execution_time.is_zero() {
                DEFAULT_MAX_EXECUTION_TIME
            } else {
                max_execution_time
            },
        }
    }

    pub fn health(&self) -> &HealthManager {
        &self.health
    }

    pub fn blacklist(&self) -> &Arc<BlacklistManager> {
        &self.blacklist
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn execute(&self, inputs: ExecutionInputs<'_>) -> ExecutionResult {
        let started = Instant::now();
        let mut attempts: Vec<ExecutionAttempt> = Vec::new();
        let mut global_attempt = 0u32;
        let mut retry_target: Option<String> = None;
        let mut last_error: Option<EngineError> = None;

        loop {
            if started.elapsed() >= self.max_execution_time {
                last_error.get_or_insert(EngineError::ProviderTimeout(
                    "execution time budget exceeded".to_string(),
                ));
                return self.finish(attempts, started, FinalStatus::Failed, None, None, last_error);
            }

            let route_id = match retry_target.take() {
                Some(id) => id,
                None => {
                    if global_attempt >= self.max_retries {
                        return self.finish(attempts, started, FinalStatus::Failed, None, None, last_error);
                    }
                    let eligible = self.eligible_candidates(inputs.decision, inputs.route_table);
                    if eligible.is_empty() {
                        self.events.publish(EngineEvent::FallbackBlocked {
                            request_id: inputs.decision.request_id.clone(),
                            attempted: inputs.decision.all_route_ids(),
                        });
                        return self.finish(
                            attempts,
                            started,
                            FinalStatus::NoPipelinesAvailable,
                            None,
                            None,
                            last_error,
                        );
                    }
                    match self.load_balancer.pick(&eligible, None) {
                        Some(id) => {
                            global_attempt += 1;
                            id.to_string()
                        }
                        None => {
                            return self.finish(
                                attempts,
                                started,
                                FinalStatus::NoPipelinesAvailable,
                                None,
                                None,
                                last_error,
                            )
                        }
                    }
                }
            };

            let attempt_number = attempts.len() as u32 + 1;
            let attempt_started = Instant::now();
            let attempt_started_at = Utc::now();

            let Some(route) = inputs.route_table.get(&route_id) else {
                attempts.push(ExecutionAttempt {
                    pipeline_id: route_id.clone(),
                    attempt_number,
                    started_at: attempt_started_at,
                    ended_at: Utc::now(),
                    duration_ms: 0,
                    success: false,
                    error_message: Some("route no longer present".to_string()),
                    action_taken: Some("skip".to_string()),
                    skipped: true,
                });
                continue;
            };

            let Some(provider) = inputs.providers.get(&route.provider_id) else {
                attempts.push(ExecutionAttempt {
                    pipeline_id: route_id.clone(),
                    attempt_number,
                    started_at: attempt_started_at,
                    ended_at: Utc::now(),
                    duration_ms: 0,
                    success: false,
                    error_message: Some(format!("no provider config for '{}'", route.provider_id)),
                    action_taken: Some("skip".to_string()),
                    skipped: true,
                });
                continue;
            };

            let health_pid = pipeline_id(&route.provider_id, &inputs.decision.selected_model, 0);

            let built = pipeline::build_outbound_request(
                inputs.origin_request,
                inputs.origin_format,
                &route,
                provider,
                &inputs.decision.selected_model,
            );

            let (ctx, outbound) = match built {
                Ok(pair) => pair,
                Err(e) => {
                    // A malformed pipeline layer output is not a provider
                    // transport failure; surface it immediately.
                    attempts.push(ExecutionAttempt {
                        pipeline_id: health_pid,
                        attempt_number,
                        started_at: attempt_started_at,
                        ended_at: Utc::now(),
                        duration_ms: attempt_started.elapsed().as_millis() as u64,
                        success: false,
                        error_message: Some(e.to_string()),
                        action_taken: Some("fatal".to_string()),
                        skipped: false,
                    });
                    return self.finish(attempts, started, FinalStatus::Failed, None, None, Some(e));
                }
            };

            let body = match serde_json::to_vec(&outbound) {
                Ok(bytes) => bytes::Bytes::from(bytes),
                Err(e) => {
                    let err = EngineError::ProviderFailure {
                        message: format!("failed to serialize outbound body: {e}"),
                        origin_was_request_shape: false,
                    };
                    attempts.push(ExecutionAttempt {
                        pipeline_id: health_pid,
                        attempt_number,
                        started_at: attempt_started_at,
                        ended_at: Utc::now(),
                        duration_ms: attempt_started.elapsed().as_millis() as u64,
                        success: false,
                        error_message: Some(err.to_string()),
                        action_taken: Some("fatal".to_string()),
                        skipped: false,
                    });
                    return self.finish(attempts, started, FinalStatus::Failed, None, None, Some(err));
                }
            };

            let target = crate::server::CallTarget {
                url: ctx.url.clone(),
                api_key: ctx.api_key.clone(),
                custom_headers: ctx.custom_headers.clone(),
                timeout: Duration::from_secs(ctx.timeout_secs),
            };

            let outcome = crate::server::execute_with_retry(&self.client, body, &target, ctx.max_retries).await;

            match outcome {
                crate::server::ServerOutcome::Response(response) if response.status < 300 => {
                    let recovered = crate::server::json_recovery::recover(
                        std::str::from_utf8(&response.body).unwrap_or(""),
                    );
                    let parsed: Result<WireResponse, EngineError> = recovered
                        .map_err(|_| EngineError::ProviderFailure {
                            message: "invalid_json_response".to_string(),
                            origin_was_request_shape: false,
                        })
                        .and_then(|v| match crate::server::json_recovery::sniff_shape(v) {
                            crate::server::json_recovery::Shape::ProviderError { message } => {
                                Err(EngineError::ProviderFailure {
                                    message,
                                    origin_was_request_shape: false,
                                })
                            }
                            crate::server::json_recovery::Shape::Value(v) => {
                                serde_json::from_value(v).map_err(|e| EngineError::ProviderFailure {
                                    message: format!("response did not match known wire shape: {e}"),
                                    origin_was_request_shape: false,
                                })
                            }
                        });

                    match parsed.and_then(|wire| {
                        pipeline::build_caller_response(wire, inputs.caller_format, &inputs.decision.request_id)
                    }) {
                        Ok(final_response) => {
                            let latency = attempt_started.elapsed();
                            self.health.record_success(&health_pid, latency);
                            self.blacklist.reset_rate_limit(&health_pid);
                            self.events.publish(EngineEvent::ProviderExecutionSuccess {
                                pipeline_id: health_pid.clone(),
                                latency_ms: latency.as_millis() as u64,
                            });
                            attempts.push(ExecutionAttempt {
                                pipeline_id: health_pid.clone(),
                                attempt_number,
                                started_at: attempt_started_at,
                                ended_at: Utc::now(),
                                duration_ms: latency.as_millis() as u64,
                                success: true,
                                error_message: None,
                                action_taken: None,
                                skipped: false,
                            });
                            return self.finish(
                                attempts,
                                started,
                                FinalStatus::Success,
                                Some(health_pid),
                                Some(final_response),
                                None,
                            );
                        }
                        Err(e) => {
                            let delay = self.record_failure_and_act(
                                &health_pid,
                                FailureShape::InvalidJson,
                                attempt_number,
                                global_attempt,
                                &mut attempts,
                                attempt_started_at,
                                attempt_started,
                                e,
                                &mut retry_target,
                                &route_id,
                                &mut last_error,
                            );
                            if matches!(attempts.last(), Some(a) if a.action_taken.as_deref() == Some("fatal")) {
                                return self.finish(attempts, started, FinalStatus::Failed, None, None, last_error);
                            }
                            if let Some(delay) = delay {
                                tokio::time::sleep(delay).await;
                            }
                        }
                    }
                }
                crate::server::ServerOutcome::Response(response) => {
                    self.health.record_failure(&health_pid);
                    let err = if response.status == 401 {
                        EngineError::AuthenticationFailure(format!(
                            "provider rejected credentials (401) for pipeline '{health_pid}'"
                        ))
                    } else {
                        EngineError::ProviderFailure {
                            message: format!("upstream returned status {}", response.status),
                            origin_was_request_shape: false,
                        }
                    };
                    tracing::warn!(
                        pipeline_id = %health_pid,
                        status = response.status,
                        authorization = %crate::logging::redact_header("authorization", &ctx.api_key),
                        body_preview = %crate::logging::redact_body_preview(
                            std::str::from_utf8(&response.body).unwrap_or("")
                        ),
                        "provider returned error status"
                    );

                    let action = if self.blacklist.should_destroy_pipeline(response.status, &err.to_string()) {
                        self.blacklist.destroy(&health_pid);
                        self.events.publish(EngineEvent::PipelineDestroy {
                            pipeline_id: health_pid.clone(),
                            reason: "destroy_rule_matched".to_string(),
                        });
                        ErrorAction::FatalError {
                            reason: "destroy_rule_matched".to_string(),
                        }
                    } else if response.status == 429 {
                        match self.blacklist.handle_429(&health_pid) {
                            BlockAction::TemporaryBlock { duration } => {
                                self.events.publish(EngineEvent::PipelineTemporaryBlock {
                                    pipeline_id: health_pid.clone(),
                                    reason: "rate_limit".to_string(),
                                    until_ms: (Utc::now() + chrono::Duration::from_std(duration).unwrap_or_default())
                                        .timestamp_millis(),
                                });
                                ErrorAction::BlacklistPipeline {
                                    duration,
                                    reason: "rate_limit".to_string(),
                                }
                            }
                            BlockAction::Destroy => {
                                self.events.publish(EngineEvent::PipelineDestroy {
                                    pipeline_id: health_pid.clone(),
                                    reason: "rate_limit_destroy".to_string(),
                                });
                                ErrorAction::FatalError {
                                    reason: "rate_limit_destroy".to_string(),
                                }
                            }
                        }
                    } else {
                        classify(
                            &FailureShape::Http { status: response.status },
                            &ClassifyContext {
                                attempt_number: global_attempt,
                                max_retries: self.max_retries,
                            },
                        )
                    };

                    self.events.publish(EngineEvent::ProviderExecutionFailure {
                        pipeline_id: health_pid.clone(),
                        reason: action.reason().to_string(),
                    });

                    let delay = self.apply_action(
                        &health_pid,
                        action,
                        &route_id,
                        &mut retry_target,
                        &mut attempts,
                        attempt_number,
                        attempt_started_at,
                        attempt_started,
                        err.clone(),
                    );
                    last_error = Some(err);
                    if attempts.last().map(|a| a.action_taken.as_deref() == Some("fatal")).unwrap_or(false) {
                        return self.finish(attempts, started, FinalStatus::Failed, None, None, last_error);
                    }
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                }
                crate::server::ServerOutcome::Transport(transport_err) => {
                    self.health.record_failure(&health_pid);
                    let action = classify(
                        &FailureShape::Transport(&transport_err),
                        &ClassifyContext {
                            attempt_number: global_attempt,
                            max_retries: self.max_retries,
                        },
                    );
                    let err = EngineError::NetworkError(transport_err.message.clone());
                    self.events.publish(EngineEvent::ProviderExecutionFailure {
                        pipeline_id: health_pid.clone(),
                        reason: action.reason().to_string(),
                    });
                    let delay = self.apply_action(
                        &health_pid,
                        action,
                        &route_id,
                        &mut retry_target,
                        &mut attempts,
                        attempt_number,
                        attempt_started_at,
                        attempt_started,
                        err.clone(),
                    );
                    last_error = Some(err);
                    if attempts.last().map(|a| a.action_taken.as_deref() == Some("fatal")).unwrap_or(false) {
                        return self.finish(attempts, started, FinalStatus::Failed, None, None, last_error);
                    }
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn eligible_candidates(&self, decision: &RoutingDecision, route_table: &RouteTable) -> Vec<String> {
        decision
            .all_route_ids()
            .into_iter()
            .filter(|route_id| {
                let Some(route) = route_table.get(route_id) else {
                    return false;
                };
                let pid = pipeline_id(&route.provider_id, &decision.selected_model, 0);
                !self.blacklist.is_blacklisted(&pid) && self.health.is_healthy(&pid)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn record_failure_and_act(
        &self,
        health_pid: &str,
        failure: FailureShape<'_>,
        attempt_number: u32,
        global_attempt: u32,
        attempts: &mut Vec<ExecutionAttempt>,
        started_at: chrono::DateTime<Utc>,
        attempt_started: Instant,
        err: EngineError,
        retry_target: &mut Option<String>,
        route_id: &str,
        last_error: &mut Option<EngineError>,
    ) -> Option<Duration> {
        let action = classify(
            &failure,
            &ClassifyContext {
                attempt_number: global_attempt,
                max_retries: self.max_retries,
            },
        );
        let delay = self.apply_action(
            health_pid,
            action,
            route_id,
            retry_target,
            attempts,
            attempt_number,
            started_at,
            attempt_started,
            err.clone(),
        );
        *last_error = Some(err);
        delay
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_action(
        &self,
        health_pid: &str,
        action: ErrorAction,
        route_id: &str,
        retry_target: &mut Option<String>,
        attempts: &mut Vec<ExecutionAttempt>,
        attempt_number: u32,
        started_at: chrono::DateTime<Utc>,
        attempt_started: Instant,
        err: EngineError,
    ) -> Option<Duration> {
        let mut retry_delay = None;
        let action_label = match &action {
            ErrorAction::BlacklistPipeline { duration, reason } => {
                self.blacklist.add_temporary_block(health_pid, *duration, reason);
                "blacklist"
            }
            ErrorAction::SkipPipeline { .. } => "skip",
            ErrorAction::RetrySamePipeline { retry_after, .. } => {
                *retry_target = Some(route_id.to_string());
                retry_delay = Some(*retry_after);
                "retry_same"
            }
            ErrorAction::FatalError { .. } => "fatal",
        };

        attempts.push(ExecutionAttempt {
            pipeline_id: health_pid.to_string(),
            attempt_number,
            started_at,
            ended_at: Utc::now(),
            duration_ms: attempt_started.elapsed().as_millis() as u64,
            success: false,
            error_message: Some(err.to_string()),
            action_taken: Some(action_label.to_string()),
            skipped: matches!(action, ErrorAction::SkipPipeline { .. }),
        });

        retry_delay
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        attempts: Vec<ExecutionAttempt>,
        started: Instant,
        final_status: FinalStatus,
        succeeded_pipeline_id: Option<String>,
        response: Option<WireResponse>,
        error: Option<EngineError>,
    ) -> ExecutionResult {
        ExecutionResult {
            success: final_status == FinalStatus::Success,
            succeeded_pipeline_id,
            attempts,
            total_time_ms: started.elapsed().as_millis() as u64,
            final_status,
            response,
            error,
        }
    }
}
