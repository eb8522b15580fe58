//! The tool-use loop driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use toolwright_config::AppConfig;
use toolwright_core::error::{GatewayError, ToolError};
use toolwright_core::event::{DomainEvent, EventBus};
use toolwright_core::gateway::{
    GatewayReply, GatewayRequest, GatewayResponse, ModelGateway, ToolSelectionPolicy, Usage,
};
use toolwright_core::message::{Conversation, Turn};
use toolwright_core::tool::{ToolInvocationRequest, ToolRegistry, ToolResult, ToolSchema};
use toolwright_core::LoopState;
use tracing::{debug, info, warn};

use crate::error::LoopError;
use crate::reply::{PassThrough, ReplyExtractor};

/// Per-loop knobs, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Maximum gateway calls per user turn
    pub max_iterations: u32,
    pub gateway_timeout: Duration,
    /// Applied to idempotent handlers only
    pub tool_timeout: Duration,
    pub parallel_tool_calls: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20240620".into(),
            system: None,
            max_tokens: 1000,
            temperature: None,
            max_iterations: 10,
            gateway_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
            parallel_tool_calls: true,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            system: Some(config.system_prompt().to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_iterations: config.agent.max_iterations,
            gateway_timeout: Duration::from_secs(config.agent.gateway_timeout_secs),
            tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
            parallel_tool_calls: config.agent.parallel_tool_calls,
        }
    }
}

/// What a completed user turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The final text after reply extraction
    pub reply: String,
    /// The final text exactly as the model produced it
    pub raw_text: String,
    /// Token usage summed over every gateway call of the turn
    pub usage: Usage,
    /// Number of gateway calls made
    pub iterations: u32,
    /// Number of tool requests dispatched
    pub tool_calls: usize,
}

/// Schema-shaped JSON obtained by forcing a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub tool_name: String,
    pub value: serde_json::Value,
    pub usage: Usage,
    pub attempts: u32,
}

/// Drives a conversation through model calls and tool dispatch.
///
/// One `ToolLoop` can serve many conversations; all per-conversation state
/// lives in the [`Conversation`] passed to each call.
pub struct ToolLoop {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    settings: LoopSettings,
    extractor: Box<dyn ReplyExtractor>,
    event_bus: Arc<EventBus>,
    cancellation: Option<CancellationToken>,
}

impl ToolLoop {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            gateway,
            tools,
            settings,
            extractor: Box::new(PassThrough),
            event_bus: Arc::new(EventBus::default()),
            cancellation: None,
        }
    }

    /// Set how final text is post-processed.
    pub fn with_extractor(mut self, extractor: Box<dyn ReplyExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Publish progress on a shared event bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Abort turns when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one user turn to completion.
    ///
    /// `policy` constrains the first gateway call; follow-up calls after tool
    /// results are automatic. On failure the conversation keeps every turn
    /// appended so far, but never an unanswered tool request.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
        policy: ToolSelectionPolicy,
    ) -> Result<TurnOutcome, LoopError> {
        let conversation_id = conversation.id().to_string();
        info!(
            conversation_id = %conversation_id,
            turns = conversation.len(),
            policy = %policy,
            "Processing user turn"
        );
        let result = self
            .drive_turn(conversation, &conversation_id, user_message, policy)
            .await;
        self.finish(&conversation_id, result)
    }

    async fn drive_turn(
        &self,
        conversation: &mut Conversation,
        conversation_id: &str,
        user_message: &str,
        mut policy: ToolSelectionPolicy,
    ) -> Result<TurnOutcome, LoopError> {
        conversation.append(Turn::user(user_message))?;

        let schemas = self.tools.schemas();
        let mut usage = Usage::default();
        let mut tool_calls = 0;

        for iteration in 1..=self.settings.max_iterations {
            debug!(conversation_id, iteration, "Agent loop iteration");

            let reply = self
                .call_gateway(conversation, conversation_id, schemas.clone(), &policy)
                .await?;
            usage += reply.usage.unwrap_or_default();

            match reply.response {
                GatewayResponse::FinalText(text) => {
                    conversation.append(Turn::assistant(text.clone()))?;
                    let reply_text = self.extractor.extract(&text);
                    info!(
                        conversation_id,
                        iterations = iteration,
                        tool_calls,
                        tokens = usage.total(),
                        "Turn answered"
                    );
                    return Ok(TurnOutcome {
                        reply: reply_text,
                        raw_text: text,
                        usage,
                        iterations: iteration,
                        tool_calls,
                    });
                }
                GatewayResponse::ToolRequests { preamble, requests } => {
                    self.check_cancelled()?;
                    if requests.is_empty() {
                        return Err(LoopError::ProtocolViolation(
                            "tool request turn carried no requests".into(),
                        ));
                    }
                    if let Some(unknown) = requests.iter().find(|r| !self.tools.contains(&r.tool_name)) {
                        return Err(LoopError::UnknownTool(unknown.tool_name.clone()));
                    }

                    conversation.append(Turn::tool_requests(preamble, requests.clone()))?;
                    self.set_state(conversation_id, LoopState::ExecutingTools);

                    let results = self.execute_tools(conversation_id, &requests).await?;
                    tool_calls += results.len();
                    for result in results {
                        conversation.append(Turn::tool_result(result))?;
                    }

                    policy = ToolSelectionPolicy::Automatic;
                }
            }
        }

        warn!(
            conversation_id,
            max_iterations = self.settings.max_iterations,
            "Max tool iterations reached"
        );
        Err(LoopError::ToolLoopExceeded {
            max_iterations: self.settings.max_iterations,
        })
    }

    /// Force the model to call `tool_name` on `input` and return its
    /// arguments once they satisfy the tool's schema.
    ///
    /// Arguments that fail validation are sent back as error results and the
    /// model tries again, up to the iteration cap. The handler never runs.
    pub async fn extract_structured(
        &self,
        input: &str,
        tool_name: &str,
    ) -> Result<Extraction, LoopError> {
        let schema = self
            .tools
            .schema(tool_name)
            .cloned()
            .ok_or_else(|| LoopError::UnknownTool(tool_name.to_string()))?;

        let mut conversation = Conversation::new();
        let conversation_id = conversation.id().to_string();
        info!(conversation_id = %conversation_id, tool = tool_name, "Structured extraction");

        let result = self
            .drive_extraction(&mut conversation, &conversation_id, input, schema)
            .await;
        self.finish(&conversation_id, result)
    }

    async fn drive_extraction(
        &self,
        conversation: &mut Conversation,
        conversation_id: &str,
        input: &str,
        schema: ToolSchema,
    ) -> Result<Extraction, LoopError> {
        conversation.append(Turn::user(input))?;

        let tool_name = schema.name.clone();
        let policy = ToolSelectionPolicy::MandatoryNamed(tool_name.clone());
        let mut usage = Usage::default();

        for attempt in 1..=self.settings.max_iterations {
            let reply = self
                .call_gateway(conversation, conversation_id, vec![schema.clone()], &policy)
                .await?;
            usage += reply.usage.unwrap_or_default();

            let GatewayResponse::ToolRequests { preamble, requests } = reply.response else {
                return Err(GatewayError::PolicyViolation(format!(
                    "policy requires tool '{tool_name}' but the model returned text"
                ))
                .into());
            };

            let verdicts: Vec<Result<(), ToolError>> = requests
                .iter()
                .map(|r| self.tools.validate_arguments(&tool_name, &r.arguments))
                .collect();

            if let Some(i) = verdicts.iter().position(Result::is_ok) {
                debug!(conversation_id, attempt, tool = %tool_name, "Extraction accepted");
                return Ok(Extraction {
                    tool_name,
                    value: requests[i].arguments.clone(),
                    usage,
                    attempts: attempt,
                });
            }

            self.check_cancelled()?;
            debug!(conversation_id, attempt, tool = %tool_name, "Extraction rejected, retrying");
            conversation.append(Turn::tool_requests(preamble, requests.clone()))?;
            for (request, verdict) in requests.iter().zip(verdicts) {
                let reason = verdict.err().map(|e| e.to_string()).unwrap_or_default();
                conversation.append(Turn::tool_result(ToolResult::error(
                    &request.id,
                    format!("Error: {reason}"),
                )))?;
            }
        }

        Err(LoopError::ToolLoopExceeded {
            max_iterations: self.settings.max_iterations,
        })
    }

    /// One gateway round trip: cancellation check, timeout, policy enforcement.
    async fn call_gateway(
        &self,
        conversation: &Conversation,
        conversation_id: &str,
        tools: Vec<ToolSchema>,
        policy: &ToolSelectionPolicy,
    ) -> Result<GatewayReply, LoopError> {
        self.check_cancelled()?;
        self.set_state(conversation_id, LoopState::ModelThinking);

        let request = GatewayRequest {
            model: self.settings.model.clone(),
            system: self.settings.system.clone(),
            turns: conversation.snapshot().to_vec(),
            tools,
            policy: policy.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let limit = self.settings.gateway_timeout;
        let call = tokio::time::timeout(limit, self.gateway.complete(request));
        let outcome = match &self.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(LoopError::Cancelled),
                outcome = call => outcome,
            },
            None => call.await,
        };
        let reply = outcome.map_err(|_| GatewayError::Timeout(limit))??;

        policy.enforce(&reply.response)?;

        if let Some(usage) = reply.usage {
            self.event_bus.publish(DomainEvent::ResponseGenerated {
                conversation_id: conversation_id.to_string(),
                model: reply.model.clone(),
                tokens_used: usage.total(),
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(reply)
    }

    /// Dispatch every request of one model turn; results come back in
    /// request order regardless of completion order.
    async fn execute_tools(
        &self,
        conversation_id: &str,
        requests: &[ToolInvocationRequest],
    ) -> Result<Vec<ToolResult>, LoopError> {
        for request in requests {
            self.event_bus.publish(DomainEvent::ToolRequested {
                conversation_id: conversation_id.to_string(),
                request_id: request.id.clone(),
                tool_name: request.tool_name.clone(),
                timestamp: chrono::Utc::now(),
            });
        }

        let outcomes = if self.settings.parallel_tool_calls {
            join_all(requests.iter().map(|r| self.dispatch_timed(r))).await
        } else {
            let mut outcomes = Vec::with_capacity(requests.len());
            for request in requests {
                outcomes.push(self.dispatch_timed(request).await);
            }
            outcomes
        };

        let mut results = Vec::with_capacity(outcomes.len());
        for (request, (outcome, elapsed)) in requests.iter().zip(outcomes) {
            let result = outcome.map_err(|e| match e {
                ToolError::UnknownTool(name) => LoopError::UnknownTool(name),
                other => LoopError::ProtocolViolation(other.to_string()),
            })?;

            debug!(
                conversation_id,
                tool = %request.tool_name,
                request_id = %request.id,
                is_error = result.is_error,
                duration_ms = elapsed.as_millis() as u64,
                "Tool executed"
            );
            self.event_bus.publish(DomainEvent::ToolExecuted {
                conversation_id: conversation_id.to_string(),
                tool_name: request.tool_name.clone(),
                is_error: result.is_error,
                duration_ms: elapsed.as_millis() as u64,
                timestamp: chrono::Utc::now(),
            });
            results.push(result);
        }

        Ok(results)
    }

    async fn dispatch_timed(
        &self,
        request: &ToolInvocationRequest,
    ) -> (Result<ToolResult, ToolError>, Duration) {
        let start = Instant::now();
        let outcome = self
            .tools
            .dispatch_with_timeout(request, Some(self.settings.tool_timeout))
            .await;
        (outcome, start.elapsed())
    }

    fn check_cancelled(&self) -> Result<(), LoopError> {
        if let Some(token) = &self.cancellation
            && token.is_cancelled()
        {
            return Err(LoopError::Cancelled);
        }
        Ok(())
    }

    fn set_state(&self, conversation_id: &str, state: LoopState) {
        debug!(conversation_id, state = %state, "Loop state changed");
        self.event_bus.publish(DomainEvent::LoopStateChanged {
            conversation_id: conversation_id.to_string(),
            state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn finish<T>(&self, conversation_id: &str, result: Result<T, LoopError>) -> Result<T, LoopError> {
        if let Err(e) = &result {
            warn!(conversation_id, error = %e, "Turn failed");
            self.event_bus.publish(DomainEvent::ErrorOccurred {
                conversation_id: conversation_id.to_string(),
                error_message: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        self.set_state(conversation_id, LoopState::AwaitingUserInput);
        result
    }
}
