//! Conversation loop - drives one user turn to a final answer.
//!
//! Each step:
//! 1. Calls the primary model with the full message list and tool schemas
//! 2. Without tool calls, the model's text is the answer
//! 3. Otherwise runs every call concurrently, together with the early-stop
//!    evaluation on the first step when exactly one tool was requested
//! 4. On an early stop returns the tool's raw stdout, else appends the
//!    results and loops
//!
//! The summary keeper runs alongside the whole turn on a snapshot taken at
//! entry; it is awaited when the turn ends normally and aborted on failure.

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{EngineError, Result};
use crate::llm::{CompletionRequest, LlmClient, Message, ToolCall, Usage};
use crate::tools::{ToolOutcome, ToolRouter};

use super::early_stop::{EarlyStopEvaluation, EarlyStopEvaluator};
use super::summary::{ConversationSummary, SummaryKeeper};

/// Default limit on primary model calls per turn
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Progress reported while a turn runs
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// Tool executions for `step` were launched
    ToolsDispatched { step: u32, tools: Vec<String> },
    /// All executions and the evaluation for `step` finished
    ToolsJoined {
        step: u32,
        completed: usize,
        failed: usize,
        evaluation: EarlyStopEvaluation,
    },
    Finished(TurnOutcome),
    /// The turn failed; `error` is safe to show
    Aborted { error: String },
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub answer: String,
    /// The answer is the raw output of the first tool call
    pub early_stopped: bool,
    /// Primary model calls made
    pub steps: u32,
    /// Tokens spent on primary model calls
    pub usage: Usage,
    pub summary: ConversationSummary,
}

/// Configuration for the Orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_steps: u32,
    /// Max tokens for primary model responses
    pub max_tokens: Option<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_tokens: None,
        }
    }
}

pub struct Orchestrator {
    primary: Arc<dyn LlmClient>,
    router: Arc<dyn ToolRouter>,
    evaluator: Arc<EarlyStopEvaluator>,
    summarizer: Arc<SummaryKeeper>,
    instructions: String,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        primary: Arc<dyn LlmClient>,
        router: Arc<dyn ToolRouter>,
        evaluator: EarlyStopEvaluator,
        summarizer: SummaryKeeper,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            router,
            evaluator: Arc::new(evaluator),
            summarizer: Arc::new(summarizer),
            instructions: instructions.into(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one turn without progress reporting
    pub async fn run_turn(&self, message: &str, history: &[Message], running_summary: &str) -> Result<TurnOutcome> {
        let (events, _) = tokio::sync::mpsc::unbounded_channel();
        self.run_turn_with_events(message, history, running_summary, &events).await
    }

    /// Run one turn, reporting progress and the final outcome on `events`.
    /// A closed receiver is ignored.
    pub async fn run_turn_with_events(
        &self,
        message: &str,
        history: &[Message],
        running_summary: &str,
        events: &UnboundedSender<LoopEvent>,
    ) -> Result<TurnOutcome> {
        info!("Turn started ({} prior messages)", history.len());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(&self.instructions));
        messages.extend_from_slice(history);
        messages.push(Message::user(message));

        let summary_task = self.summarizer.spawn(running_summary.to_string(), messages.clone());

        match self.drive(messages, message, running_summary, events).await {
            Ok(mut outcome) => {
                outcome.summary = summary_task.finish().await;
                info!(
                    "Turn finished after {} step(s), early_stopped={}, tokens in={} out={}",
                    outcome.steps, outcome.early_stopped, outcome.usage.input_tokens, outcome.usage.output_tokens
                );
                let _ = events.send(LoopEvent::Finished(outcome.clone()));
                Ok(outcome)
            }
            Err(e) => {
                summary_task.abandon();
                warn!("Turn aborted: {}", e);
                let _ = events.send(LoopEvent::Aborted { error: e.user_message() });
                Err(e)
            }
        }
    }

    /// The step loop. The returned outcome has an empty summary.
    async fn drive(
        &self,
        mut messages: Vec<Message>,
        question: &str,
        running_summary: &str,
        events: &UnboundedSender<LoopEvent>,
    ) -> Result<TurnOutcome> {
        let tools = self.router.definitions();
        let mut usage = Usage::default();
        let mut step = 0;

        loop {
            step += 1;
            if step > self.config.max_steps {
                return Err(EngineError::LoopExceeded {
                    max_steps: self.config.max_steps,
                });
            }

            let mut request = CompletionRequest::default()
                .with_messages(messages.clone())
                .with_tools(tools.clone());
            request.max_tokens = self.config.max_tokens;

            debug!("Step {}: calling primary model with {} messages", step, messages.len());
            let response = self.primary.complete(request).await?;
            usage.add(&response.usage);

            if !response.needs_tool_execution() {
                return Ok(TurnOutcome {
                    answer: response.content,
                    early_stopped: false,
                    steps: step,
                    usage,
                    summary: ConversationSummary::default(),
                });
            }

            let calls = response.tool_calls;
            if let Some(unknown) = calls.iter().find(|c| !self.router.has_tool(&c.name)) {
                return Err(EngineError::UnknownTool(unknown.name.clone()));
            }

            let _ = events.send(LoopEvent::ToolsDispatched {
                step,
                tools: calls.iter().map(|c| c.name.clone()).collect(),
            });

            let (outcomes, evaluation) = tokio::join!(
                join_all(calls.iter().map(|call| self.router.execute(call))),
                self.evaluate(step, &calls, question, running_summary)
            );

            let failed = outcomes.iter().filter(|o| matches!(o, ToolOutcome::Failed(_))).count();
            let _ = events.send(LoopEvent::ToolsJoined {
                step,
                completed: outcomes.len() - failed,
                failed,
                evaluation: evaluation.clone(),
            });

            if evaluation.should_stop {
                match outcomes.first().and_then(ToolOutcome::execution_result) {
                    Some(result) => {
                        debug!("Early stop at step {}: {}", step, evaluation.reasoning);
                        return Ok(TurnOutcome {
                            answer: format!("```\n{}\n```", result.stdout),
                            early_stopped: true,
                            steps: step,
                            usage,
                            summary: ConversationSummary::default(),
                        });
                    }
                    None => warn!("Early stop requested but the tool call failed, continuing"),
                }
            }

            messages.push(Message::assistant_tool_calls(response.content, calls.clone()));
            for (call, outcome) in calls.iter().zip(&outcomes) {
                messages.push(Message::tool_result(&call.id, outcome.to_message_content()));
            }
        }
    }

    /// Evaluation for this step; only the first step's sole call is evaluated
    async fn evaluate(
        &self,
        step: u32,
        calls: &[ToolCall],
        question: &str,
        running_summary: &str,
    ) -> EarlyStopEvaluation {
        match calls {
            [call] if step == 1 => self.evaluator.evaluate_or_default(running_summary, question, call).await,
            _ => EarlyStopEvaluation::not_evaluated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecutionResult;
    use crate::llm::{CompletionResponse, MockLlmClient, Role, ToolDefinition};
    use async_trait::async_trait;

    /// Router that answers every call with fixed stdout
    struct EchoRouter;

    #[async_trait]
    impl ToolRouter for EchoRouter {
        fn definitions(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::new("run_kubectl", "kubectl", serde_json::json!({"type": "object"}))]
        }

        fn has_tool(&self, name: &str) -> bool {
            name == "run_kubectl"
        }

        async fn execute(&self, call: &ToolCall) -> ToolOutcome {
            ToolOutcome::Completed(ExecutionResult::new(
                vec!["kubectl".into()],
                0,
                format!("output of {}", call.id),
                String::new(),
            ))
        }
    }

    fn kubectl_call(id: &str) -> ToolCall {
        ToolCall::new(id, "run_kubectl", r#"{"args": "get pods"}"#)
    }

    fn orchestrator(
        primary: Arc<MockLlmClient>,
        evaluator: Arc<MockLlmClient>,
        summarizer: Arc<MockLlmClient>,
    ) -> Orchestrator {
        Orchestrator::new(
            primary,
            Arc::new(EchoRouter),
            EarlyStopEvaluator::new(evaluator, "dev"),
            SummaryKeeper::new(summarizer),
            "instructions",
        )
    }

    fn summary_mock() -> Arc<MockLlmClient> {
        Arc::new(MockLlmClient::new(vec![CompletionResponse::text("The user asked about pods.")]))
    }

    #[tokio::test]
    async fn test_answer_without_tools() {
        let primary = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("Hello!")]));
        let evaluator = Arc::new(MockLlmClient::new(vec![]));
        let orch = orchestrator(primary.clone(), evaluator.clone(), summary_mock());

        let outcome = orch.run_turn("hi", &[], "").await.unwrap();
        assert_eq!(outcome.answer, "Hello!");
        assert_eq!(outcome.steps, 1);
        assert!(!outcome.early_stopped);
        assert_eq!(outcome.summary.summary, "The user asked about pods.");
        assert_eq!(evaluator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_usage_summed_over_primary_calls() {
        let primary = Arc::new(MockLlmClient::new(vec![
            CompletionResponse {
                usage: Usage::new(100, 20),
                ..CompletionResponse::with_tool_calls(vec![kubectl_call("a"), kubectl_call("b")])
            },
            CompletionResponse {
                usage: Usage::new(150, 30),
                ..CompletionResponse::text("done")
            },
        ]));
        let orch = orchestrator(primary, Arc::new(MockLlmClient::new(vec![])), summary_mock());

        let outcome = orch.run_turn("compare", &[], "").await.unwrap();
        assert_eq!(outcome.usage, Usage::new(250, 50));
        assert_eq!(outcome.usage.total(), 300);
    }

    #[tokio::test]
    async fn test_seed_messages_order() {
        let primary = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("ok")]));
        let orch = orchestrator(primary.clone(), Arc::new(MockLlmClient::new(vec![])), summary_mock());
        let history = vec![Message::user("earlier"), Message::assistant("earlier answer")];

        orch.run_turn("now", &history, "").await.unwrap();

        let sent = &primary.requests()[0];
        assert_eq!(sent.messages.len(), 4);
        assert_eq!(sent.messages[0].role, Role::System);
        assert_eq!(sent.messages[1].content, "earlier");
        assert_eq!(sent.messages[3].content, "now");
        assert_eq!(sent.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_early_stop_returns_fenced_stdout() {
        let primary = Arc::new(MockLlmClient::new(vec![CompletionResponse::with_tool_calls(vec![
            kubectl_call("c1"),
        ])]));
        let evaluator = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(
            r#"{"should_stop": true, "reasoning": "raw list"}"#,
        )]));
        let orch = orchestrator(primary.clone(), evaluator.clone(), summary_mock());

        let outcome = orch.run_turn("list pods", &[], "").await.unwrap();
        assert_eq!(outcome.answer, "```\noutput of c1\n```");
        assert!(outcome.early_stopped);
        assert_eq!(primary.call_count(), 1);
        assert_eq!(evaluator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_results_appended_in_request_order() {
        let primary = Arc::new(MockLlmClient::new(vec![
            CompletionResponse::with_tool_calls(vec![kubectl_call("a"), kubectl_call("b")]),
            CompletionResponse::text("done"),
        ]));
        let evaluator = Arc::new(MockLlmClient::new(vec![]));
        let orch = orchestrator(primary.clone(), evaluator.clone(), summary_mock());

        let outcome = orch.run_turn("compare", &[], "").await.unwrap();
        assert_eq!(outcome.answer, "done");
        assert_eq!(outcome.steps, 2);
        // Two calls on step 1: no evaluation
        assert_eq!(evaluator.call_count(), 0);

        let second = &primary.requests()[1];
        let n = second.messages.len();
        assert_eq!(second.messages[n - 3].tool_calls.len(), 2);
        assert_eq!(second.messages[n - 2].tool_call_id.as_deref(), Some("a"));
        assert!(second.messages[n - 2].content.contains("output of a"));
        assert_eq!(second.messages[n - 1].tool_call_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts_turn() {
        let primary = Arc::new(MockLlmClient::new(vec![CompletionResponse::with_tool_calls(vec![
            kubectl_call("ok"),
            ToolCall::new("bad", "run_bash", "{}"),
        ])]));
        let orch = orchestrator(primary, Arc::new(MockLlmClient::new(vec![])), summary_mock());

        let err = orch.run_turn("x", &[], "").await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownTool(name) if name == "run_bash"));
    }

    #[tokio::test]
    async fn test_loop_exceeded() {
        let responses = (0..3)
            .map(|i| CompletionResponse::with_tool_calls(vec![kubectl_call(&format!("c{i}"))]))
            .collect();
        let primary = Arc::new(MockLlmClient::new(responses));
        let evaluator = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(
            r#"{"should_stop": false, "reasoning": "needs analysis"}"#,
        )]));
        let orch = orchestrator(primary.clone(), evaluator, summary_mock()).with_config(OrchestratorConfig {
            max_steps: 3,
            max_tokens: None,
        });

        let err = orch.run_turn("loop", &[], "").await.unwrap_err();
        assert!(matches!(err, EngineError::LoopExceeded { max_steps: 3 }));
        assert_eq!(primary.call_count(), 3);
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let primary = Arc::new(MockLlmClient::new(vec![
            CompletionResponse::with_tool_calls(vec![kubectl_call("c1")]),
            CompletionResponse::text("final"),
        ]));
        let evaluator = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(
            r#"{"should_stop": false, "reasoning": "needs analysis"}"#,
        )]));
        let orch = orchestrator(primary, evaluator, summary_mock());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        orch.run_turn_with_events("why", &[], "", &tx).await.unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LoopEvent::ToolsDispatched { step: 1, .. }));
        assert!(matches!(&events[1], LoopEvent::ToolsJoined { evaluation, .. } if !evaluation.should_stop));
        assert!(matches!(&events[2], LoopEvent::Finished(outcome) if outcome.answer == "final"));
    }

    #[tokio::test]
    async fn test_primary_failure_reports_aborted() {
        let primary = Arc::new(MockLlmClient::new(vec![]).with_error("Authorization: Bearer sk-secret-value-1"));
        let orch = orchestrator(primary, Arc::new(MockLlmClient::new(vec![])), summary_mock());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        assert!(orch.run_turn_with_events("x", &[], "", &tx).await.is_err());
        match rx.recv().await {
            Some(LoopEvent::Aborted { error }) => assert!(!error.contains("sk-secret-value-1")),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
