//! Early-stop evaluator
//!
//! A second, smaller model predicts whether the raw output of the first step's
//! single tool call will answer the question on its own. It sees the call,
//! never its result. The evaluator cannot abort a turn: every failure
//! degrades to the default non-stopping evaluation.

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{CompletionRequest, LlmClient, LlmError, ToolCall, parse_structured};
use crate::prompt;

/// Reasoning carried by an evaluation that never ran
pub const NOT_EVALUATED: &str = "By default";

/// Default number of model calls per evaluation
pub const DEFAULT_ATTEMPTS: u32 = 2;

/// Errors from one evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed evaluator output: {0}")]
    MalformedOutput(String),
}

/// The evaluator's verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyStopEvaluation {
    pub should_stop: bool,
    pub reasoning: String,
}

impl EarlyStopEvaluation {
    /// Value used when no evaluation ran
    pub fn not_evaluated() -> Self {
        Self {
            should_stop: false,
            reasoning: NOT_EVALUATED.to_string(),
        }
    }

    /// Human-readable status line
    pub fn status_text(&self) -> String {
        format!("Early stopping: {}. Reason: {}", self.should_stop, self.reasoning)
    }
}

impl Default for EarlyStopEvaluation {
    fn default() -> Self {
        Self::not_evaluated()
    }
}

/// Early-stop evaluator backed by its own model client.
pub struct EarlyStopEvaluator {
    client: Arc<dyn LlmClient>,
    instructions: String,
    attempts: u32,
    max_tokens: Option<u32>,
}

impl EarlyStopEvaluator {
    pub fn new(client: Arc<dyn LlmClient>, context: &str) -> Self {
        Self {
            client,
            instructions: prompt::early_stop_instructions(context),
            attempts: DEFAULT_ATTEMPTS,
            max_tokens: None,
        }
    }

    /// Model calls allowed per evaluation when the output is malformed (min 1)
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Ask the model whether `call`'s raw output will answer `question`.
    ///
    /// Malformed output is retried up to the attempt limit; a failed model
    /// call is returned immediately.
    pub async fn evaluate(
        &self,
        summary: &str,
        question: &str,
        call: &ToolCall,
    ) -> Result<EarlyStopEvaluation, EvaluatorError> {
        let mut request = CompletionRequest::new(self.instructions.clone())
            .with_user_message(prompt::early_stop_request(summary, question, call))
            .with_json_response();
        request.max_tokens = self.max_tokens;

        let mut last_error = None;
        for attempt in 1..=self.attempts {
            let response = self.client.complete(request.clone()).await?;
            match parse_structured::<EarlyStopEvaluation>(&response.content) {
                Ok(evaluation) => {
                    debug!("Early-stop evaluation on attempt {}: {:?}", attempt, evaluation);
                    return Ok(evaluation);
                }
                Err(e) => {
                    debug!("Early-stop attempt {} returned malformed output: {}", attempt, e);
                    last_error = Some(e);
                }
            }
        }

        Err(EvaluatorError::MalformedOutput(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    /// Like [`evaluate`](Self::evaluate), but any failure yields the default.
    pub async fn evaluate_or_default(&self, summary: &str, question: &str, call: &ToolCall) -> EarlyStopEvaluation {
        match self.evaluate(summary, question, call).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!("Early-stop evaluation failed, continuing without it: {}", e);
                EarlyStopEvaluation::not_evaluated()
            }
        }
    }
}
