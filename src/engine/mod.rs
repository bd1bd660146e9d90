//! Orchestration Engine - one user turn from question to answer
//!
//! This module provides:
//! - The conversation loop (`Orchestrator`)
//! - The early-stop evaluator and the background summary keeper
//! - `Engine::submit`, a lazy stream of presenter updates for a front end

pub mod early_stop;
pub mod orchestrator;
pub mod presenter;
pub mod summary;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use log::info;
use tokio::sync::mpsc;

use crate::config::{Config, ModelConfig};
use crate::error::{EngineError, Result};
use crate::llm::{LlmClient, Message, OpenAiClient};
use crate::prompt;
use crate::tools::{KubeToolRouter, ToolRouter, validate_definitions};

pub use early_stop::{EarlyStopEvaluation, EarlyStopEvaluator, EvaluatorError, NOT_EVALUATED};
pub use orchestrator::{LoopEvent, Orchestrator, OrchestratorConfig, TurnOutcome};
pub use presenter::{Presenter, PresenterUpdate};
pub use summary::{ConversationSummary, SummaryKeeper, SummaryTask};

/// Entry point for front ends. Holds no per-conversation state.
#[derive(Clone)]
pub struct Engine {
    orchestrator: Arc<Orchestrator>,
}

impl Engine {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Build the engine with one chat-completions client per model role.
    ///
    /// Fails if a role's API key is missing, the tool schemas do not match
    /// the adapters, or a numeric setting is out of range.
    pub fn from_config(config: &Config) -> Result<Self> {
        let router = KubeToolRouter::new().with_default_timeout(
            Duration::try_from_secs_f64(config.tools.default_timeout_secs).map_err(|_| {
                EngineError::Config(format!(
                    "tools.default_timeout_secs must be a non-negative number, got {}",
                    config.tools.default_timeout_secs
                ))
            })?,
        );
        validate_definitions(&router.definitions())?;

        if config.engine.max_steps == 0 {
            return Err(EngineError::Config("engine.max_steps must be at least 1".to_string()));
        }

        let primary = client_for(&config.models.primary)?;
        let evaluator = EarlyStopEvaluator::new(client_for(&config.models.evaluator)?, &config.context)
            .with_attempts(config.engine.early_stop_attempts)
            .with_max_tokens(config.models.evaluator.max_tokens);
        let summarizer = SummaryKeeper::new(client_for(&config.models.summarizer)?)
            .with_max_tokens(config.models.summarizer.max_tokens);

        info!(
            "Engine ready: primary={} evaluator={} summarizer={} context={}",
            config.models.primary.model, config.models.evaluator.model, config.models.summarizer.model, config.context
        );

        let orchestrator = Orchestrator::new(
            primary,
            Arc::new(router),
            evaluator,
            summarizer,
            prompt::helper_instructions(&config.context),
        )
        .with_config(OrchestratorConfig {
            max_steps: config.engine.max_steps,
            max_tokens: config.models.primary.max_tokens,
        });

        Ok(Self::new(orchestrator))
    }

    /// Run one turn as a stream of updates.
    ///
    /// Nothing runs until the stream is polled. The last item is always the
    /// final update (`answer` set), after which the stream ends. Dropping the
    /// stream early cancels the turn.
    pub fn submit(
        &self,
        message: impl Into<String>,
        history: Vec<Message>,
        running_summary: impl Into<String>,
    ) -> BoxStream<'static, PresenterUpdate> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let message = message.into();
        let running_summary = running_summary.into();
        let presenter = Presenter::new(running_summary.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        // Drives the turn; yields nothing itself. `tx` drops when the turn ends.
        let driver = stream::once(async move {
            let _ = orchestrator
                .run_turn_with_events(&message, &history, &running_summary, &tx)
                .await;
        })
        .filter_map(|()| futures::future::ready(None::<PresenterUpdate>));

        let updates = stream::unfold((rx, presenter), |(mut rx, mut presenter)| async move {
            let event = rx.recv().await?;
            let update = presenter.apply(event);
            Some((update, (rx, presenter)))
        });

        stream::select(driver, updates).boxed()
    }
}

fn client_for(model: &ModelConfig) -> Result<Arc<dyn LlmClient>> {
    Ok(Arc::new(OpenAiClient::new(model.to_openai_config())?))
}
