//! Converts loop events into UI updates

use serde::Serialize;

use super::orchestrator::LoopEvent;

/// One UI update. `answer == None` means the turn is still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenterUpdate {
    pub status: String,
    pub early_stop: String,
    pub answer: Option<String>,
    pub summary: Option<String>,
    /// Set on the final update of an aborted turn; `answer` holds the error
    pub failed: bool,
}

impl PresenterUpdate {
    pub fn is_final(&self) -> bool {
        self.answer.is_some()
    }
}

/// Folds [`LoopEvent`]s into [`PresenterUpdate`]s. Every update is complete
/// on its own, so a consumer may render only the latest one.
#[derive(Debug, Clone)]
pub struct Presenter {
    previous_summary: String,
    early_stop: String,
}

impl Presenter {
    /// `previous_summary` is reported if the turn aborts
    pub fn new(previous_summary: impl Into<String>) -> Self {
        Self {
            previous_summary: previous_summary.into(),
            early_stop: String::new(),
        }
    }

    pub fn apply(&mut self, event: LoopEvent) -> PresenterUpdate {
        match event {
            LoopEvent::ToolsDispatched { step, tools } => PresenterUpdate {
                status: format!("Step {}: running {}", step, tools.join(", ")),
                early_stop: self.early_stop.clone(),
                answer: None,
                summary: None,
                failed: false,
            },
            LoopEvent::ToolsJoined {
                step,
                completed,
                failed,
                evaluation,
            } => {
                self.early_stop = evaluation.status_text();
                PresenterUpdate {
                    status: format!("Step {}: {} tool call(s) finished, {} failed", step, completed + failed, failed),
                    early_stop: self.early_stop.clone(),
                    answer: None,
                    summary: None,
                    failed: false,
                }
            }
            LoopEvent::Finished(outcome) => PresenterUpdate {
                status: if outcome.early_stopped {
                    format!("Done after {} step(s), answered from tool output", outcome.steps)
                } else {
                    format!("Done after {} step(s)", outcome.steps)
                },
                early_stop: self.early_stop.clone(),
                answer: Some(outcome.answer),
                summary: Some(outcome.summary.summary),
                failed: false,
            },
            LoopEvent::Aborted { error } => PresenterUpdate {
                status: "Failed".to_string(),
                early_stop: self.early_stop.clone(),
                answer: Some(error),
                summary: Some(self.previous_summary.clone()),
                failed: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::early_stop::EarlyStopEvaluation;
    use crate::engine::orchestrator::TurnOutcome;
    use crate::engine::summary::ConversationSummary;

    #[test]
    fn test_dispatch_is_status_only() {
        let mut presenter = Presenter::new("");
        let update = presenter.apply(LoopEvent::ToolsDispatched {
            step: 1,
            tools: vec!["run_kubectl".into()],
        });
        assert_eq!(update.status, "Step 1: running run_kubectl");
        assert!(update.early_stop.is_empty());
        assert!(!update.is_final());
        assert!(update.summary.is_none());
    }

    #[test]
    fn test_join_carries_early_stop_text_forward() {
        let mut presenter = Presenter::new("");
        let joined = presenter.apply(LoopEvent::ToolsJoined {
            step: 1,
            completed: 1,
            failed: 0,
            evaluation: EarlyStopEvaluation {
                should_stop: false,
                reasoning: "needs analysis".into(),
            },
        });
        assert!(joined.early_stop.contains("needs analysis"));

        let done = presenter.apply(LoopEvent::Finished(TurnOutcome {
            answer: "All good".into(),
            early_stopped: false,
            steps: 2,
            usage: Default::default(),
            summary: ConversationSummary::new("The user checked pods."),
        }));
        assert_eq!(done.answer.as_deref(), Some("All good"));
        assert_eq!(done.summary.as_deref(), Some("The user checked pods."));
        assert!(done.early_stop.contains("needs analysis"));
    }

    #[test]
    fn test_later_dispatch_keeps_early_stop_text() {
        let mut presenter = Presenter::new("");
        presenter.apply(LoopEvent::ToolsJoined {
            step: 1,
            completed: 1,
            failed: 0,
            evaluation: EarlyStopEvaluation {
                should_stop: false,
                reasoning: "needs analysis".into(),
            },
        });

        let update = presenter.apply(LoopEvent::ToolsDispatched {
            step: 2,
            tools: vec!["run_helm".into()],
        });
        assert_eq!(update.status, "Step 2: running run_helm");
        assert!(update.early_stop.contains("needs analysis"));
    }

    #[test]
    fn test_abort_keeps_previous_summary() {
        let mut presenter = Presenter::new("Earlier summary.");
        let update = presenter.apply(LoopEvent::Aborted {
            error: "LLM error: boom".into(),
        });
        assert!(update.is_final());
        assert!(update.failed);
        assert_eq!(update.answer.as_deref(), Some("LLM error: boom"));
        assert_eq!(update.summary.as_deref(), Some("Earlier summary."));
    }
}
