//! Summary keeper: a one-sentence rolling summary produced in the background

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, Role};
use crate::prompt;

/// Running summary of the conversation. Each new one replaces the last.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub summary: String,
}

impl ConversationSummary {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

pub struct SummaryKeeper {
    client: Arc<dyn LlmClient>,
    max_tokens: Option<u32>,
}

impl SummaryKeeper {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Condense `previous` and `snapshot` into one sentence
    pub async fn summarize(&self, previous: &str, snapshot: &[Message]) -> Result<ConversationSummary, LlmError> {
        let mut request = CompletionRequest::new(prompt::SUMMARY_INSTRUCTIONS)
            .with_user_message(prompt::summary_request(previous, &transcript(snapshot)));
        request.max_tokens = self.max_tokens;

        let response = self.client.complete(request).await?;
        let sentence = one_sentence(&response.content);
        if sentence.is_empty() {
            return Err(LlmError::InvalidResponse("summarizer returned no text".to_string()));
        }
        Ok(ConversationSummary::new(sentence))
    }

    /// Start summarizing in the background. `snapshot` is owned by the task,
    /// so later messages of the turn are never seen.
    pub fn spawn(self: &Arc<Self>, previous: String, snapshot: Vec<Message>) -> SummaryTask {
        let keeper = Arc::clone(self);
        let prior = previous.clone();
        let handle = tokio::spawn(async move { keeper.summarize(&prior, &snapshot).await });
        SummaryTask {
            handle: Some(handle),
            previous,
        }
    }
}

/// Handle to a background summarization. Aborted if dropped unconsumed.
pub struct SummaryTask {
    handle: Option<JoinHandle<Result<ConversationSummary, LlmError>>>,
    previous: String,
}

impl SummaryTask {
    /// Wait for the new summary; on failure the previous one is kept
    pub async fn finish(mut self) -> ConversationSummary {
        let Some(handle) = self.handle.take() else {
            return ConversationSummary::new(self.previous.clone());
        };

        match handle.await {
            Ok(Ok(summary)) => {
                debug!("Summary updated: {}", summary.summary);
                summary
            }
            Ok(Err(e)) => {
                warn!("Summarizer failed, keeping previous summary: {}", e);
                ConversationSummary::new(self.previous.clone())
            }
            Err(e) => {
                warn!("Summary task did not complete: {}", e);
                ConversationSummary::new(self.previous.clone())
            }
        }
    }

    /// Stop the task without waiting for it
    pub fn abandon(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SummaryTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Render messages as plain `role: content` lines for the summarizer
fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            if m.tool_calls.is_empty() {
                format!("{}: {}", m.role.as_str(), m.content)
            } else {
                let names: Vec<&str> = m.tool_calls.iter().map(|c| c.name.as_str()).collect();
                format!("{}: [called {}] {}", m.role.as_str(), names.join(", "), m.content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse whitespace and keep only the first sentence
pub fn one_sentence(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|(_, next)| *next == ' ') {
            return collapsed[..idx + c.len_utf8()].to_string();
        }
    }
    collapsed
}
