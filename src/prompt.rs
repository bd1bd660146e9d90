//! Fixed instruction sets for the three model roles

use crate::llm::ToolCall;

/// Instructions for the primary helper model
pub fn helper_instructions(context: &str) -> String {
    format!(
        "You help the user answer questions about a namespace in the Kubernetes cluster.\n\
         \n\
         The context is `{context}`.\n\
         \n\
         You can use the following tools to get the information that can help you answer the questions:\n\
         - run_kubectl to run kubectl commands\n\
         - run_helm to run helm commands\n\
         \n\
         Only run commands that read cluster state. Never create, modify or delete resources."
    )
}

/// Instructions for the early-stop validator
pub fn early_stop_instructions(context: &str) -> String {
    format!(
        "You check if a tool call is enough to answer the user's question.\n\
         You get a summary of the conversation so far, the user's question and a tool call that was made.\n\
         The user's question is always related only to the context `{context}`.\n\
         You don't know the output of the tool.\n\
         Your job is to predict if the output of the tool will be enough to answer the user's question.\n\
         Set should_stop to true only if you think that the output of the tool alone will answer the question.\n\
         If you think that the output of the tool should be processed further, set should_stop to false.\n\
         If the user asks for explanations, summaries, or next steps, set should_stop to false.\n\
         \n\
         The possible tools are:\n\
         - run_kubectl to run kubectl commands\n\
         - run_helm to run helm commands\n\
         \n\
         Respond in JSON format:\n\
         {{\"should_stop\": <bool>, \"reasoning\": \"<explain your reasoning>\"}}\n\
         Respond with JSON only, without any additional text or markdown formatting."
    )
}

/// User message for the early-stop validator
pub fn early_stop_request(summary: &str, question: &str, call: &ToolCall) -> String {
    let call_json = serde_json::json!({
        "name": call.name,
        "arguments": call.arguments,
    });
    format!(
        "Conversation summary: {summary}\n\
         Here is the user's question: {question}\n\
         Here is the tool call that was made: {call_json}\n\
         Is this enough to answer the user's question?"
    )
}

/// Instructions for the summary keeper
pub const SUMMARY_INSTRUCTIONS: &str = "You maintain a running summary of a conversation between a user \
and a Kubernetes helper.\n\
You get the previous summary and the latest messages.\n\
Write a new summary of exactly one sentence that captures what the user is working on and what was found.\n\
If the previous summary is not relevant to the latest user message, discard it entirely instead of \
combining it with the new information.\n\
Respond with the sentence only.";

/// User message for the summary keeper
pub fn summary_request(previous: &str, transcript: &str) -> String {
    format!("Previous summary: {previous}\nLatest messages:\n{transcript}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_instructions_name_context_and_tools() {
        let text = helper_instructions("prod-eu");
        assert!(text.contains("`prod-eu`"));
        assert!(text.contains("run_kubectl"));
        assert!(text.contains("run_helm"));
    }

    #[test]
    fn test_early_stop_instructions_require_json() {
        let text = early_stop_instructions("prod-eu");
        assert!(text.contains("\"should_stop\""));
        assert!(text.contains("JSON only"));
        assert!(text.contains("explanations, summaries, or next steps"));
    }

    #[test]
    fn test_early_stop_request_includes_call() {
        let call = ToolCall::new("c1", "run_kubectl", r#"{"args":"get pods"}"#);
        let text = early_stop_request("none yet", "list pods", &call);
        assert!(text.contains("list pods"));
        assert!(text.contains("run_kubectl"));
        assert!(text.contains("get pods"));
        assert!(text.contains("none yet"));
    }
}
