//! Testing utilities for the creation driver.
//!
//! - `ScriptedLlm` for deterministic conversations without API calls
//! - Response builders for text and tool-use replies

use crate::llm::LlmClient;
use async_trait::async_trait;
use claude::{ContentBlock, Request, Response, StopReason, Usage};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Model name reported by [`ScriptedLlm`].
pub const SCRIPTED_MODEL: &str = "scripted";

/// An LLM client that returns scripted responses in order.
///
/// Every request is recorded so tests can assert on what the driver sent.
/// Once the script runs out it answers with a fixed filler reply.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<Response, claude::Error>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Add a response to the end of the script.
    pub fn queue(&self, response: Response) {
        self.lock_responses().push_back(Ok(response));
    }

    /// Add a failure to the end of the script.
    pub fn queue_error(&self, error: claude::Error) {
        self.lock_responses().push_back(Err(error));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock_responses().len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Response, claude::Error>>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: Request) -> Result<Response, claude::Error> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        self.lock_responses()
            .pop_front()
            .unwrap_or_else(|| Ok(text_response("The DM has no more scripted responses.")))
    }

    fn default_model(&self) -> &str {
        SCRIPTED_MODEL
    }
}

/// A plain text reply that ends the turn.
pub fn text_response(text: impl Into<String>) -> Response {
    Response {
        id: "msg_scripted".to_string(),
        model: SCRIPTED_MODEL.to_string(),
        content: vec![ContentBlock::Text { text: text.into() }],
        stop_reason: StopReason::EndTurn,
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// A reply that calls the given tools, in order.
pub fn tool_response(calls: Vec<(&str, Value)>) -> Response {
    let content = calls
        .into_iter()
        .enumerate()
        .map(|(i, (name, input))| ContentBlock::ToolUse {
            id: format!("toolu_{i}"),
            name: name.to_string(),
            input,
        })
        .collect();

    Response {
        id: "msg_scripted".to_string(),
        model: SCRIPTED_MODEL.to_string(),
        content,
        stop_reason: StopReason::ToolUse,
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// A reply with leading text followed by tool calls.
pub fn text_and_tools(text: impl Into<String>, calls: Vec<(&str, Value)>) -> Response {
    let mut response = tool_response(calls);
    response
        .content
        .insert(0, ContentBlock::Text { text: text.into() });
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use claude::Message;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_order_and_recording() {
        let llm = ScriptedLlm::new(vec![text_response("one"), text_response("two")]);

        let first = llm.complete(Request::new(vec![Message::user("a")])).await.unwrap();
        let second = llm.complete(Request::new(vec![Message::user("b")])).await.unwrap();

        assert_eq!(first.text(), "one");
        assert_eq!(second.text(), "two");
        assert_eq!(llm.request_count(), 2);
        assert_eq!(llm.requests()[1].messages[0].text(), "b");
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_returns_filler() {
        let llm = ScriptedLlm::new(vec![]);
        let response = llm.complete(Request::new(vec![])).await.unwrap();
        assert!(response.text().contains("no more scripted responses"));
    }

    #[tokio::test]
    async fn test_queued_error() {
        let llm = ScriptedLlm::new(vec![]);
        llm.queue_error(claude::Error::Parse("bad json".into()));
        assert!(llm.complete(Request::new(vec![])).await.is_err());
    }

    #[test]
    fn test_text_and_tools() {
        let response = text_and_tools("Let me look.", vec![("inspect_character_sheet", json!({}))]);
        assert_eq!(response.text(), "Let me look.");
        assert_eq!(response.tool_uses().len(), 1);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
    }
}
