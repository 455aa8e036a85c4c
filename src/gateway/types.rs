//! Request and response types for the chat gateway.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Who asked and which run it belongs to.
///
/// Every member call, ranking call, synthesis call and title call carries
/// one of these, so usage records can be grouped per deliberation.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    /// Deliberation run this call is part of, if any.
    pub run_id: Option<Uuid>,
    /// Code path making the call: "council" for the stages, "title" for the
    /// side task.
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Model selector. Council seats are OpenRouter ids like
/// "anthropic/claude-sonnet-4.5".
#[derive(Debug, Clone)]
pub enum ChatModel {
    OpenRouter(String),
}

impl ChatModel {
    pub fn openrouter(model_id: impl Into<String>) -> Self {
        ChatModel::OpenRouter(model_id.into())
    }

    pub fn model_id(&self) -> &str {
        match self {
            ChatModel::OpenRouter(id) => id,
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            ChatModel::OpenRouter(_) => "openrouter",
        }
    }
}

/// One chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: ChatModel,
    pub messages: Vec<Message>,
    /// Per-request deadline override. Falls back to the adapter default.
    ///
    /// Members answer with the default; the chairman reads every answer and
    /// every verdict, so synthesis gets a longer deadline.
    pub timeout: Option<Duration>,
    pub attribution: Attribution,
}

impl ChatRequest {
    pub fn new(model: ChatModel, messages: Vec<Message>, attribution: Attribution) -> Self {
        Self {
            model,
            messages,
            timeout: None,
            attribution,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(other) => FinishReason::Unknown(other.to_string()),
            None => FinishReason::Unknown("none".to_string()),
        }
    }
}

/// A completed chat call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Wall-clock time of the call, as measured by the adapter.
    pub latency: Duration,
    pub finish_reason: FinishReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_override_is_opt_in() {
        let req = ChatRequest::new(
            ChatModel::openrouter("test/model"),
            vec![Message::user("hi")],
            Attribution::new("test"),
        );
        assert!(req.timeout.is_none());

        let req = req.timeout(Duration::from_secs(240));
        assert_eq!(req.timeout, Some(Duration::from_secs(240)));
    }

    #[test]
    fn finish_reason_maps_provider_strings() {
        assert_eq!(
            FinishReason::from(Some("stop".to_string())),
            FinishReason::Stop
        );
        assert_eq!(
            FinishReason::from(Some("length".to_string())),
            FinishReason::Length
        );
        assert_eq!(
            FinishReason::from(Some("weird".to_string())),
            FinishReason::Unknown("weird".to_string())
        );
        assert_eq!(
            FinishReason::from(None),
            FinishReason::Unknown("none".to_string())
        );
    }

    #[test]
    fn attribution_carries_run_and_caller() {
        let run = Uuid::new_v4();
        let attribution = Attribution::new("council").with_run(run);
        assert_eq!(attribution.caller, "council");
        assert_eq!(attribution.run_id, Some(run));
    }
}
