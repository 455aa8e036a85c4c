//! OpenRouter chat-completions adapter.
//!
//! Speaks the OpenRouter HTTP API and maps transport/provider failures into
//! [`ProviderError`]. Exactly one attempt per call; the pipeline decides what
//! a failure means, the adapter never retries.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::types::{ChatRequest, ChatResponse, FinishReason, Message};

/// Hard cap on response body size (bytes). Bounds memory per call.
pub const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Hard cap on total request character volume.
///
/// A council prompt embeds every peer answer, so the ranking and synthesis
/// stages can grow large; past this size the provider would reject or
/// truncate anyway, so fail fast locally.
pub const MAX_INPUT_CHARS: usize = 500_000;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Low-level chat provider: one request in, one response or typed error out.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// HTTP adapter for the OpenRouter chat-completions endpoint.
pub struct OpenRouterAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OpenRouterAdapter {
    /// Create an adapter against the production endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, None, None)
    }

    /// Create an adapter from environment variables.
    ///
    /// `OPENROUTER_API_KEY` is required. `OPENROUTER_BASE_URL`,
    /// `OPENROUTER_TIMEOUT_SECONDS`, `OPENROUTER_REFERER` (sent as
    /// `HTTP-Referer`) and `OPENROUTER_APP_TITLE` (sent as `X-Title`) are
    /// optional.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ProviderError::config("OPENROUTER_API_KEY is not set"))?;
        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout = std::env::var("OPENROUTER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let referer = std::env::var("OPENROUTER_REFERER").ok();
        let app_title = std::env::var("OPENROUTER_APP_TITLE").ok();

        Self::with_config(api_key, base_url, timeout, referer, app_title)
    }

    /// Create an adapter with explicit configuration. Used by tests to point
    /// at a mock server.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        referer: Option<String>,
        app_title: Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ProviderError::config("OpenRouter API key is empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ProviderError::config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        if let Some(referer) = referer {
            let value = HeaderValue::from_str(&referer)
                .map_err(|e| ProviderError::config(format!("invalid referer: {e}")))?;
            headers.insert("HTTP-Referer", value);
        }
        if let Some(title) = app_title {
            let value = HeaderValue::from_str(&title)
                .map_err(|e| ProviderError::config(format!("invalid app title: {e}")))?;
            headers.insert("X-Title", value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn transport_error(&self, deadline: Duration, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(deadline, None)
        } else {
            ProviderError::Http(err)
        }
    }
}

fn extract_request_id(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Detect a provider refusal from the completion text itself.
///
/// OpenRouter forwards refusals as ordinary 200 completions; the only signal
/// is the opening line.
fn is_refusal(content: &str) -> bool {
    let first_line = content.trim().lines().next().unwrap_or("").to_lowercase();
    const REFUSAL_PREFIXES: &[&str] = &[
        "i can't help",
        "i cannot help",
        "i can't assist",
        "i cannot assist",
        "i can't comply",
        "i cannot comply",
        "i won't",
        "i will not",
        "i'm not able to",
        "i am not able to",
        "i'm unable to",
        "i am unable to",
    ];
    REFUSAL_PREFIXES.iter().any(|p| first_line.starts_with(p))
        || first_line.contains("request was refused")
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(m: &Message) -> Self {
        let role = match m.role {
            super::types::Role::System => "system",
            super::types::Role::User => "user",
            super::types::Role::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: m.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

// =============================================================================
// Adapter implementation
// =============================================================================

#[async_trait]
impl ChatProvider for OpenRouterAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();
        let deadline = req.timeout.unwrap_or(self.timeout);

        let input_chars: usize = req.messages.iter().map(|m| m.content.len()).sum();
        if input_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "request of {input_chars} chars exceeds limit of {MAX_INPUT_CHARS}"
            )));
        }

        let api_req = ChatApiRequest {
            model: req.model.model_id().to_string(),
            messages: req.messages.iter().map(ApiMessage::from).collect(),
        };

        let mut builder = self.client.post(self.chat_url()).json(&api_req);
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }
        let mut response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(deadline, e))?;

        let status = response.status();
        let request_id = extract_request_id(&response);

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.transport_error(deadline, e))?
        {
            if body.len() + chunk.len() > MAX_RESPONSE_LEN {
                return Err(ProviderError::provider(
                    "openrouter",
                    format!("response body exceeded {MAX_RESPONSE_LEN} bytes"),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            let api_error = serde_json::from_slice::<ChatApiResponse>(&body)
                .ok()
                .and_then(|r| r.error);
            let (message, code) = match api_error {
                Some(e) => (e.message, e.code),
                None => (format!("HTTP {}", status.as_u16()), None),
            };
            let mut context = ErrorContext::new().with_status(status.as_u16());
            if let Some(code) = code {
                context = context.with_code(code);
            }
            if let Some(id) = request_id {
                context = context.with_request_id(id);
            }
            if status.as_u16() == 429 {
                return Err(ProviderError::rate_limited(Duration::from_secs(60), context));
            }
            return Err(ProviderError::provider_with_context(
                "openrouter",
                message,
                context,
            ));
        }

        let api_resp: ChatApiResponse = serde_json::from_slice(&body).map_err(|e| {
            ProviderError::provider("openrouter", format!("invalid JSON from provider: {e}"))
        })?;

        // OpenRouter can return an error object inside a 200 body.
        if let Some(err) = api_resp.error {
            let mut context = ErrorContext::new().with_status(status.as_u16());
            if let Some(code) = err.code {
                context = context.with_code(code);
            }
            if let Some(id) = request_id {
                context = context.with_request_id(id);
            }
            if is_refusal(&err.message) {
                return Err(ProviderError::Refused {
                    message: err.message,
                    context: Some(context),
                });
            }
            return Err(ProviderError::provider_with_context(
                "openrouter",
                err.message,
                context,
            ));
        }

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::provider("openrouter", "no choices in response"))?;

        let content = choice.message.content.unwrap_or_default();
        if is_refusal(&content) {
            let mut context = ErrorContext::new().with_status(status.as_u16());
            if let Some(id) = request_id {
                context = context.with_request_id(id);
            }
            return Err(ProviderError::Refused {
                message: content,
                context: Some(context),
            });
        }

        let (input_tokens, output_tokens) = api_resp
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(ChatResponse {
            content,
            input_tokens,
            output_tokens,
            latency: start.elapsed(),
            finish_reason: FinishReason::from(choice.finish_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_detected_from_first_line() {
        assert!(is_refusal("I cannot comply with that request."));
        assert!(is_refusal("  I'm unable to help with this.\nMore text."));
    }

    #[test]
    fn ordinary_content_is_not_a_refusal() {
        assert!(!is_refusal("Here is a thorough answer."));
        assert!(!is_refusal(
            "The phrase 'I cannot comply' appears mid-sentence here."
        ));
    }
}
