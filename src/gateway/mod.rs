//! Gateway to OpenRouter chat completions, with per-call usage records.
//!
//! Layering:
//! - [`openrouter::OpenRouterAdapter`] speaks the provider HTTP API.
//! - [`ProviderGateway`] wraps the adapter and records one
//!   [`ProviderCallRecord`] per call (success or error) to a [`UsageSink`].
//! - [`ChatGateway`] is the object-safe seam the council pipeline depends
//!   on, so tests can substitute the whole gateway.
//!
//! The gateway makes exactly one attempt per call. Per-model failure policy
//! lives in the council pipeline, not here.

pub mod error;
pub mod openrouter;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Instant;

use openrouter::{ChatProvider, OpenRouterAdapter};
use usage::{ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{CallStatus, NoopUsageSink, StderrUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

pub struct ProviderGateway<U: UsageSinkTrait> {
    openrouter: OpenRouterAdapter,
    usage_sink: Arc<U>,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let openrouter = OpenRouterAdapter::from_env()?;
        Ok(Self {
            openrouter,
            usage_sink,
        })
    }

    pub fn new(openrouter: OpenRouterAdapter, usage_sink: Arc<U>) -> Self {
        Self {
            openrouter,
            usage_sink,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();
        let result = self.openrouter.chat(&req).await;

        match &result {
            Ok(resp) => {
                self.record_usage(
                    &req,
                    resp.input_tokens,
                    resp.output_tokens,
                    resp.latency.as_millis() as i32,
                    None,
                    None,
                )
                .await;
            }
            Err(err) => {
                self.record_usage(
                    &req,
                    0,
                    0,
                    start.elapsed().as_millis() as i32,
                    Some(err.code()),
                    err.request_id().map(|s| s.to_string()),
                )
                .await;
            }
        }

        result
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        input_tokens: u32,
        output_tokens: u32,
        latency_ms: i32,
        error_code: Option<&'static str>,
        request_id: Option<String>,
    ) {
        let mut record = ProviderCallRecord::new(
            req.model.provider(),
            "chat/completions",
            req.model.model_id(),
            req.attribution.caller,
        )
        .tokens(input_tokens as i32, output_tokens as i32)
        .run(req.attribution.run_id)
        .latency(latency_ms)
        .request_id(request_id);

        if let Some(code) = error_code {
            record = record.error(code);
        }

        self.usage_sink.record(record).await;
    }
}
