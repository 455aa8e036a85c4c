//! Per-call usage records.
//!
//! Every gateway call produces one [`ProviderCallRecord`], success or error,
//! delivered to a [`UsageSink`]. A deliberation fans out many calls under one
//! run id, so the records are how a host meters a council run; the CLI
//! either discards them or prints them to stderr.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// One provider call, as seen by the usage sink.
#[derive(Debug, Clone)]
pub struct ProviderCallRecord {
    pub provider: &'static str,
    pub endpoint: &'static str,
    pub model: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    /// Deliberation run the call belongs to, if any. Stage calls and the
    /// title call of one run share this id.
    pub run_id: Option<Uuid>,
    pub latency_ms: i32,
    pub status: CallStatus,
    /// Stable error code when `status` is `Error`.
    pub error_code: Option<String>,
    /// Code path that made the call ("council", "title").
    pub caller: &'static str,
    /// Provider-assigned request id, when the response carried one.
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProviderCallRecord {
    pub fn new(
        provider: &'static str,
        endpoint: &'static str,
        model: impl Into<String>,
        caller: &'static str,
    ) -> Self {
        Self {
            provider,
            endpoint,
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            run_id: None,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            caller,
            request_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn tokens(mut self, input: i32, output: i32) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn run(mut self, run_id: Option<Uuid>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn latency(mut self, ms: i32) -> Self {
        self.latency_ms = ms;
        self
    }

    /// Mark the call failed with a stable code from
    /// [`ProviderError::code`](super::ProviderError::code).
    pub fn error(mut self, code: impl Into<String>) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code.into());
        self
    }

    pub fn request_id(mut self, id: Option<String>) -> Self {
        self.request_id = id;
        self
    }
}

/// Destination for call records. Recording is fire-and-forget: a sink must
/// swallow its own failures rather than disturb the call path.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: ProviderCallRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: ProviderCallRecord) {}
}

/// Prints one JSON line per call to stderr. Enough to eyeball what a
/// deliberation cost without wiring up real metering.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrUsageSink;

#[async_trait]
impl UsageSink for StderrUsageSink {
    async fn record(&self, record: ProviderCallRecord) {
        let run = record
            .run_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "none".to_string());
        eprintln!(
            r#"{{"provider":"{}","model":"{}","run":"{}","caller":"{}","tokens":{},"latency_ms":{},"status":"{}"}}"#,
            record.provider,
            record.model,
            run,
            record.caller,
            record.input_tokens + record.output_tokens,
            record.latency_ms,
            record.status.as_str(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_builder_defaults_to_success() {
        let record = ProviderCallRecord::new("openrouter", "chat/completions", "m/a", "council");
        assert_eq!(record.status, CallStatus::Success);
        assert!(record.error_code.is_none());
        assert_eq!(record.input_tokens, 0);
    }

    #[test]
    fn error_builder_flips_status_and_keeps_code() {
        let record = ProviderCallRecord::new("openrouter", "chat/completions", "m/a", "council")
            .tokens(5, 7)
            .error("rate_limited");
        assert_eq!(record.status, CallStatus::Error);
        assert_eq!(record.error_code.as_deref(), Some("rate_limited"));
        assert_eq!(record.input_tokens, 5);
        assert_eq!(record.output_tokens, 7);
    }
}
