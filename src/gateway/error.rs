//! Typed provider failures.
//!
//! The council treats these asymmetrically: a member hitting any of them
//! becomes a `failed` answer and the run continues, while the chairman
//! hitting one is fatal. The classification still matters downstream: the
//! variant's [`code`](ProviderError::code) lands in usage records and the
//! display text lands in the failed member's `error` field.

use std::time::Duration;
use thiserror::Error;

/// Provider-side details worth keeping when a call fails.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub http_status: Option<u16>,
    /// Provider error code, e.g. "rate_limit_exceeded".
    pub provider_code: Option<String>,
    /// The x-request-id header, for support tickets.
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429 from the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: Option<ErrorContext>,
    },

    /// The request itself is unacceptable (e.g. over the input size cap).
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: Option<ErrorContext>,
    },

    /// The model declined to answer on content grounds.
    #[error("refused: {message}")]
    Refused {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Any other upstream failure.
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
        context: Option<ErrorContext>,
    },

    /// The call outlived its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration, Option<ErrorContext>),

    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bad local setup, e.g. a missing API key.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn rate_limited(retry_after: Duration, context: ErrorContext) -> Self {
        Self::RateLimited {
            retry_after,
            context: Some(context),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: None,
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused {
            message: message.into(),
            context: None,
        }
    }

    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            context: None,
        }
    }

    pub fn provider_with_context(
        provider: &'static str,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Stable code for usage records and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Refused { .. } => "refused",
            Self::Provider { .. } => "provider_error",
            Self::Timeout(_, _) => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::RateLimited { context, .. } => context.as_ref(),
            Self::InvalidRequest { context, .. } => context.as_ref(),
            Self::Refused { context, .. } => context.as_ref(),
            Self::Provider { context, .. } => context.as_ref(),
            Self::Timeout(_, context) => context.as_ref(),
            Self::Http(_) => None,
            Self::Config(_) => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_per_variant() {
        assert_eq!(ProviderError::refused("no").code(), "refused");
        assert_eq!(
            ProviderError::rate_limited(Duration::from_secs(60), ErrorContext::new()).code(),
            "rate_limited"
        );
        assert_eq!(ProviderError::config("missing key").code(), "config_error");
    }

    #[test]
    fn request_id_surfaces_through_context() {
        let err = ProviderError::provider_with_context(
            "openrouter",
            "boom",
            ErrorContext::new().with_status(500).with_request_id("r-1"),
        );
        assert_eq!(err.request_id(), Some("r-1"));
        assert_eq!(err.context().unwrap().http_status, Some(500));

        assert!(ProviderError::refused("no").request_id().is_none());
    }
}
