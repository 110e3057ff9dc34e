//! Error taxonomy for prompt orchestration.
//!
//! Every failure a caller can observe is one of these variants. Adapters
//! translate provider/HTTP failures into the `Timeout`/`RateLimit`/`Provider`
//! kinds so that provider-native error types never cross the contract
//! boundary.

use thiserror::Error;

/// Unified error type for all `uniprompt` operations.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Malformed caller input (empty prompt, conflicting flags).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No provider/model could be determined for the request.
    #[error("unable to resolve provider for model '{0}'; provide a known provider alias or model name")]
    Resolution(String),

    /// The resolved provider lacks a capability the request requires.
    #[error("provider '{provider}' does not support {capability}")]
    UnsupportedCapability {
        provider: String,
        capability: String,
    },

    /// Missing or invalid credential/settings for a required provider.
    /// The message must never contain the credential value itself.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provider did not answer within its imposed deadline.
    #[error("provider '{provider}' timed out: {message}")]
    Timeout { provider: String, message: String },

    /// The provider rejected the call due to rate limiting (HTTP 429).
    #[error("provider '{provider}' rate limited the request: {message}")]
    RateLimit { provider: String, message: String },

    /// Hard provider-side failure (non-success status, unusable payload).
    #[error("provider '{provider}' error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The result did not validate against the requested output schema.
    /// Carries the raw result text for caller inspection.
    #[error("output validation failed: {message}")]
    OutputValidation { message: String, raw: String },

    /// Raised only when every requested file failed extraction/attachment.
    #[error("file extraction failed: {0}")]
    FileExtraction(String),
}

impl PromptError {
    /// Whether a bounded retry may help. Only the transient adapter
    /// subtypes qualify; everything else surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RateLimit { .. })
    }

    /// Canonical provider key attached to adapter failures, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Timeout { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::Provider { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_covers_only_timeout_and_rate_limit() {
        let timeout = PromptError::Timeout {
            provider: "openai".into(),
            message: "deadline exceeded".into(),
        };
        let rate_limit = PromptError::RateLimit {
            provider: "openai".into(),
            message: "slow down".into(),
        };
        let hard = PromptError::Provider {
            provider: "openai".into(),
            status: Some(500),
            message: "boom".into(),
        };
        assert!(timeout.is_transient());
        assert!(rate_limit.is_transient());
        assert!(!hard.is_transient());
        assert!(!PromptError::InvalidArgument("empty".into()).is_transient());
    }

    #[test]
    fn provider_error_display_includes_status() {
        let err = PromptError::Provider {
            provider: "grok".into(),
            status: Some(503),
            message: "unavailable".into(),
        };
        let text = err.to_string();
        assert!(text.contains("grok"));
        assert!(text.contains("503"));
    }
}
