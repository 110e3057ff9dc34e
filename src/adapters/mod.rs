//! Provider adapter contract and shared HTTP plumbing.
//!
//! One adapter per provider satisfies [`ProviderAdapter`]. Adapters own their
//! credential and endpoint, perform at most one logical provider call per
//! `run` invocation (plus declared attachment uploads), and translate every
//! provider/HTTP failure into the crate's error taxonomy. Retry policy lives
//! in the orchestrator, never inside an adapter.

mod anthropic;
mod gemini;
mod openai;
mod perplexity;
mod xai;

pub(crate) use anthropic::AnthropicAdapter;
pub(crate) use gemini::GeminiAdapter;
pub(crate) use openai::OpenAiAdapter;
pub(crate) use perplexity::PerplexityAdapter;
pub(crate) use xai::XaiAdapter;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use secrecy::SecretString;
use serde_json::Value;

use crate::error::PromptError;
use crate::files::{FileFormat, PreparedContext};
use crate::types::AdapterResponse;

/// Capabilities a provider declares to the resolver and file pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Whether the provider can perform search/citation retrieval.
    pub search: bool,
    /// Formats the provider accepts as native binary attachments.
    pub binary_upload: &'static [FileFormat],
}

impl Capabilities {
    pub fn supports_binary(&self, format: FileFormat) -> bool {
        self.binary_upload.contains(&format)
    }
}

/// Everything an adapter factory needs to construct an instance.
///
/// The credential has already been resolved (config value or env chain);
/// a missing credential fails before the factory is ever called.
pub struct AdapterContext {
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    /// Provider-specific request options merged into each outgoing payload.
    pub extra_options: Option<Value>,
    pub http_client: reqwest::Client,
}

/// Per-call input to an adapter. All per-call state flows through here;
/// adapters themselves stay stateless and safe for concurrent reuse.
pub struct AdapterRequest<'a> {
    /// Normalized prompt, with any extracted file context already folded in.
    pub prompt: &'a str,
    pub model: &'a str,
    pub require_search: bool,
    pub return_citations: bool,
    /// Binary attachments the pipeline routed to native upload.
    pub context: &'a PreparedContext,
    /// Caller-supplied JSON Schema for structured output, if requested.
    pub output_schema: Option<&'a Value>,
}

/// Capability interface every provider implementation satisfies.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Canonical provider key, matching the registry record.
    fn provider_key(&self) -> &'static str;

    /// Execute the prompt on the provider and return normalized output.
    async fn run(&self, request: AdapterRequest<'_>) -> Result<AdapterResponse, PromptError>;
}

/// Adapter factory signature stored in the registry.
pub type AdapterFactory = fn(AdapterContext) -> Result<Arc<dyn ProviderAdapter>, PromptError>;

/// POST a JSON body and parse the JSON reply, mapping failures onto the
/// error taxonomy: request timeouts (and provider 408/504) become `Timeout`,
/// HTTP 429 becomes `RateLimit`, everything else non-success or unparsable
/// becomes `Provider`.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    provider: &'static str,
    url: &str,
    headers: HeaderMap,
    body: &Value,
) -> Result<Value, PromptError> {
    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| classify_send_error(provider, e))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if status.as_u16() == 429 {
        return Err(PromptError::RateLimit {
            provider: provider.to_string(),
            message: truncate(&text, 500),
        });
    }
    if status.as_u16() == 408 || status.as_u16() == 504 {
        return Err(PromptError::Timeout {
            provider: provider.to_string(),
            message: truncate(&text, 500),
        });
    }
    if !status.is_success() {
        return Err(PromptError::Provider {
            provider: provider.to_string(),
            status: Some(status.as_u16()),
            message: truncate(&text, 500),
        });
    }

    serde_json::from_str(&text).map_err(|e| PromptError::Provider {
        provider: provider.to_string(),
        status: Some(status.as_u16()),
        message: format!("unexpected response payload: {e}"),
    })
}

/// A success status whose body carries no message content. Surfaced as a
/// provider error so callers can tell it apart from a genuinely empty answer.
pub(crate) fn missing_content(provider: &'static str) -> PromptError {
    PromptError::Provider {
        provider: provider.to_string(),
        status: None,
        message: "unexpected response payload: no message content".into(),
    }
}

pub(crate) fn classify_send_error(provider: &'static str, error: reqwest::Error) -> PromptError {
    if error.is_timeout() {
        PromptError::Timeout {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    } else {
        PromptError::Provider {
            provider: provider.to_string(),
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

/// `Authorization: Bearer <key>` headers. The key value never appears in the
/// error path.
pub(crate) fn bearer_headers(api_key: &SecretString) -> Result<HeaderMap, PromptError> {
    use reqwest::header::{AUTHORIZATION, HeaderValue};
    use secrecy::ExposeSecret;

    let mut headers = HeaderMap::new();
    let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
        .map_err(|_| PromptError::Configuration("API key is not a valid header value".into()))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Merge provider `extra_options` (a JSON object) into the outgoing payload.
/// Explicit options win over keys the adapter already set, matching the
/// configuration surface's contract.
pub(crate) fn merge_extra_options(payload: &mut Value, extra: Option<&Value>) {
    if let (Some(Value::Object(extra)), Value::Object(body)) = (extra, payload) {
        for (key, value) in extra {
            body.insert(key.clone(), value.clone());
        }
    }
}

/// MIME type for an attachment upload, by file name.
pub(crate) fn attachment_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}
