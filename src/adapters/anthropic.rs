//! Anthropic Claude adapter using the Messages API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::error::PromptError;
use crate::schema;
use crate::types::{AdapterResponse, Citation};

use super::{AdapterContext, AdapterRequest, ProviderAdapter, merge_extra_options, post_json};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const PROVIDER: &str = "claude";

pub(crate) struct AnthropicAdapter {
    api_key: SecretString,
    base_url: String,
    max_tokens: u32,
    http_client: reqwest::Client,
    extra_options: Option<Value>,
}

impl AnthropicAdapter {
    pub(crate) fn create(ctx: AdapterContext) -> Result<Arc<dyn ProviderAdapter>, PromptError> {
        Ok(Arc::new(Self {
            api_key: ctx.api_key,
            base_url: ctx
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: ctx.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            http_client: ctx.http_client,
            extra_options: ctx.extra_options,
        }))
    }

    fn headers(&self) -> Result<HeaderMap, PromptError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(self.api_key.expose_secret())
            .map_err(|_| PromptError::Configuration("API key is not a valid header value".into()))?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn extract_text(raw: &Value) -> Option<String> {
        let mut texts: Vec<&str> = Vec::new();
        let mut found = false;
        for block in raw.get("content").and_then(Value::as_array).into_iter().flatten() {
            if block.get("type").and_then(Value::as_str) == Some("text") {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    found = true;
                    if !text.is_empty() {
                        texts.push(text);
                    }
                }
            }
        }
        found.then(|| texts.join("\n"))
    }

    /// Citations appear both inline on text blocks and as web search tool
    /// result blocks; both are normalized, malformed entries dropped.
    fn extract_citations(raw: &Value) -> Vec<Citation> {
        let mut citations = Vec::new();
        for block in raw.get("content").and_then(Value::as_array).into_iter().flatten() {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    for item in block
                        .get("citations")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                    {
                        let url = item.get("url").and_then(Value::as_str);
                        if url.is_none() && item.get("title").and_then(Value::as_str).is_none() {
                            continue;
                        }
                        citations.push(Citation {
                            url: url.map(str::to_string),
                            title: item
                                .get("title")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            source: url.map(str::to_string),
                            snippet: item
                                .get("cited_text")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            raw: Some(item.clone()),
                            ..Citation::for_provider(PROVIDER)
                        });
                    }
                }
                Some("web_search_tool_result") => {
                    for result in block
                        .get("content")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                    {
                        let url = result.get("url").and_then(Value::as_str);
                        if url.is_none() {
                            continue;
                        }
                        citations.push(Citation {
                            url: url.map(str::to_string),
                            title: result
                                .get("title")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            source: url.map(str::to_string),
                            raw: Some(result.clone()),
                            ..Citation::for_provider(PROVIDER)
                        });
                    }
                }
                _ => {}
            }
        }
        citations
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider_key(&self) -> &'static str {
        PROVIDER
    }

    async fn run(&self, request: AdapterRequest<'_>) -> Result<AdapterResponse, PromptError> {
        // No binary upload capability; the pipeline routes attachments to
        // extraction before this adapter is invoked.
        let mut payload = json!({
            "model": request.model,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": [{"type": "text", "text": request.prompt}],
            }],
        });

        if request.require_search {
            payload["tools"] = json!([{
                "name": "web_search",
                "type": "web_search_20250305",
            }]);
        }

        if let Some(output_schema) = request.output_schema {
            payload["output_config"] = json!({
                "format": {
                    "type": "json_schema",
                    "schema": schema::anthropic_response_schema(output_schema),
                }
            });
        }

        merge_extra_options(&mut payload, self.extra_options.as_ref());

        let raw = post_json(
            &self.http_client,
            PROVIDER,
            &format!("{}/v1/messages", self.base_url),
            self.headers()?,
            &payload,
        )
        .await?;

        let text = Self::extract_text(&raw).ok_or_else(|| super::missing_content(PROVIDER))?;

        let citations = if request.return_citations {
            Self::extract_citations(&raw)
        } else {
            Vec::new()
        };

        Ok(AdapterResponse {
            text,
            citations,
            raw: Some(raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_with_newlines() {
        let raw = json!({"content": [
            {"type": "text", "text": "first"},
            {"type": "tool_use", "name": "web_search"},
            {"type": "text", "text": "second"}
        ]});
        assert_eq!(
            AnthropicAdapter::extract_text(&raw).as_deref(),
            Some("first\nsecond")
        );
    }

    #[test]
    fn payload_without_text_blocks_is_not_a_result() {
        assert_eq!(AnthropicAdapter::extract_text(&json!({})), None);
        let tool_only = json!({"content": [{"type": "tool_use", "name": "web_search"}]});
        assert_eq!(AnthropicAdapter::extract_text(&tool_only), None);
    }

    #[test]
    fn collects_inline_and_tool_result_citations() {
        let raw = json!({"content": [
            {"type": "text", "text": "cited", "citations": [
                {"url": "https://a.example", "title": "A", "cited_text": "quoted"}
            ]},
            {"type": "web_search_tool_result", "content": [
                {"url": "https://b.example", "title": "B"},
                {"note": "no url, dropped"}
            ]}
        ]});
        let citations = AnthropicAdapter::extract_citations(&raw);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].snippet.as_deref(), Some("quoted"));
        assert_eq!(citations[1].url.as_deref(), Some("https://b.example"));
        assert!(citations.iter().all(|c| c.provider == "claude"));
    }
}
