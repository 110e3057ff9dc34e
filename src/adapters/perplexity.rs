//! Perplexity adapter. Search-native: every completion may carry sources.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::error::PromptError;
use crate::schema;
use crate::types::{AdapterResponse, Citation};

use super::{
    AdapterContext, AdapterRequest, ProviderAdapter, bearer_headers, merge_extra_options,
    post_json,
};

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
const PROVIDER: &str = "perplexity";

pub(crate) struct PerplexityAdapter {
    api_key: SecretString,
    base_url: String,
    http_client: reqwest::Client,
    extra_options: Option<Value>,
}

impl PerplexityAdapter {
    pub(crate) fn create(ctx: AdapterContext) -> Result<Arc<dyn ProviderAdapter>, PromptError> {
        Ok(Arc::new(Self {
            api_key: ctx.api_key,
            base_url: ctx
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http_client: ctx.http_client,
            extra_options: ctx.extra_options,
        }))
    }

    fn extract_text(raw: &Value) -> Option<String> {
        raw.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Prefer the structured `search_results` entries; fall back to the bare
    /// `citations` URL list older responses carry.
    fn extract_citations(raw: &Value) -> Vec<Citation> {
        let mut citations = Vec::new();

        for result in raw
            .get("search_results")
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
                snippet: result
                    .get("snippet")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                raw: Some(result.clone()),
                ..Citation::for_provider(PROVIDER)
            });
        }

        if citations.is_empty() {
            for url in raw
                .get("citations")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let Some(url) = url.as_str() else { continue };
                citations.push(Citation {
                    url: Some(url.to_string()),
                    source: Some(url.to_string()),
                    ..Citation::for_provider(PROVIDER)
                });
            }
        }

        citations
    }
}

#[async_trait]
impl ProviderAdapter for PerplexityAdapter {
    fn provider_key(&self) -> &'static str {
        PROVIDER
    }

    async fn run(&self, request: AdapterRequest<'_>) -> Result<AdapterResponse, PromptError> {
        let mut payload = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        if let Some(output_schema) = request.output_schema {
            payload["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "schema": schema::perplexity_response_schema(output_schema),
                }
            });
        }

        merge_extra_options(&mut payload, self.extra_options.as_ref());

        let raw = post_json(
            &self.http_client,
            PROVIDER,
            &format!("{}/chat/completions", self.base_url),
            bearer_headers(&self.api_key)?,
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
    fn search_results_win_over_bare_citation_urls() {
        let raw = json!({
            "search_results": [
                {"url": "https://a.example", "title": "A", "snippet": "text"}
            ],
            "citations": ["https://b.example"]
        });
        let citations = PerplexityAdapter::extract_citations(&raw);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn bare_citation_urls_are_used_as_fallback() {
        let raw = json!({"citations": ["https://b.example"]});
        let citations = PerplexityAdapter::extract_citations(&raw);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url.as_deref(), Some("https://b.example"));
        assert_eq!(citations[0].provider, "perplexity");
    }
}
