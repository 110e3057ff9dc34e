//! xAI Grok adapter using the OpenAI-style chat completions API.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::error::PromptError;
use crate::schema;
use crate::types::AdapterResponse;

use super::{
    AdapterContext, AdapterRequest, ProviderAdapter, bearer_headers, merge_extra_options,
    post_json,
};

const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const PROVIDER: &str = "grok";

pub(crate) struct XaiAdapter {
    api_key: SecretString,
    base_url: String,
    http_client: reqwest::Client,
    extra_options: Option<Value>,
}

impl XaiAdapter {
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
}

#[async_trait]
impl ProviderAdapter for XaiAdapter {
    fn provider_key(&self) -> &'static str {
        PROVIDER
    }

    async fn run(&self, request: AdapterRequest<'_>) -> Result<AdapterResponse, PromptError> {
        // Search/citation retrieval is not declared for this provider; the
        // resolver rejects require_search before an adapter call happens.
        let mut payload = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
        });

        if let Some(output_schema) = request.output_schema {
            payload["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "uniprompt_output",
                    "schema": schema::openai_response_schema(output_schema),
                    "strict": true,
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

        Ok(AdapterResponse {
            text,
            citations: Vec::new(),
            raw: Some(raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_choice_message_content() {
        let raw = json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
        assert_eq!(XaiAdapter::extract_text(&raw).as_deref(), Some("hi"));
    }

    #[test]
    fn payload_without_message_content_is_not_a_result() {
        assert_eq!(XaiAdapter::extract_text(&json!({})), None);
        assert_eq!(
            XaiAdapter::extract_text(&json!({"choices": [{"message": {}}]})),
            None
        );
    }
}
