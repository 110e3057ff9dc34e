//! Google Gemini adapter using the generateContent REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::error::PromptError;
use crate::files::FileSpec;
use crate::types::{AdapterResponse, Citation};

use super::{
    AdapterContext, AdapterRequest, ProviderAdapter, attachment_mime, classify_send_error,
    merge_extra_options, post_json,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER: &str = "gemini";

pub(crate) struct GeminiAdapter {
    api_key: SecretString,
    base_url: String,
    http_client: reqwest::Client,
    extra_options: Option<Value>,
}

impl GeminiAdapter {
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

    /// The key travels in a header, not the URL, so it never lands in logs.
    fn headers(&self) -> Result<HeaderMap, PromptError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(self.api_key.expose_secret())
            .map_err(|_| PromptError::Configuration("API key is not a valid header value".into()))?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    /// Media-upload one attachment; returns a `file_data` part referencing it.
    async fn upload_file(&self, spec: &FileSpec) -> Result<Value, PromptError> {
        let bytes = crate::files::read_attachment_bytes(spec)?;
        let mime = attachment_mime(&spec.name);

        let response = self
            .http_client
            .post(format!(
                "{}/upload/v1beta/files?uploadType=media",
                self.base_url
            ))
            .headers(self.headers()?)
            .header("content-type", &mime)
            .body(bytes)
            .send()
            .await
            .map_err(|e| classify_send_error(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PromptError::Provider {
                provider: PROVIDER.to_string(),
                status: Some(status.as_u16()),
                message: text,
            });
        }

        let body: Value = response.json().await.map_err(|e| PromptError::Provider {
            provider: PROVIDER.to_string(),
            status: Some(status.as_u16()),
            message: format!("file upload failed: {e}"),
        })?;

        let uri = body
            .pointer("/file/uri")
            .and_then(Value::as_str)
            .ok_or_else(|| PromptError::Provider {
                provider: PROVIDER.to_string(),
                status: Some(status.as_u16()),
                message: "file upload reply is missing a uri".into(),
            })?;

        Ok(json!({"file_data": {"mime_type": mime, "file_uri": uri}}))
    }

    fn extract_text(raw: &Value) -> Option<String> {
        let mut chunks: Vec<&str> = Vec::new();
        for candidate in raw
            .get("candidates")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            for part in candidate
                .pointer("/content/parts")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    chunks.push(text);
                }
            }
        }
        (!chunks.is_empty()).then(|| chunks.concat())
    }

    /// Grounding metadata carries the web sources Gemini consulted. REST
    /// replies use camelCase; the snake_case spelling is accepted too.
    fn extract_citations(raw: &Value) -> Vec<Citation> {
        let mut citations = Vec::new();
        for candidate in raw
            .get("candidates")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let grounding = candidate
                .get("groundingMetadata")
                .or_else(|| candidate.get("grounding_metadata"));
            let chunks = grounding
                .and_then(|g| g.get("groundingChunks").or_else(|| g.get("grounding_chunks")))
                .and_then(Value::as_array);
            for chunk in chunks.into_iter().flatten() {
                let Some(web) = chunk.get("web").filter(|w| w.is_object()) else {
                    continue;
                };
                let url = web.get("uri").and_then(Value::as_str);
                if url.is_none() {
                    continue;
                }
                citations.push(Citation {
                    url: url.map(str::to_string),
                    title: web.get("title").and_then(Value::as_str).map(str::to_string),
                    source: url.map(str::to_string),
                    raw: Some(chunk.clone()),
                    ..Citation::for_provider(PROVIDER)
                });
            }
        }
        citations
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_key(&self) -> &'static str {
        PROVIDER
    }

    async fn run(&self, request: AdapterRequest<'_>) -> Result<AdapterResponse, PromptError> {
        let mut parts = Vec::with_capacity(request.context.attachments.len() + 1);
        for spec in &request.context.attachments {
            parts.push(self.upload_file(spec).await?);
        }
        parts.push(json!({"text": request.prompt}));

        let mut payload = json!({
            "contents": [{"role": "user", "parts": parts}],
        });

        if request.require_search {
            payload["tools"] = json!([{"google_search": {}}]);
        }

        if let Some(output_schema) = request.output_schema {
            payload["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseJsonSchema": output_schema,
            });
        }

        merge_extra_options(&mut payload, self.extra_options.as_ref());

        let raw = post_json(
            &self.http_client,
            PROVIDER,
            &format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, request.model
            ),
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
    fn concatenates_candidate_parts() {
        let raw = json!({"candidates": [{
            "content": {"parts": [{"text": "Hello "}, {"text": "Gemini"}]}
        }]});
        assert_eq!(
            GeminiAdapter::extract_text(&raw).as_deref(),
            Some("Hello Gemini")
        );
    }

    #[test]
    fn payload_without_text_parts_is_not_a_result() {
        assert_eq!(GeminiAdapter::extract_text(&json!({})), None);
        let no_text = json!({"candidates": [{"content": {"parts": [{"inline_data": {}}]}}]});
        assert_eq!(GeminiAdapter::extract_text(&no_text), None);
    }

    #[test]
    fn grounding_chunks_become_citations_in_both_spellings() {
        let camel = json!({"candidates": [{
            "groundingMetadata": {"groundingChunks": [
                {"web": {"uri": "https://a.example", "title": "A"}},
                {"retrievedContext": {"text": "not web, dropped"}}
            ]}
        }]});
        let snake = json!({"candidates": [{
            "grounding_metadata": {"grounding_chunks": [
                {"web": {"uri": "https://b.example", "title": "B"}}
            ]}
        }]});

        let camel_citations = GeminiAdapter::extract_citations(&camel);
        assert_eq!(camel_citations.len(), 1);
        assert_eq!(camel_citations[0].url.as_deref(), Some("https://a.example"));

        let snake_citations = GeminiAdapter::extract_citations(&snake);
        assert_eq!(snake_citations.len(), 1);
        assert_eq!(snake_citations[0].provider, "gemini");
    }
}
