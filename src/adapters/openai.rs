//! OpenAI adapter using the Responses API.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};

use crate::error::PromptError;
use crate::files::FileSpec;
use crate::schema;
use crate::types::{AdapterResponse, Citation};

use super::{
    AdapterContext, AdapterRequest, ProviderAdapter, attachment_mime, bearer_headers,
    classify_send_error, merge_extra_options, post_json,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "openai";

pub(crate) struct OpenAiAdapter {
    api_key: SecretString,
    base_url: String,
    http_client: reqwest::Client,
    extra_options: Option<Value>,
}

impl OpenAiAdapter {
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

    /// Upload one attachment through the Files API; returns the file id the
    /// Responses input can reference.
    async fn upload_file(&self, spec: &FileSpec) -> Result<String, PromptError> {
        let bytes = crate::files::read_attachment_bytes(spec)?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(spec.name.clone())
            .mime_str(&attachment_mime(&spec.name))
            .map_err(|e| PromptError::Provider {
                provider: PROVIDER.to_string(),
                status: None,
                message: format!("cannot build upload for '{}': {e}", spec.name),
            })?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "user_data")
            .part("file", part);

        let response = self
            .http_client
            .post(format!("{}/files", self.base_url))
            .headers(bearer_headers(&self.api_key)?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_send_error(PROVIDER, e))?;

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) if status.is_success() => body,
            Ok(body) => {
                return Err(PromptError::Provider {
                    provider: PROVIDER.to_string(),
                    status: Some(status.as_u16()),
                    message: body.to_string(),
                });
            }
            Err(e) => {
                return Err(PromptError::Provider {
                    provider: PROVIDER.to_string(),
                    status: Some(status.as_u16()),
                    message: format!("file upload failed: {e}"),
                });
            }
        };

        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PromptError::Provider {
                provider: PROVIDER.to_string(),
                status: Some(status.as_u16()),
                message: "file upload reply is missing an id".into(),
            })
    }

    fn build_input(prompt: &str, file_ids: &[String]) -> Value {
        let mut content = vec![json!({"type": "input_text", "text": prompt})];
        for file_id in file_ids {
            content.push(json!({"type": "input_file", "file_id": file_id}));
        }
        json!([{"role": "user", "content": content}])
    }

    fn extract_text(raw: &Value) -> Option<String> {
        let mut chunks: Vec<&str> = Vec::new();
        for output in raw.get("output").and_then(Value::as_array).into_iter().flatten() {
            if output.get("type").and_then(Value::as_str) != Some("message") {
                continue;
            }
            for part in output.get("content").and_then(Value::as_array).into_iter().flatten() {
                if part.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        chunks.push(text);
                    }
                }
            }
        }
        (!chunks.is_empty()).then(|| chunks.concat())
    }

    fn extract_citations(raw: &Value) -> Vec<Citation> {
        let mut citations = Vec::new();
        for output in raw.get("output").and_then(Value::as_array).into_iter().flatten() {
            if output.get("type").and_then(Value::as_str) != Some("message") {
                continue;
            }
            for part in output.get("content").and_then(Value::as_array).into_iter().flatten() {
                for annotation in part
                    .get("annotations")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    if !annotation.is_object() {
                        continue;
                    }
                    let url = annotation.get("url").and_then(Value::as_str);
                    let title = annotation.get("title").and_then(Value::as_str);
                    if url.is_none() && title.is_none() {
                        continue;
                    }
                    citations.push(Citation {
                        url: url.map(str::to_string),
                        title: title.map(str::to_string),
                        source: url.map(str::to_string),
                        start_index: annotation.get("start_index").and_then(Value::as_u64),
                        end_index: annotation.get("end_index").and_then(Value::as_u64),
                        raw: Some(annotation.clone()),
                        ..Citation::for_provider(PROVIDER)
                    });
                }
            }
        }
        citations
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_key(&self) -> &'static str {
        PROVIDER
    }

    async fn run(&self, request: AdapterRequest<'_>) -> Result<AdapterResponse, PromptError> {
        let mut file_ids = Vec::with_capacity(request.context.attachments.len());
        for spec in &request.context.attachments {
            file_ids.push(self.upload_file(spec).await?);
        }

        let mut payload = json!({
            "model": request.model,
            "input": Self::build_input(request.prompt, &file_ids),
        });

        if request.require_search {
            payload["tools"] = json!([{"type": "web_search_preview"}]);
        }

        if let Some(output_schema) = request.output_schema {
            payload["text"] = json!({
                "format": {
                    "type": "json_schema",
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
            &format!("{}/responses", self.base_url),
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
    fn extracts_output_text_across_message_parts() {
        let raw = json!({
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Hello "},
                    {"type": "output_text", "text": "world"}
                ]}
            ]
        });
        assert_eq!(OpenAiAdapter::extract_text(&raw).as_deref(), Some("Hello world"));
    }

    #[test]
    fn payload_without_output_text_is_not_a_result() {
        assert_eq!(OpenAiAdapter::extract_text(&json!({})), None);
        assert_eq!(
            OpenAiAdapter::extract_text(&json!({"output": [{"type": "reasoning"}]})),
            None
        );
    }

    #[test]
    fn drops_annotations_without_url_or_title() {
        let raw = json!({
            "output": [{"type": "message", "content": [{
                "type": "output_text",
                "text": "cited",
                "annotations": [
                    {"url": "https://example.com", "title": "Example", "start_index": 1, "end_index": 5},
                    {"type": "file_citation"}
                ]
            }]}]
        });
        let citations = OpenAiAdapter::extract_citations(&raw);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].url.as_deref(), Some("https://example.com"));
        assert_eq!(citations[0].provider, "openai");
        assert_eq!(citations[0].start_index, Some(1));
    }
}
