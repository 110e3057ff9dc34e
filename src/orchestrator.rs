//! Request orchestration: the `run_prompt` core.
//!
//! State-free per call. Each invocation resolves the target provider,
//! prepares attachments/context, invokes the adapter (with an optional
//! single bounded retry), validates structured output, and shapes the
//! return value. The only cross-call state is the immutable registry and
//! a per-provider adapter cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;

use crate::adapters::{AdapterContext, AdapterRequest, ProviderAdapter};
use crate::config::Config;
use crate::error::PromptError;
use crate::files::{self, FileSpec};
use crate::registry;
use crate::resolver;
use crate::retry::{self, RetryPolicy};
use crate::schema;
use crate::types::{PromptInput, PromptResult, PromptReturn};

/// One `run_prompt` invocation, built fluently.
///
/// ```no_run
/// use uniprompt::{Config, PromptRequest, Uniprompt};
///
/// # async fn example() -> Result<(), uniprompt::PromptError> {
/// let client = Uniprompt::new(Config::default());
/// let request = PromptRequest::new("Find recent Rust release notes")
///     .model("perplexity")
///     .require_search(true)
///     .return_citations(true);
/// let output = client.run_prompt(request).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PromptRequest {
    prompt: PromptInput,
    model: Option<String>,
    require_search: bool,
    return_citations: bool,
    file: Option<FileSpec>,
    files: Vec<FileSpec>,
    binary_files: bool,
    output_schema: Option<Value>,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<PromptInput>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            require_search: false,
            return_citations: false,
            file: None,
            files: Vec::new(),
            binary_files: false,
            output_schema: None,
        }
    }

    /// Model identifier: a concrete model id, a provider alias, or anything
    /// the resolver's heuristics recognize.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Require the resolved provider to support search/citation retrieval.
    pub fn require_search(mut self, require_search: bool) -> Self {
        self.require_search = require_search;
        self
    }

    /// Switch the return shape to `(result, citations)`.
    pub fn return_citations(mut self, return_citations: bool) -> Self {
        self.return_citations = return_citations;
        self
    }

    /// Attach a single file.
    pub fn file(mut self, file: impl Into<FileSpec>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach several files; order is preserved in the prepared context.
    pub fn files<I, F>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FileSpec>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    /// Prefer native binary upload for formats the provider accepts.
    pub fn binary_files(mut self, binary_files: bool) -> Self {
        self.binary_files = binary_files;
        self
    }

    /// JSON Schema the result must validate against; switches the result
    /// payload to a structured value.
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Unified client over all registered providers.
///
/// Holds the configuration and a per-provider adapter cache. Adapters are
/// stateless beyond their credential, so cached instances are safe for
/// concurrent reuse across calls and tasks.
pub struct Uniprompt {
    config: Config,
    http_client: reqwest::Client,
    adapters: Mutex<HashMap<&'static str, Arc<dyn ProviderAdapter>>>,
}

impl Uniprompt {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            adapters: Mutex::new(HashMap::new()),
        }
    }

    /// Cached adapter for a canonical provider key. Construction is deferred
    /// to first use and fails fast with `Configuration` when no credential
    /// can be resolved.
    fn adapter_for(&self, provider_key: &'static str) -> Result<Arc<dyn ProviderAdapter>, PromptError> {
        let record = registry::find(provider_key)
            .ok_or_else(|| PromptError::Resolution(provider_key.to_string()))?;

        {
            let cache = lock_unpoisoned(&self.adapters);
            if let Some(adapter) = cache.get(provider_key) {
                return Ok(adapter.clone());
            }
        }

        let api_key = self.config.api_key(provider_key).ok_or_else(|| {
            PromptError::Configuration(format!(
                "no API key for provider '{provider_key}'; set {} or providers.{provider_key}.api_key",
                record.env_keys.join(" / "),
            ))
        })?;

        let provider_config = self.config.provider(provider_key);
        let context = AdapterContext {
            api_key,
            base_url: provider_config.and_then(|p| p.base_url.clone()),
            max_tokens: provider_config.and_then(|p| p.max_tokens),
            extra_options: provider_config.and_then(|p| p.extra_options.clone()),
            http_client: self.http_client.clone(),
        };
        let adapter = (record.factory)(context)?;

        let mut cache = lock_unpoisoned(&self.adapters);
        Ok(cache.entry(provider_key).or_insert(adapter).clone())
    }

    /// Execute one prompt end to end.
    ///
    /// Return shape depends only on `return_citations`: `PromptReturn::Result`
    /// when false, `PromptReturn::WithCitations` when true, even when the
    /// citation list is empty.
    pub async fn run_prompt(&self, request: PromptRequest) -> Result<PromptReturn, PromptError> {
        if request.prompt.is_empty() {
            return Err(PromptError::InvalidArgument("prompt must not be empty".into()));
        }

        let target = resolver::resolve(
            &self.config,
            request.model.as_deref(),
            request.require_search,
        )?;
        let record = registry::find(target.provider_key)
            .ok_or_else(|| PromptError::Resolution(target.provider_key.to_string()))?;

        let adapter = self.adapter_for(target.provider_key)?;

        let specs = files::collect_specs(request.file, request.files);
        let prepared = files::prepare(specs, request.binary_files, &record.capabilities)?;

        let mut prompt = request.prompt.normalize();
        if let Some(context_text) = &prepared.context_text {
            prompt.push_str("\n\n");
            prompt.push_str(context_text);
        }

        tracing::debug!(
            provider = target.provider_key,
            model = %target.model_id,
            require_search = request.require_search,
            return_citations = request.return_citations,
            attachments = prepared.attachments.len(),
            warnings = prepared.warnings.len(),
            "run_prompt start"
        );

        let policy = if self
            .config
            .provider(target.provider_key)
            .is_some_and(|p| p.retry_transient)
        {
            RetryPolicy::single()
        } else {
            RetryPolicy::none()
        };

        let started = Instant::now();
        let response = retry::run_with_retry(policy, || {
            adapter.run(AdapterRequest {
                prompt: &prompt,
                model: &target.model_id,
                require_search: request.require_search,
                return_citations: request.return_citations,
                context: &prepared,
                output_schema: request.output_schema.as_ref(),
            })
        })
        .await?;

        tracing::info!(
            provider = target.provider_key,
            model = %target.model_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            citations = response.citations.len(),
            "run_prompt end"
        );

        let result = match &request.output_schema {
            Some(output_schema) => {
                PromptResult::Structured(schema::coerce_output(&response.text, output_schema)?)
            }
            None => PromptResult::Text(response.text),
        };

        if request.return_citations {
            Ok(PromptReturn::WithCitations(result, response.citations))
        } else {
            Ok(PromptReturn::Result(result))
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_resolution() {
        let client = Uniprompt::new(Config::default());
        let err = client
            .run_prompt(PromptRequest::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unresolvable_model_surfaces_resolution_error() {
        let client = Uniprompt::new(Config::default());
        let err = client
            .run_prompt(PromptRequest::new("hi").model("totally-unknown-xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::Resolution(_)));
    }

    #[tokio::test]
    async fn search_on_non_capable_provider_is_rejected_before_any_call() {
        let client = Uniprompt::new(Config::default());
        let err = client
            .run_prompt(PromptRequest::new("hi").model("grok-4").require_search(true))
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::UnsupportedCapability { .. }));
    }
}
