//! Model/provider resolution.
//!
//! Maps a caller-supplied model identifier (or none) to a concrete
//! (provider, model) pair. Ordered, first match wins:
//!
//! 1. no model → default provider from the configured preference order
//!    (providers with credentials preferred), with its default model;
//! 2. exact provider alias (case-insensitive) → that provider's default
//!    model; aliases are authoritative and outrank everything below;
//! 3. known-model table hit → owning provider, model id unchanged;
//! 4. heuristic substring fallback → best-effort owner guess, model id
//!    unchanged;
//! 5. otherwise the identifier is unresolvable.
//!
//! `require_search` additionally gates on the resolved provider's declared
//! search capability.

use crate::config::Config;
use crate::error::PromptError;
use crate::registry;
use crate::types::ResolvedTarget;

/// Known model ids from official provider model docs as of 2026-02-06.
static MODEL_PROVIDER_MAP: &[(&str, &str)] = &[
    // OpenAI
    ("gpt-5.2", "openai"),
    ("gpt-5.2-mini", "openai"),
    ("gpt-5.2-nano", "openai"),
    ("gpt-5.2-pro", "openai"),
    ("gpt-5.2-chat-latest", "openai"),
    ("gpt-5", "openai"),
    ("gpt-5-chat-latest", "openai"),
    ("gpt-5-mini", "openai"),
    ("gpt-5-nano", "openai"),
    ("gpt-4.1-nano", "openai"),
    ("gpt-4.1", "openai"),
    ("gpt-4.1-mini", "openai"),
    ("gpt-4o", "openai"),
    ("gpt-4o-mini", "openai"),
    ("o4-mini", "openai"),
    ("o4-mini-deep-research", "openai"),
    ("o3", "openai"),
    ("o3-pro", "openai"),
    ("o3-mini", "openai"),
    ("o1", "openai"),
    ("gpt-image-1", "openai"),
    ("gpt-image-1-mini", "openai"),
    ("computer-use-preview", "openai"),
    ("codex-mini-latest", "openai"),
    // Gemini
    ("gemini-3-pro", "gemini"),
    ("gemini-3-pro-preview", "gemini"),
    ("gemini-3-flash-preview", "gemini"),
    ("gemini-3-flash-lite-preview", "gemini"),
    ("gemini-2.5-pro", "gemini"),
    ("gemini-2.5-pro-preview-tts", "gemini"),
    ("gemini-2.5-flash", "gemini"),
    ("gemini-2.5-flash-preview-native-audio-dialog", "gemini"),
    ("gemini-2.5-flash-lite", "gemini"),
    ("gemini-2.0-flash", "gemini"),
    ("gemini-2.0-flash-preview-image-generation", "gemini"),
    ("gemini-2.0-flash-lite", "gemini"),
    ("gemini-embedding-001", "gemini"),
    ("text-embedding-005", "gemini"),
    ("veo-3.1-generate-preview", "gemini"),
    ("veo-3.0-generate-preview", "gemini"),
    // Anthropic Claude
    ("claude-opus-4-6", "claude"),
    ("claude-opus-4-6-20260115", "claude"),
    ("claude-sonnet-4-5", "claude"),
    ("claude-opus-4-1-20250805", "claude"),
    ("claude-opus-4-20250514", "claude"),
    ("claude-haiku-4-5", "claude"),
    ("claude-haiku-4-5-20251001", "claude"),
    ("claude-sonnet-4-5-20250929", "claude"),
    ("claude-sonnet-4-20250514", "claude"),
    ("claude-haiku-3-5-20241022", "claude"),
    ("claude-3-7-sonnet-20250219", "claude"),
    // xAI Grok
    ("grok-4-1-fast-reasoning", "grok"),
    ("grok-4-0709", "grok"),
    ("grok-4", "grok"),
    ("grok-4-fast", "grok"),
    ("grok-4-fast-reasoning", "grok"),
    ("grok-4-fast-reasoning-latest", "grok"),
    ("grok-4-fast-non-reasoning", "grok"),
    ("grok-4-fast-non-reasoning-latest", "grok"),
    ("grok-4-1-fast", "grok"),
    ("grok-4-1-fast-reasoning-latest", "grok"),
    ("grok-4-1-fast-non-reasoning", "grok"),
    ("grok-4-1-fast-non-reasoning-latest", "grok"),
    ("grok-3", "grok"),
    ("grok-3-latest", "grok"),
    ("grok-3-fast", "grok"),
    ("grok-3-fast-latest", "grok"),
    ("grok-3-mini", "grok"),
    ("grok-3-mini-fast", "grok"),
    ("grok-3-mini-fast-latest", "grok"),
    ("grok-code-fast-1", "grok"),
    // Perplexity
    ("fast-search", "perplexity"),
    ("pro-search", "perplexity"),
    ("deep-research", "perplexity"),
    ("sonar", "perplexity"),
    ("sonar-pro", "perplexity"),
    ("sonar-reasoning", "perplexity"),
    ("sonar-reasoning-pro", "perplexity"),
    ("sonar-deep-research", "perplexity"),
    ("r1-1776", "perplexity"),
    ("openai/o4-mini", "perplexity"),
    ("openai/gpt-4.1", "perplexity"),
    ("xai/grok-4-1", "perplexity"),
];

/// Ordered substring hints for the heuristic fallback. First match wins;
/// the order is part of the documented behavior.
static PROVIDER_HINTS: &[(&str, &str)] = &[
    ("openai", "openai"),
    ("gpt", "openai"),
    ("o3", "openai"),
    ("o4", "openai"),
    ("gemini", "gemini"),
    ("claude", "claude"),
    ("anthropic", "claude"),
    ("grok", "grok"),
    ("xai", "grok"),
    ("perplexity", "perplexity"),
    ("sonar", "perplexity"),
];

/// The full known-model table, exposed so tests can pin every mapping.
pub fn known_models() -> &'static [(&'static str, &'static str)] {
    MODEL_PROVIDER_MAP
}

fn known_model_owner(model_lower: &str) -> Option<&'static str> {
    MODEL_PROVIDER_MAP
        .iter()
        .find(|(model, _)| *model == model_lower)
        .map(|(_, provider)| *provider)
}

fn heuristic_owner(model_lower: &str) -> Option<&'static str> {
    PROVIDER_HINTS
        .iter()
        .find(|(token, _)| model_lower.contains(token))
        .map(|(_, provider)| *provider)
}

/// Default model for a provider: configuration override, else the
/// registry's documented default.
fn default_model(config: &Config, provider: &'static str) -> String {
    if let Some(model) = config.default_model(provider) {
        return model.to_string();
    }
    registry::find(provider)
        .map(|record| record.default_model.to_string())
        .unwrap_or_default()
}

/// First provider in the preference order with credentials; when none has
/// credentials, the first registered entry still wins and the missing key
/// surfaces later as a configuration error at adapter construction.
fn select_default_provider(config: &Config) -> Result<&'static str, PromptError> {
    let order = config.default_provider_order();
    let mut first_registered: Option<&'static str> = None;

    for entry in &order {
        let Some(key) = registry::canonical_provider_key(entry) else {
            continue;
        };
        first_registered.get_or_insert(key);
        if config.has_credentials(key) {
            return Ok(key);
        }
    }

    first_registered.ok_or_else(|| {
        PromptError::Resolution(format!(
            "no registered provider among configured defaults: {}",
            order.join(", ")
        ))
    })
}

/// Resolve canonical provider + model from caller input and configuration.
pub fn resolve(
    config: &Config,
    model: Option<&str>,
    require_search: bool,
) -> Result<ResolvedTarget, PromptError> {
    let requested = model.map(str::trim).filter(|m| !m.is_empty());

    let target = match requested {
        None => {
            let provider_key = select_default_provider(config)?;
            ResolvedTarget {
                provider_key,
                model_id: default_model(config, provider_key),
            }
        }
        Some(requested) => {
            let requested_lower = requested.to_lowercase();

            if let Some(provider_key) = registry::canonical_provider_key(&requested_lower) {
                ResolvedTarget {
                    provider_key,
                    model_id: default_model(config, provider_key),
                }
            } else if let Some(provider_key) = known_model_owner(&requested_lower) {
                ResolvedTarget {
                    provider_key,
                    model_id: requested.to_string(),
                }
            } else if let Some(provider_key) = heuristic_owner(&requested_lower) {
                ResolvedTarget {
                    provider_key,
                    model_id: requested.to_string(),
                }
            } else {
                return Err(PromptError::Resolution(requested.to_string()));
            }
        }
    };

    if require_search {
        let record = registry::find(target.provider_key).ok_or_else(|| {
            PromptError::Resolution(target.provider_key.to_string())
        })?;
        if !record.capabilities.search {
            return Err(PromptError::UnsupportedCapability {
                provider: target.provider_key.to_string(),
                capability: "search/citation retrieval".to_string(),
            });
        }
    }

    Ok(target)
}
