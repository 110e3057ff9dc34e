//! Explicit configuration for provider credentials and defaults.
//!
//! The configuration is a plain value constructed once at process start and
//! passed by reference into resolution and adapter construction. Nothing in
//! the core reaches into ambient global state mid-call. A JSON file loader
//! is provided for convenience; host applications are equally free to build
//! the value themselves.

use std::collections::HashMap;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::PromptError;
use crate::registry;

/// Per-provider settings. All fields are optional; credentials fall back to
/// the provider's environment variable chain.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key. Held as a secret so it never appears in logs or errors.
    pub api_key: Option<SecretString>,
    /// Model used when the caller names the provider (or nothing) instead of
    /// a concrete model. Overrides the registry default.
    pub default_model: Option<String>,
    /// Endpoint override, mainly for proxies and tests.
    pub base_url: Option<String>,
    /// Token ceiling for providers that require one (Anthropic).
    pub max_tokens: Option<u32>,
    /// Opt in to a single bounded retry for transient adapter failures.
    pub retry_transient: bool,
    /// Provider-specific request options merged into the outgoing payload.
    pub extra_options: Option<serde_json::Value>,
}

/// Resolved configuration consumed by the resolver and adapter factories.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider preference order used when no model is requested. Falls back
    /// to the built-in order when empty.
    pub defaults: Vec<String>,
    /// Provider key (canonical or alias) to settings.
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Load configuration from a JSON file shaped like
    /// `{"defaults": [...], "providers": {"openai": {"api_key": ...}}}`.
    ///
    /// Provider keys and default entries may use aliases (`chatgpt`, `xai`,
    /// `anthropic`, ...); they are canonicalized here so the rest of the
    /// core only ever sees canonical keys.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PromptError::Configuration(format!("cannot read settings file {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            PromptError::Configuration(format!("invalid settings file {}: {e}", path.display()))
        })?;
        Ok(config.canonicalized())
    }

    /// Rewrite provider keys and default entries to canonical provider keys.
    pub fn canonicalized(self) -> Self {
        let mut providers = HashMap::with_capacity(self.providers.len());
        for (key, value) in self.providers {
            let canonical = registry::canonical_provider_key(&key)
                .map(str::to_string)
                .unwrap_or_else(|| key.trim().to_lowercase());
            providers.insert(canonical, value);
        }

        let mut defaults: Vec<String> = Vec::with_capacity(self.defaults.len());
        for entry in self.defaults {
            let canonical = registry::canonical_provider_key(&entry)
                .map(str::to_string)
                .unwrap_or_else(|| entry.trim().to_lowercase());
            if !defaults.contains(&canonical) {
                defaults.push(canonical);
            }
        }

        Self { defaults, providers }
    }

    pub fn provider(&self, key: &str) -> Option<&ProviderConfig> {
        self.providers.get(key)
    }

    /// Default-provider preference order: configured entries first, the
    /// built-in order when none are configured.
    pub fn default_provider_order(&self) -> Vec<&str> {
        if self.defaults.is_empty() {
            registry::DEFAULT_PROVIDER_ORDER.to_vec()
        } else {
            self.defaults.iter().map(String::as_str).collect()
        }
    }

    /// Configured default model for a provider, if any.
    pub fn default_model(&self, provider: &str) -> Option<&str> {
        self.provider(provider)
            .and_then(|p| p.default_model.as_deref())
    }

    /// Resolve the API key for a provider: explicit config value first, then
    /// the provider's environment variable chain (primary, then aliases).
    pub fn api_key(&self, provider: &str) -> Option<SecretString> {
        if let Some(key) = self.provider(provider).and_then(|p| p.api_key.as_ref()) {
            if !key.expose_secret().is_empty() {
                return Some(SecretString::from(key.expose_secret().to_string()));
            }
        }

        let record = registry::find(provider)?;
        for env_key in record.env_keys {
            if let Ok(value) = std::env::var(env_key) {
                if !value.is_empty() {
                    return Some(SecretString::from(value));
                }
            }
        }
        None
    }

    /// Whether a usable credential exists for the provider.
    pub fn has_credentials(&self, provider: &str) -> bool {
        self.api_key(provider).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from_json(json: serde_json::Value) -> Config {
        let config: Config = serde_json::from_value(json).unwrap();
        config.canonicalized()
    }

    #[test]
    fn provider_keys_are_canonicalized_on_load() {
        let config = config_from_json(serde_json::json!({
            "defaults": ["openai", "gemini"],
            "providers": {
                "chatgpt": {"default_model": "gpt-5-mini"},
                "anthropic": {"default_model": "claude-sonnet-4-5-20250929"},
                "xai": {"default_model": "grok-4-latest"}
            }
        }));

        assert_eq!(config.defaults[..2], ["openai".to_string(), "gemini".to_string()]);
        assert_eq!(config.default_model("openai"), Some("gpt-5-mini"));
        assert_eq!(
            config.default_model("claude"),
            Some("claude-sonnet-4-5-20250929")
        );
        assert_eq!(config.default_model("grok"), Some("grok-4-latest"));
    }

    #[test]
    fn empty_defaults_fall_back_to_builtin_order() {
        let config = Config::default();
        assert_eq!(
            config.default_provider_order(),
            vec!["gemini", "openai", "claude", "grok", "perplexity"]
        );
    }

    #[test]
    fn explicit_api_key_wins_over_environment() {
        let config = config_from_json(serde_json::json!({
            "providers": {"openai": {"api_key": "sk-from-config"}}
        }));
        let key = config.api_key("openai").unwrap();
        assert_eq!(key.expose_secret(), "sk-from-config");
    }

    // Process-wide lock for tests that touch environment variables.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Restores an environment variable to its captured value on drop.
    struct RestoreEnv(&'static str, Option<String>);

    impl RestoreEnv {
        fn capture(key: &'static str) -> Self {
            Self(key, std::env::var(key).ok())
        }
    }

    impl Drop for RestoreEnv {
        fn drop(&mut self) {
            match &self.1 {
                Some(value) => std::env::set_var(self.0, value),
                None => std::env::remove_var(self.0),
            }
        }
    }

    #[test]
    fn grok_credentials_fall_back_to_alias_env_var() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _xai = RestoreEnv::capture("XAI_API_KEY");
        let _grok = RestoreEnv::capture("GROK_API_KEY");
        std::env::remove_var("XAI_API_KEY");
        std::env::set_var("GROK_API_KEY", "grok-test-key");

        let config = config_from_json(serde_json::json!({
            "providers": {"grok": {}}
        }));
        let key = config.api_key("grok").unwrap();
        assert_eq!(key.expose_secret(), "grok-test-key");
    }
}
