//! Static provider registry.
//!
//! One record per supported provider: canonical key, caller-facing aliases,
//! declared capabilities, built-in default model, credential environment
//! chain, and the adapter factory. The table is process-wide, read-only and
//! safe for concurrent reads; there is no dynamic registration at call time.

use crate::adapters::{
    AdapterFactory, AnthropicAdapter, Capabilities, GeminiAdapter, OpenAiAdapter,
    PerplexityAdapter, XaiAdapter,
};
use crate::files::FileFormat;

/// Hard-coded fallback preference order used when the configuration does not
/// name default providers.
pub const DEFAULT_PROVIDER_ORDER: &[&str] = &["gemini", "openai", "claude", "grok", "perplexity"];

/// Unified provider record maintained by the registry.
pub struct ProviderRecord {
    /// Canonical lowercase provider key.
    pub key: &'static str,
    /// Caller-facing synonyms that resolve to this provider.
    pub aliases: &'static [&'static str],
    pub capabilities: Capabilities,
    /// Model used when the caller names the provider instead of a model and
    /// the configuration does not override it.
    pub default_model: &'static str,
    /// Credential environment variables, primary first.
    pub env_keys: &'static [&'static str],
    pub(crate) factory: AdapterFactory,
}

static PROVIDERS: [ProviderRecord; 5] = [
    ProviderRecord {
        key: "openai",
        aliases: &["chatgpt", "oai"],
        capabilities: Capabilities {
            search: true,
            binary_upload: &[FileFormat::Pdf],
        },
        default_model: "gpt-5.2",
        env_keys: &["OPENAI_API_KEY"],
        factory: OpenAiAdapter::create,
    },
    ProviderRecord {
        key: "gemini",
        aliases: &["google"],
        capabilities: Capabilities {
            search: true,
            binary_upload: &[
                FileFormat::Pdf,
                FileFormat::Txt,
                FileFormat::Md,
                FileFormat::Json,
            ],
        },
        default_model: "gemini-3-pro-preview",
        env_keys: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        factory: GeminiAdapter::create,
    },
    ProviderRecord {
        key: "claude",
        aliases: &["anthropic"],
        capabilities: Capabilities {
            search: true,
            binary_upload: &[],
        },
        default_model: "claude-opus-4-6",
        env_keys: &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
        factory: AnthropicAdapter::create,
    },
    ProviderRecord {
        key: "grok",
        aliases: &["xai"],
        capabilities: Capabilities {
            search: false,
            binary_upload: &[],
        },
        default_model: "grok-4",
        env_keys: &["XAI_API_KEY", "GROK_API_KEY"],
        factory: XaiAdapter::create,
    },
    ProviderRecord {
        key: "perplexity",
        aliases: &["pplx"],
        capabilities: Capabilities {
            search: true,
            binary_upload: &[],
        },
        default_model: "sonar-pro",
        env_keys: &["PERPLEXITY_API_KEY", "PPLX_API_KEY"],
        factory: PerplexityAdapter::create,
    },
];

/// All registered providers, in registration order.
pub fn providers() -> &'static [ProviderRecord] {
    &PROVIDERS
}

/// Look up a record by canonical key.
pub fn find(key: &str) -> Option<&'static ProviderRecord> {
    PROVIDERS.iter().find(|record| record.key == key)
}

/// Resolve a provider key or alias (case-insensitive) to the canonical key.
pub fn canonical_provider_key(name: &str) -> Option<&'static str> {
    let needle = name.trim().to_lowercase();
    PROVIDERS
        .iter()
        .find(|record| record.key == needle || record.aliases.contains(&needle.as_str()))
        .map(|record| record.key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_resolves_to_its_canonical_key() {
        for (alias, key) in [
            ("chatgpt", "openai"),
            ("oai", "openai"),
            ("google", "gemini"),
            ("anthropic", "claude"),
            ("xai", "grok"),
            ("pplx", "perplexity"),
        ] {
            assert_eq!(canonical_provider_key(alias), Some(key));
        }
    }

    #[test]
    fn canonical_lookup_is_case_insensitive() {
        assert_eq!(canonical_provider_key("ChatGPT"), Some("openai"));
        assert_eq!(canonical_provider_key(" XAI "), Some("grok"));
        assert_eq!(canonical_provider_key("unknown"), None);
    }

    #[test]
    fn default_order_names_only_registered_providers() {
        for key in DEFAULT_PROVIDER_ORDER {
            assert!(find(key).is_some(), "{key} missing from registry");
        }
    }

    #[test]
    fn exactly_one_provider_lacks_search_capability() {
        let non_search: Vec<&str> = providers()
            .iter()
            .filter(|record| !record.capabilities.search)
            .map(|record| record.key)
            .collect();
        assert_eq!(non_search, vec!["grok"]);
    }
}
