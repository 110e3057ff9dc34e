//! Shared data types for the orchestration core.

use serde::Serialize;

/// Normalized citation shape returned to callers.
///
/// Produced only by adapter normalization code and never mutated afterwards.
/// Malformed provider citation entries are dropped during normalization, not
/// surfaced as errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Citation {
    /// Canonical key of the provider that produced this citation.
    pub provider: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub snippet: Option<String>,
    pub citation_id: Option<String>,
    pub start_index: Option<u64>,
    pub end_index: Option<u64>,
    /// Original provider payload for this citation, for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl Citation {
    /// A citation with only the provider key set; callers fill in fields.
    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Self::default()
        }
    }
}

/// Normalized envelope every adapter must produce.
#[derive(Debug, Clone, Default)]
pub struct AdapterResponse {
    /// Result text as produced by the provider.
    pub text: String,
    /// Normalized citations. Empty when none were requested or returned,
    /// never "missing".
    pub citations: Vec<Citation>,
    /// Opaque provider payload for diagnostics.
    pub raw: Option<serde_json::Value>,
}

/// Output of model/provider resolution: the concrete pair for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Canonical lowercase provider key, a member of the static registry.
    pub provider_key: &'static str,
    /// Concrete model string to send to the provider. Non-empty: either the
    /// caller's input verbatim, a known-model hit, or the provider default.
    pub model_id: String,
}

/// Caller-supplied prompt: a single string or a list of turns.
#[derive(Debug, Clone)]
pub enum PromptInput {
    Text(String),
    Turns(Vec<String>),
}

impl PromptInput {
    /// Collapse supported prompt shapes into a single string.
    ///
    /// Turn lists are joined with numbered `Turn N:` prefixes so the
    /// provider sees one deterministic prompt.
    pub fn normalize(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Turns(turns) => turns
                .iter()
                .enumerate()
                .map(|(idx, turn)| format!("Turn {}: {}", idx + 1, turn))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Turns(turns) => turns.iter().all(|turn| turn.trim().is_empty()),
        }
    }
}

impl From<String> for PromptInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for PromptInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for PromptInput {
    fn from(turns: Vec<String>) -> Self {
        Self::Turns(turns)
    }
}

/// Result payload: plain text, or a validated structured value when an
/// output schema was supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptResult {
    Text(String),
    Structured(serde_json::Value),
}

impl PromptResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Text(_) => None,
            Self::Structured(value) => Some(value),
        }
    }
}

/// Shaped return value of `run_prompt`.
///
/// The shape depends only on whether the caller requested citations, never
/// on whether the provider happened to return any: `return_citations = false`
/// always yields `Result`, `return_citations = true` always yields
/// `WithCitations` (with an empty vec when the provider returned none).
#[derive(Debug, Clone)]
pub enum PromptReturn {
    Result(PromptResult),
    WithCitations(PromptResult, Vec<Citation>),
}

impl PromptReturn {
    pub fn result(&self) -> &PromptResult {
        match self {
            Self::Result(result) | Self::WithCitations(result, _) => result,
        }
    }

    pub fn citations(&self) -> Option<&[Citation]> {
        match self {
            Self::Result(_) => None,
            Self::WithCitations(_, citations) => Some(citations),
        }
    }
}
