//! # Uniprompt - One Entry Point Over Many LLM Providers
//!
//! Uniprompt routes a prompt (and optional file attachments) to interchangeable
//! LLM providers behind a single `run_prompt` call. Callers name a model, a
//! provider alias, or nothing at all; resolution, credentials, attachment
//! handling, and response normalization are the library's job.
//!
#![deny(unsafe_code)]
//!
//! ## Features
//!
//! - **Model resolution**: alias, known-model table, and heuristic fallback
//!   map any reasonable identifier to its owning provider.
//! - **Uniform adapters**: one trait per seam; every provider returns the
//!   same normalized response and citation shapes.
//! - **File context**: attachments are uploaded natively where the provider
//!   supports it, or extracted to text (PDF, DOCX, DOC, RTF, Markdown, JSON,
//!   plain text) and folded into the prompt otherwise.
//! - **Structured output**: supply a JSON Schema and get back a validated
//!   JSON value instead of free text.
//! - **Stable return shape**: requesting citations always yields a
//!   `(result, citations)` pair, even when the list is empty.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use uniprompt::{Config, PromptRequest, Uniprompt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), uniprompt::PromptError> {
//!     let client = Uniprompt::new(Config::default());
//!
//!     let request = PromptRequest::new("Summarize the attached report")
//!         .model("claude-opus-4-6")
//!         .file("report.pdf");
//!
//!     let output = client.run_prompt(request).await?;
//!     if let Some(text) = output.result().as_text() {
//!         println!("{text}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod files;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
mod retry;
pub mod schema;
pub mod types;

pub use adapters::{AdapterContext, AdapterRequest, Capabilities, ProviderAdapter};
pub use config::{Config, ProviderConfig};
pub use error::PromptError;
pub use files::{FileFormat, FileSource, FileSpec, FileWarning, PreparedContext};
pub use orchestrator::{PromptRequest, Uniprompt};
pub use resolver::resolve;
pub use types::{
    AdapterResponse, Citation, PromptInput, PromptResult, PromptReturn, ResolvedTarget,
};
