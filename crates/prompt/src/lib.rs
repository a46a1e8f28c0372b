//! Prompt system for askroute.
//!
//! This crate provides structured prompt management with:
//! - Built-in YAML prompt definitions for routing, answering and query writing
//! - Workspace overrides under `.askroute/prompts/`
//! - Strict Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{
    list_prompts, load_builtin, load_prompt, RAG_ANSWER, ROUTER_DECIDE, SQL_ANSWER, SQL_WRITE,
};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec, PromptSource};
