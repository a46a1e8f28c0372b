//! Question answering workflow for askroute.
//!
//! A question is routed either to the documents (retrieval-augmented
//! answer over the knowledge base snapshot) or to the relational store
//! (write a read-only query, execute it, summarize the result).
//! `QaService` ties ingestion, rebuilds and `ask` together.

pub mod engine;
pub mod executor;
pub mod prompts;
pub mod rag;
pub mod router;
pub mod service;
pub mod sql;
pub mod state;

#[cfg(test)]
mod tests;

pub use engine::WorkflowEngine;
pub use executor::{QueryExecutor, SqliteExecutor, UnconfiguredExecutor};
pub use prompts::PromptSet;
pub use rag::{RagAnswer, RagPath};
pub use router::{parse_decision, Router};
pub use service::{parse_metadata, Components, QaService};
pub use sql::{clean_query, ensure_read_only, SqlPath};
pub use state::{Answer, Decision, PipelineState, Step};
