//! Cross-module tests for indexing, merging and retrieval.

mod fixture;
