//! Mail triage: classify recent inbox mail with an LLM and flag it.

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
