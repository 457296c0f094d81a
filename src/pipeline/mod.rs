//! Triage pipeline.
//!
//! Every run flows through:
//! 1. `MailStore::fetch_recent()`: store-specific I/O
//! 2. `mail::codec::decode_batch()`: transport string → messages
//! 3. `Classifier::classify()`: LLM verdict per message
//! 4. `MailStore::apply_label()`: marker written back, keyed by id

pub mod classifier;
pub mod processor;
pub mod types;

pub use classifier::{Classifier, LlmClassifier};
pub use processor::{ProcessorConfig, TriageProcessor};
pub use types::{Classification, Label, LabelMapping, Message, RunSummary};
