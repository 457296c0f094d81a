//! Command-line flags. Each flag overrides the matching environment variable.

use std::collections::HashMap;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "mail-triage")]
#[command(version, about = "Classify recent inbox mail with an LLM and flag it in Apple Mail")]
pub struct Cli {
    /// Fetch messages received within this many hours.
    #[arg(long)]
    pub window_hours: Option<u64>,
    /// Newest messages to take if the mail store can't filter by date.
    #[arg(long)]
    pub fallback_count: Option<usize>,
    /// Classification calls allowed in flight at once.
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Classify and log, but don't touch any flags.
    #[arg(long)]
    pub dry_run: bool,
    /// Model name passed to the LLM backend.
    #[arg(long)]
    pub model: Option<String>,
    /// LLM backend: openai or anthropic.
    #[arg(long)]
    pub backend: Option<String>,
}

impl Cli {
    /// Flags as environment-variable overrides.
    pub fn overrides(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        if let Some(hours) = self.window_hours {
            vars.insert("TRIAGE_WINDOW_HOURS", hours.to_string());
        }
        if let Some(count) = self.fallback_count {
            vars.insert("TRIAGE_FALLBACK_COUNT", count.to_string());
        }
        if let Some(concurrency) = self.concurrency {
            vars.insert("TRIAGE_CONCURRENCY", concurrency.to_string());
        }
        if self.dry_run {
            vars.insert("TRIAGE_DRY_RUN", "true".to_string());
        }
        if let Some(model) = &self.model {
            vars.insert("TRIAGE_MODEL", model.clone());
        }
        if let Some(backend) = &self.backend {
            vars.insert("TRIAGE_BACKEND", backend.clone());
        }
        vars
    }
}
