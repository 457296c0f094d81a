use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use mail_triage::cli::Cli;
use mail_triage::config::TriageConfig;
use mail_triage::llm::create_provider;
use mail_triage::mail::AppleMailStore;
use mail_triage::pipeline::{LlmClassifier, TriageProcessor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    let overrides = cli.overrides();
    let config = TriageConfig::from_lookup(|key| {
        overrides
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    })?;

    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📬 Mail Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {} ({})", config.llm.backend, config.llm.model);
    eprintln!("   Window: last {}h", config.window.as_secs() / 3600);
    eprintln!("   Concurrency: {}", config.concurrency);
    if config.dry_run {
        eprintln!("   Dry run: labels will not be applied");
    }
    eprintln!();

    let llm = create_provider(&config.llm)?;
    let classifier = Arc::new(LlmClassifier::new(llm, config.user_bio.clone()));
    let store = Arc::new(AppleMailStore::new(
        config.apple_mail_config(),
        config.bridge_timeout,
    ));
    let processor = TriageProcessor::new(store, classifier, config.processor_config());

    let summary = processor.run().await?;

    eprintln!(
        "\nProcessed and labeled {} of {} fetched emails ({} skipped, {} label failures) in {}s.",
        summary.processed,
        summary.fetched,
        summary.skipped,
        summary.label_failures,
        (summary.finished_at - summary.started_at).num_seconds()
    );

    Ok(())
}

/// Log to stderr, plus a daily-rolling file when a log directory is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mail-triage.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}
