//! Triage processor: drives one fetch → classify → label run.
//!
//! Flow:
//! 1. Fetch a transport batch from the mail store and decode it
//! 2. Classify each message independently
//! 3. Write the mapped marker back to the store
//! 4. Report fetched / processed / skipped counts
//!
//! Only a fetch failure aborts the run. Classification calls may run
//! concurrently (bounded), but label writes are always issued one at a time
//! in decode order.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ClassifyError, TriageError};
use crate::mail::codec::decode_batch;
use crate::mail::store::MailStore;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::types::{Classification, LabelMapping, Message, RunSummary};

/// Processor settings, passed in explicitly at construction.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// How far back to fetch.
    pub window: Duration,
    /// Max in-flight classification calls; 1 means strictly sequential.
    pub concurrency: usize,
    /// Classify but never write labels.
    pub dry_run: bool,
    pub labels: LabelMapping,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(24 * 60 * 60),
            concurrency: 1,
            dry_run: false,
            labels: LabelMapping::default(),
        }
    }
}

/// Triage processor over a mail store and a classifier.
pub struct TriageProcessor {
    store: Arc<dyn MailStore>,
    classifier: Arc<dyn Classifier>,
    config: ProcessorConfig,
}

impl TriageProcessor {
    pub fn new(
        store: Arc<dyn MailStore>,
        classifier: Arc<dyn Classifier>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            config,
        }
    }

    /// Run one triage pass over the store's recent messages.
    #[tracing::instrument(
        name = "triage_run",
        skip_all,
        fields(run_id = %Uuid::new_v4(), store = self.store.name())
    )]
    pub async fn run(&self) -> Result<RunSummary, TriageError> {
        let mut summary = RunSummary::start();

        info!(
            window_secs = self.config.window.as_secs(),
            dry_run = self.config.dry_run,
            "Fetching recent emails"
        );
        let raw = self
            .store
            .fetch_recent(self.config.window)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch emails");
                TriageError::Fetch(e)
            })?;

        let batch = decode_batch(&raw);
        summary.fetched = batch.messages.len();
        info!(
            fetched = summary.fetched,
            rejected = batch.rejected.len(),
            "Found emails to process"
        );

        if batch.messages.is_empty() {
            info!("No emails to process");
            return Ok(summary.finish());
        }

        let classifier = &self.classifier;
        let results = futures::stream::iter(batch.messages.iter())
            .map(move |message| async move {
                info!(
                    id = message.id,
                    sender = %message.sender,
                    subject = %message.subject,
                    date = %message.date,
                    "Classifying email"
                );
                (message, classifier.classify(message).await)
            })
            .buffered(self.config.concurrency.max(1));
        let mut results = std::pin::pin!(results);

        while let Some((message, outcome)) = results.next().await {
            self.settle(message, outcome, &mut summary).await;
        }

        let summary = summary.finish();
        info!(
            fetched = summary.fetched,
            processed = summary.processed,
            skipped = summary.skipped,
            label_failures = summary.label_failures,
            "Triage run complete"
        );
        Ok(summary)
    }

    /// Apply the label for one classified message and update counters.
    async fn settle(
        &self,
        message: &Message,
        outcome: Result<Classification, ClassifyError>,
        summary: &mut RunSummary,
    ) {
        let classification = match outcome {
            Ok(classification) => classification,
            Err(e) => {
                warn!(
                    id = message.id,
                    error = %e,
                    "Skipping label application due to classification error"
                );
                summary.skipped += 1;
                return;
            }
        };

        info!(
            id = message.id,
            label = %classification.label,
            reason = %classification.reason,
            "Classified email"
        );
        summary.processed += 1;

        if self.config.dry_run {
            info!(id = message.id, "Dry run, label not applied");
            return;
        }

        let marker = self.config.labels.marker_for(classification.label);
        match self.store.apply_label(message.id, marker).await {
            Ok(()) => info!(
                id = message.id,
                label = %classification.label,
                marker,
                subject = %message.subject,
                "Applied label"
            ),
            Err(e) => {
                summary.label_failures += 1;
                warn!(
                    id = message.id,
                    label = %classification.label,
                    marker,
                    error = %e,
                    "Failed to apply label"
                );
            }
        }
    }
}
