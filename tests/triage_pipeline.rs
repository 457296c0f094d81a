//! End-to-end triage runs through the public API, with a scripted mail store
//! and a stub LLM standing in for Apple Mail and the model backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mail_triage::error::{LlmError, MailStoreError, TriageError};
use mail_triage::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use mail_triage::mail::{MailStore, encode_batch};
use mail_triage::pipeline::{
    Label, LabelMapping, LlmClassifier, Message, ProcessorConfig, TriageProcessor,
};

// ── Test doubles ────────────────────────────────────────────────────

/// Mail store that serves a fixed transport string and records label writes.
struct ScriptedStore {
    raw: Result<String, String>,
    missing_ids: Vec<i64>,
    applied: Mutex<Vec<(i64, u8)>>,
}

impl ScriptedStore {
    fn serving(raw: String) -> Arc<Self> {
        Arc::new(Self {
            raw: Ok(raw),
            missing_ids: Vec::new(),
            applied: Mutex::new(Vec::new()),
        })
    }

    fn applied(&self) -> Vec<(i64, u8)> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_recent(&self, _window: Duration) -> Result<String, MailStoreError> {
        self.raw.clone().map_err(MailStoreError::Bridge)
    }

    async fn apply_label(&self, id: i64, marker: u8) -> Result<(), MailStoreError> {
        if self.missing_ids.contains(&id) {
            return Err(MailStoreError::MessageNotFound { id });
        }
        self.applied.lock().unwrap().push((id, marker));
        Ok(())
    }
}

/// LLM stub that answers by looking for a keyword in the prompt.
struct KeywordLlm {
    rules: Vec<(&'static str, Result<&'static str, &'static str>)>,
}

#[async_trait]
impl LlmProvider for KeywordLlm {
    fn model_name(&self) -> &str {
        "keyword-stub"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.prompt();
        let answer = self
            .rules
            .iter()
            .find(|(keyword, _)| prompt.contains(keyword))
            .map(|(_, answer)| *answer)
            .unwrap_or(Ok(r#"{"classification": "fyi", "reason": "default"}"#));

        match answer {
            Ok(content) => Ok(CompletionResponse {
                content: content.to_string(),
                input_tokens: 0,
                output_tokens: 0,
            }),
            Err(reason) => Err(LlmError::RequestFailed {
                provider: "keyword-stub".to_string(),
                reason: reason.to_string(),
            }),
        }
    }
}

fn message(id: i64, subject: &str, sender: &str, body: &str) -> Message {
    Message {
        id,
        subject: subject.to_string(),
        sender: sender.to_string(),
        date: "Monday, 1 January 2024 at 09:00:00".to_string(),
        body: body.to_string(),
    }
}

fn processor(
    store: Arc<ScriptedStore>,
    llm: KeywordLlm,
    config: ProcessorConfig,
) -> TriageProcessor {
    let classifier = Arc::new(LlmClassifier::new(Arc::new(llm), "I run a small startup."));
    TriageProcessor::new(store, classifier, config)
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn otp_and_promotion_are_flagged() {
    let raw = encode_batch(&[
        message(1, "Your OTP code", "bank@x", "Code 123456 <<<not a sentinel>>>"),
        message(2, "50% off sale", "shop@y", "Everything [today] only"),
    ]);
    let store = ScriptedStore::serving(raw);
    let llm = KeywordLlm {
        rules: vec![
            ("Your OTP code", Ok(r#"{"classification": "alert", "reason": "one-time code"}"#)),
            ("50% off sale", Ok(r#"{"classification": "delete", "reason": "promotion"}"#)),
        ],
    };

    let summary = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap();

    let labels = LabelMapping::default();
    assert_eq!(
        store.applied(),
        vec![
            (1, labels.marker_for(Label::Alert)),
            (2, labels.marker_for(Label::Delete)),
        ]
    );
    assert_eq!(store.applied(), vec![(1, 2), (2, 7)]);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 0);
    assert!(summary.finished_at >= summary.started_at);
}

#[tokio::test]
async fn unknown_label_falls_back_to_idk() {
    let raw = encode_batch(&[message(9, "Ping", "a@b", "hello")]);
    let store = ScriptedStore::serving(raw);
    let llm = KeywordLlm {
        rules: vec![("Ping", Ok(r#"{"classification": "urgent", "reason": "?"}"#))],
    };

    let summary = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(store.applied(), vec![(9, 5)]);
    assert_eq!(summary.processed, 1);
}

#[tokio::test]
async fn prose_reply_falls_back_to_idk() {
    let raw = encode_batch(&[message(4, "Lunch?", "friend@z", "tomorrow?")]);
    let store = ScriptedStore::serving(raw);
    let llm = KeywordLlm {
        rules: vec![("Lunch?", Ok("I think you should respond to this one."))],
    };

    let summary = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(store.applied(), vec![(4, 5)]);
    assert_eq!((summary.processed, summary.skipped), (1, 0));
}

#[tokio::test]
async fn failed_call_skips_only_that_message() {
    let raw = encode_batch(&[
        message(10, "Outage", "ops@x", "db down"),
        message(11, "Newsletter", "news@y", "weekly digest"),
    ]);
    let store = ScriptedStore::serving(raw);
    let llm = KeywordLlm {
        rules: vec![
            ("Outage", Err("connection reset")),
            ("Newsletter", Ok(r#"{"classification": "interesting", "reason": "digest"}"#)),
        ],
    };

    let summary = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(store.applied(), vec![(11, 6)]);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn malformed_record_is_dropped_neighbours_survive() {
    let good_a = encode_batch(&[message(1, "A", "a@x", "alpha")]);
    let good_b = encode_batch(&[message(3, "B", "b@x", "beta")]);
    let raw = format!("{good_a}<<<START>>>2<<<TAB>>>only two<<<END>>>{good_b}");
    let store = ScriptedStore::serving(raw);
    let llm = KeywordLlm { rules: Vec::new() };

    let summary = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.fetched, 2);
    assert_eq!(store.applied(), vec![(1, 4), (3, 4)]);
}

#[tokio::test]
async fn missing_message_still_counts_as_processed() {
    let raw = encode_batch(&[message(5, "Gone", "a@x", "moved"), message(6, "Here", "b@x", "ok")]);
    let store = Arc::new(ScriptedStore {
        raw: Ok(raw),
        missing_ids: vec![5],
        applied: Mutex::new(Vec::new()),
    });
    let llm = KeywordLlm { rules: Vec::new() };

    let summary = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(store.applied(), vec![(6, 4)]);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.label_failures, 1);
}

#[tokio::test]
async fn concurrent_classification_keeps_write_order() {
    let messages: Vec<Message> = (1..=8)
        .map(|id| message(id, &format!("Note {id}"), "a@x", "body"))
        .collect();
    let store = ScriptedStore::serving(encode_batch(&messages));
    let llm = KeywordLlm { rules: Vec::new() };
    let config = ProcessorConfig {
        concurrency: 4,
        ..ProcessorConfig::default()
    };

    let summary = processor(store.clone(), llm, config).run().await.unwrap();

    let ids: Vec<i64> = store.applied().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    assert_eq!(summary.processed, 8);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let raw = encode_batch(&[message(1, "A", "a@x", "alpha")]);
    let store = ScriptedStore::serving(raw);
    let llm = KeywordLlm { rules: Vec::new() };
    let config = ProcessorConfig {
        dry_run: true,
        ..ProcessorConfig::default()
    };

    let summary = processor(store.clone(), llm, config).run().await.unwrap();

    assert!(store.applied().is_empty());
    assert_eq!(summary.processed, 1);
}

#[tokio::test]
async fn empty_inbox_is_a_clean_run() {
    let store = ScriptedStore::serving(String::new());
    let llm = KeywordLlm { rules: Vec::new() };

    let summary = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!((summary.fetched, summary.processed, summary.skipped), (0, 0, 0));
    assert!(store.applied().is_empty());
}

#[tokio::test]
async fn fetch_failure_aborts_the_run() {
    let store = Arc::new(ScriptedStore {
        raw: Err("Mail got an error: not running".to_string()),
        missing_ids: Vec::new(),
        applied: Mutex::new(Vec::new()),
    });
    let llm = KeywordLlm { rules: Vec::new() };

    let err = processor(store.clone(), llm, ProcessorConfig::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, TriageError::Fetch(MailStoreError::Bridge(_))));
    assert!(store.applied().is_empty());
}
