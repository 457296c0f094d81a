//! Classification oracle. Asks the LLM for one of the six labels.
//!
//! Two failure modes are kept apart:
//! - the call itself fails → `Err(ClassifyError)`, the message is skipped
//! - the call succeeds but the payload is unusable → `idk` fallback

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ClassifyError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mail::codec::truncate_body;
use crate::pipeline::types::{Classification, Label, Message};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 300;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Body characters sent to the model.
const PROMPT_BODY_LIMIT: usize = 1000;

const CLASSIFY_SCHEMA_NAME: &str = "email_classification";

/// Anything that can classify a single message.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &Message) -> Result<Classification, ClassifyError>;
}

/// LLM-backed classifier.
pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
    user_bio: String,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, user_bio: impl Into<String>) -> Self {
        Self {
            llm,
            user_bio: user_bio.into(),
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, message: &Message) -> Result<Classification, ClassifyError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(message, &self.user_bio)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS)
        .with_response_schema(CLASSIFY_SCHEMA_NAME, classification_schema());

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|source| ClassifyError::Call {
                id: message.id,
                source,
            })?;

        debug!(
            id = message.id,
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Classification response received"
        );

        Ok(parse_classification(message.id, &response.content))
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_system_prompt() -> String {
    "You are an expert email classification assistant for a busy founder. \
     Your task is to analyze the provided email and classify it according to the user's specific preferences."
        .to_string()
}

/// Rubric, user context, then the message itself.
fn build_classify_user_prompt(message: &Message, user_bio: &str) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "Please classify this email into exactly ONE of these categories, listed in rough order of priority:\n\n\
         alert: Emails containing time-sensitive information or requiring action *other than* a direct reply. \
         This includes 2FA codes, flight updates, confirmation links, password resets, or urgent alerts that need \
         attention but not a written response back to the sender.\n\n\
         respond: Emails that require a response from me. Personalized messages from real people, important \
         questions, or time-sensitive matters that I should reply to.\n\n\
         interesting: Content that might be intellectually stimulating or worth reading later, such as \
         newsletters from interesting people or thought pieces.\n\n\
         fyi: Informational emails I should be aware of that need no immediate action, like updates, notices, \
         bank or credit card statements.\n\n\
         delete: Spam, marketing, or low-value emails that are safe to ignore or delete. Mass-marketing, \
         promotions, and non-personalized outreach.\n\n\
         idk: When you're not sure which category it belongs in or it doesn't clearly fit elsewhere.\n\n",
    );

    prompt.push_str("Some context about me:\n");
    prompt.push_str(user_bio.trim());
    prompt.push_str("\n\n");

    prompt.push_str(
        "Some context on my preferences:\n\
         - Prefer `alert` over `respond` for time-sensitive items that need action but not a reply \
         (invoices, 2FA, time-sensitive links, travel updates).\n\
         - Prioritize `respond` for direct communication from real people.\n\
         - Use `interesting` for newsletters or content I might want to read later.\n\
         - Use `fyi` for general updates (bank statements, product updates).\n\
         - Use `delete` for clear spam/marketing.\n\
         - When in doubt, prefer `idk` over guessing.\n\n",
    );

    prompt.push_str(&format!("From: {}\n", message.sender));
    prompt.push_str(&format!("Subject: {}\n", message.subject));
    prompt.push_str(&format!(
        "Content: {}\n",
        truncate_body(&message.body, PROMPT_BODY_LIMIT)
    ));
    prompt.push_str(&format!("Date Sent: {}\n\n", message.date));

    prompt.push_str(
        "Provide your classification and a brief explanation why in JSON format:\n\
         {\"classification\": \"alert/respond/interesting/fyi/delete/idk\", \"reason\": \"your explanation here\"}",
    );

    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Schema of the expected reply: one of the six labels plus a reason.
fn classification_schema() -> serde_json::Value {
    let labels: Vec<&str> = Label::ALL.iter().map(|l| l.as_str()).collect();
    serde_json::json!({
        "type": "object",
        "properties": {
            "classification": { "type": "string", "enum": labels },
            "reason": { "type": "string" }
        },
        "required": ["classification", "reason"],
        "additionalProperties": false
    })
}

/// Raw classification payload.
#[derive(Debug, serde::Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    classification: String,
    #[serde(default)]
    reason: String,
}

/// Turn model output into a `Classification`, falling back to `idk` for
/// anything that isn't a JSON object naming one of the six labels.
fn parse_classification(id: i64, raw: &str) -> Classification {
    let json_str = extract_json_object(raw);
    let response: ClassifyResponse = match serde_json::from_str(&json_str) {
        Ok(response) => response,
        Err(e) => {
            warn!(
                id,
                raw_response = %raw,
                error = %e,
                "Failed to parse classification response, falling back to idk"
            );
            return Classification::fallback("Failed to parse JSON response from the model.");
        }
    };

    let label = response.classification.trim();
    match label.parse::<Label>() {
        Ok(label) => Classification::new(label, response.reason.trim()),
        Err(_) => {
            warn!(
                id,
                classification = %label,
                "Invalid classification from model, falling back to idk"
            );
            Classification::fallback(format!(
                "Classification '{label}' was invalid, using fallback."
            ))
        }
    }
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::CompletionResponse;
    use std::sync::Mutex;

    fn message() -> Message {
        Message {
            id: 1,
            subject: "Your OTP code".into(),
            sender: "security@bank.example".into(),
            date: "Monday, 19 October 2026 at 09:15:00".into(),
            body: "Your one-time code is 123456.".into(),
        }
    }

    // ── Prompt construction tests ───────────────────────────────────

    #[test]
    fn system_prompt_sets_role() {
        assert!(build_classify_system_prompt().contains("email classification assistant"));
    }

    #[test]
    fn user_prompt_includes_rubric_bio_and_message() {
        let prompt = build_classify_user_prompt(&message(), "I run a small robotics startup.");
        for label in Label::ALL {
            assert!(prompt.contains(&format!("{label}:")), "missing rubric for {label}");
        }
        assert!(prompt.contains("I run a small robotics startup."));
        assert!(prompt.contains("From: security@bank.example"));
        assert!(prompt.contains("Subject: Your OTP code"));
        assert!(prompt.contains("Content: Your one-time code is 123456."));
        assert!(prompt.contains("Date Sent: Monday, 19 October 2026"));
        assert!(prompt.contains("prefer `idk` over guessing"));
        assert!(prompt.contains("\"classification\""));
    }

    #[test]
    fn user_prompt_truncates_body() {
        let mut msg = message();
        msg.body = "x".repeat(5000);
        let prompt = build_classify_user_prompt(&msg, "");
        assert!(!prompt.contains(&"x".repeat(PROMPT_BODY_LIMIT + 1)));
        assert!(prompt.contains(&format!("{}...", "x".repeat(PROMPT_BODY_LIMIT))));
    }

    // ── Response parsing tests ──────────────────────────────────────

    #[test]
    fn parse_valid_response() {
        let c = parse_classification(1, r#"{"classification": "alert", "reason": " 2FA code "}"#);
        assert_eq!(c, Classification::new(Label::Alert, "2FA code"));
    }

    #[test]
    fn parse_trims_label_whitespace() {
        let c = parse_classification(1, r#"{"classification": " delete ", "reason": "promo"}"#);
        assert_eq!(c.label, Label::Delete);
    }

    #[test]
    fn parse_out_of_set_label_falls_back_to_idk() {
        let c = parse_classification(1, r#"{"classification": "urgent", "reason": "now!"}"#);
        assert_eq!(c.label, Label::Idk);
        assert!(c.reason.contains("'urgent' was invalid"));
    }

    #[test]
    fn parse_wrong_case_label_falls_back_to_idk() {
        let c = parse_classification(1, r#"{"classification": "Alert", "reason": "x"}"#);
        assert_eq!(c.label, Label::Idk);
    }

    #[test]
    fn parse_missing_classification_falls_back_to_idk() {
        let c = parse_classification(1, r#"{"reason": "forgot the label"}"#);
        assert_eq!(c.label, Label::Idk);
        assert!(c.reason.contains("invalid"));
    }

    #[test]
    fn parse_non_json_falls_back_to_idk() {
        let c = parse_classification(1, "I think this is an alert.");
        assert_eq!(c.label, Label::Idk);
        assert!(c.reason.contains("Failed to parse"));
    }

    #[test]
    fn parse_wrong_field_type_falls_back_to_idk() {
        let c = parse_classification(1, r#"{"classification": 3, "reason": "x"}"#);
        assert_eq!(c.label, Label::Idk);
        assert!(c.reason.contains("Failed to parse"));
    }

    #[test]
    fn parse_response_wrapped_in_markdown() {
        let raw = "Here you go:\n```json\n{\"classification\": \"fyi\", \"reason\": \"statement\"}\n```";
        assert_eq!(parse_classification(1, raw).label, Label::Fyi);
    }

    #[test]
    fn parse_response_with_surrounding_text() {
        let raw = "Verdict: {\"classification\": \"respond\", \"reason\": \"question\"} done.";
        assert_eq!(parse_classification(1, raw).label, Label::Respond);
    }

    // ── Integration: classifier with mock LLM ───────────────────────

    /// Mock LLM that returns a fixed response or fails.
    struct MockLlm {
        response: Result<String, String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlm {
        fn replying(content: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(content.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(reason.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-classifier"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            match &self.response {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 100,
                    output_tokens: 20,
                }),
                Err(reason) => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: reason.clone(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn classifier_returns_label_from_llm() {
        let llm = MockLlm::replying(r#"{"classification": "alert", "reason": "OTP"}"#);
        let classifier = LlmClassifier::new(llm.clone(), "bio");

        let c = classifier.classify(&message()).await.unwrap();
        assert_eq!(c, Classification::new(Label::Alert, "OTP"));

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, Some(CLASSIFY_TEMPERATURE));
        assert_eq!(requests[0].max_tokens, Some(CLASSIFY_MAX_TOKENS));
        assert!(requests[0].preamble().is_some());
    }

    #[tokio::test]
    async fn classifier_requests_label_schema() {
        let llm = MockLlm::replying(r#"{"classification": "fyi", "reason": "statement"}"#);
        let classifier = LlmClassifier::new(llm.clone(), "bio");
        classifier.classify(&message()).await.unwrap();

        let requests = llm.requests.lock().unwrap();
        let schema = requests[0].response_schema.as_ref().unwrap();
        assert_eq!(schema.name, CLASSIFY_SCHEMA_NAME);
        assert_eq!(
            schema.schema["properties"]["classification"]["enum"],
            serde_json::json!(["alert", "respond", "interesting", "fyi", "delete", "idk"])
        );
        assert_eq!(
            schema.schema["required"],
            serde_json::json!(["classification", "reason"])
        );
        assert_eq!(schema.schema["additionalProperties"], false);
    }

    #[tokio::test]
    async fn classifier_falls_back_on_bad_payload() {
        let llm = MockLlm::replying("not json at all");
        let classifier = LlmClassifier::new(llm, "bio");
        let c = classifier.classify(&message()).await.unwrap();
        assert_eq!(c.label, Label::Idk);
    }

    #[tokio::test]
    async fn classifier_surfaces_call_failure() {
        let llm = MockLlm::failing("connection reset");
        let classifier = LlmClassifier::new(llm, "bio");
        let err = classifier.classify(&message()).await.unwrap_err();
        let ClassifyError::Call { id, .. } = err;
        assert_eq!(id, 1);
    }
}
