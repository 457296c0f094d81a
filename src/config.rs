//! Configuration types.
//!
//! Everything is read once at startup from environment variables (with CLI
//! overrides layered on top) and handed to the pipeline explicitly.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::mail::AppleMailConfig;
use crate::pipeline::{LabelMapping, ProcessorConfig};

/// Context used when no bio is configured.
pub const DEFAULT_USER_BIO: &str = "I am a busy professional who wants urgent and personal \
email surfaced first and marketing kept out of the way.";

/// Full triage configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub llm: LlmConfig,
    /// Free-text context about the user, given to the classifier.
    pub user_bio: String,
    /// How far back to fetch.
    pub window: Duration,
    /// Newest-N fallback when the store can't filter by date.
    pub fallback_count: usize,
    /// Body character cap applied by the store.
    pub body_limit: usize,
    /// Max in-flight classification calls.
    pub concurrency: usize,
    /// Upper bound on a single mail bridge call.
    pub bridge_timeout: Duration,
    pub dry_run: bool,
    pub labels: LabelMapping,
    /// Directory for daily-rolling log files, if any.
    pub log_dir: Option<PathBuf>,
}

impl TriageConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend: LlmBackend = parse_or(&get, "TRIAGE_BACKEND", LlmBackend::OpenAi)?;
        let key_var = backend.api_key_var();
        let api_key = get(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;
        let model = get("TRIAGE_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        let user_bio = match (get("TRIAGE_USER_BIO"), get("TRIAGE_USER_BIO_FILE")) {
            (Some(bio), _) => bio,
            (None, Some(path)) => std::fs::read_to_string(&path)?.trim().to_string(),
            (None, None) => DEFAULT_USER_BIO.to_string(),
        };

        let window_hours: u64 = parse_or(&get, "TRIAGE_WINDOW_HOURS", 24)?;
        let fallback_count: usize = parse_or(&get, "TRIAGE_FALLBACK_COUNT", 5)?;
        let body_limit: usize = parse_or(&get, "TRIAGE_BODY_LIMIT", 500)?;
        let concurrency: usize = parse_or(&get, "TRIAGE_CONCURRENCY", 1)?;
        let bridge_timeout_secs: u64 = parse_or(&get, "TRIAGE_BRIDGE_TIMEOUT_SECS", 120)?;
        let dry_run: bool = parse_or(&get, "TRIAGE_DRY_RUN", false)?;

        require_positive("TRIAGE_WINDOW_HOURS", window_hours)?;
        let window_secs = window_hours
            .checked_mul(60 * 60)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "TRIAGE_WINDOW_HOURS".to_string(),
                message: format!("{window_hours} hours is out of range"),
            })?;
        require_positive("TRIAGE_BODY_LIMIT", body_limit as u64)?;
        require_positive("TRIAGE_CONCURRENCY", concurrency as u64)?;
        require_positive("TRIAGE_BRIDGE_TIMEOUT_SECS", bridge_timeout_secs)?;

        let labels = match get("TRIAGE_LABEL_MARKERS") {
            Some(spec) => LabelMapping::default().with_overrides(&spec).map_err(|message| {
                ConfigError::InvalidValue {
                    key: "TRIAGE_LABEL_MARKERS".to_string(),
                    message,
                }
            })?,
            None => LabelMapping::default(),
        };

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            user_bio,
            window: Duration::from_secs(window_secs),
            fallback_count,
            body_limit,
            concurrency,
            bridge_timeout: Duration::from_secs(bridge_timeout_secs),
            dry_run,
            labels,
            log_dir: get("TRIAGE_LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            window: self.window,
            concurrency: self.concurrency,
            dry_run: self.dry_run,
            labels: self.labels.clone(),
        }
    }

    pub fn apple_mail_config(&self) -> AppleMailConfig {
        AppleMailConfig {
            fallback_count: self.fallback_count,
            body_limit: self.body_limit,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

fn require_positive(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
