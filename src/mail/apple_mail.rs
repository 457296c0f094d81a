//! Apple Mail store. Drives Mail.app through `osascript`.
//!
//! Every call spawns one `osascript -e <script>` process with captured
//! output and a timeout. AppleScript `log` lines arrive on stderr and are
//! forwarded to tracing.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::MailStoreError;
use crate::mail::scripts::{
    LABEL_FLAG_FAILED_PREFIX, LABEL_NOT_FOUND_PREFIX, LABEL_OK_PREFIX, fetch_script, label_script,
};
use crate::mail::store::MailStore;

/// Default bridge timeout.
pub const DEFAULT_BRIDGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured output of one script run.
#[derive(Debug, Clone, Default)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs an AppleScript source and returns its output.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str) -> Result<ScriptOutput, MailStoreError>;
}

/// `osascript` process runner.
#[derive(Debug, Clone)]
pub struct Osascript {
    timeout: Duration,
}

impl Osascript {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for Osascript {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_TIMEOUT)
    }
}

#[async_trait]
impl ScriptRunner for Osascript {
    async fn run(&self, script: &str) -> Result<ScriptOutput, MailStoreError> {
        let child = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| MailStoreError::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(MailStoreError::Bridge(format!(
                "osascript exited with {}: {}",
                output.status, stderr
            )));
        }

        Ok(ScriptOutput { stdout, stderr })
    }
}

/// Knobs for the fetch script.
#[derive(Debug, Clone)]
pub struct AppleMailConfig {
    /// How many of the newest messages to return if date filtering fails.
    pub fallback_count: usize,
    /// Body length cap applied on the Mail side.
    pub body_limit: usize,
}

impl Default for AppleMailConfig {
    fn default() -> Self {
        Self {
            fallback_count: 5,
            body_limit: 500,
        }
    }
}

/// Mail store backed by Apple Mail.
pub struct AppleMailStore {
    runner: Arc<dyn ScriptRunner>,
    config: AppleMailConfig,
}

impl AppleMailStore {
    pub fn new(config: AppleMailConfig, timeout: Duration) -> Self {
        Self::with_runner(Arc::new(Osascript::new(timeout)), config)
    }

    pub fn with_runner(runner: Arc<dyn ScriptRunner>, config: AppleMailConfig) -> Self {
        Self { runner, config }
    }
}

#[async_trait]
impl MailStore for AppleMailStore {
    fn name(&self) -> &str {
        "apple-mail"
    }

    async fn fetch_recent(&self, window: Duration) -> Result<String, MailStoreError> {
        info!(
            window_secs = window.as_secs(),
            fallback = self.config.fallback_count,
            "Running AppleScript to fetch emails"
        );
        let script = fetch_script(
            window.as_secs(),
            self.config.fallback_count,
            self.config.body_limit,
        );
        let output = self.runner.run(&script).await?;
        forward_script_log(&output.stderr);
        debug!(raw_len = output.stdout.len(), "Fetched raw transport batch");
        Ok(output.stdout)
    }

    async fn apply_label(&self, id: i64, marker: u8) -> Result<(), MailStoreError> {
        let output = self.runner.run(&label_script(id, marker)).await?;
        forward_script_log(&output.stderr);
        parse_label_result(id, &output.stdout)
    }
}

/// Map the label script's return string to an outcome.
fn parse_label_result(id: i64, stdout: &str) -> Result<(), MailStoreError> {
    let result = stdout.trim();
    if result.starts_with(LABEL_OK_PREFIX) {
        Ok(())
    } else if result.starts_with(LABEL_NOT_FOUND_PREFIX) {
        Err(MailStoreError::MessageNotFound { id })
    } else if let Some(reason) = result.strip_prefix(LABEL_FLAG_FAILED_PREFIX) {
        Err(MailStoreError::LabelRejected {
            id,
            reason: reason.trim().to_string(),
        })
    } else {
        Err(MailStoreError::Bridge(format!(
            "unexpected label script output: {result:?}"
        )))
    }
}

/// Forward AppleScript `log` output to tracing.
fn forward_script_log(stderr: &str) {
    for line in stderr.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("tell application \"Mail\"") {
            continue;
        }
        if line.contains("syntax error:") {
            error!(line = %line, "AppleScript syntax error");
        } else if line.contains("Date filtering error") {
            warn!(line = %line, "AppleScript fell back to most recent messages");
        } else {
            debug!(line = %line, "AppleScript log");
        }
    }
}
