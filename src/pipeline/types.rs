//! Shared types for the triage pipeline.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Message ─────────────────────────────────────────────────────────

/// One inbox message under triage.
///
/// Built only by decoding a mail store fetch response. The `date` is the
/// store's own textual timestamp and is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-native message id.
    pub id: i64,
    pub subject: String,
    pub sender: String,
    pub date: String,
    /// Body text, already truncated by the producer.
    pub body: String,
}

// ── Label ───────────────────────────────────────────────────────────

/// The closed set of triage categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Alert,
    Respond,
    Interesting,
    Fyi,
    Delete,
    Idk,
}

impl Label {
    /// Every label, in rubric priority order.
    pub const ALL: [Label; 6] = [
        Label::Alert,
        Label::Respond,
        Label::Interesting,
        Label::Fyi,
        Label::Delete,
        Label::Idk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::Respond => "respond",
            Self::Interesting => "interesting",
            Self::Fyi => "fyi",
            Self::Delete => "delete",
            Self::Idk => "idk",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    /// Exact, lower-case match against the six label names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown label '{s}'"))
    }
}

// ── Classification ──────────────────────────────────────────────────

/// The oracle's verdict for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    /// Advisory rationale; never drives further logic.
    pub reason: String,
}

impl Classification {
    pub fn new(label: Label, reason: impl Into<String>) -> Self {
        Self {
            label,
            reason: reason.into(),
        }
    }

    /// The `idk` fallback used when a response can't be trusted.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self::new(Label::Idk, reason)
    }
}

// ── Label mapping ───────────────────────────────────────────────────

/// Marker used for labels missing from the table.
pub const DEFAULT_MARKER: u8 = 0;

/// Label → visual marker (Apple Mail flag index) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMapping {
    markers: HashMap<Label, u8>,
    default_marker: u8,
}

impl LabelMapping {
    /// Build a mapping from explicit entries.
    pub fn new(entries: impl IntoIterator<Item = (Label, u8)>, default_marker: u8) -> Self {
        Self {
            markers: entries.into_iter().collect(),
            default_marker,
        }
    }

    /// Marker for a label, or the default marker if unmapped.
    pub fn marker_for(&self, label: Label) -> u8 {
        self.markers
            .get(&label)
            .copied()
            .unwrap_or(self.default_marker)
    }

    /// Override entries from a `label=marker,label=marker` list.
    pub fn with_overrides(mut self, spec: &str) -> Result<Self, String> {
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| format!("expected label=marker, got '{entry}'"))?;
            let label: Label = name.trim().parse()?;
            let marker: u8 = value
                .trim()
                .parse()
                .map_err(|e| format!("bad marker for {label}: {e}"))?;
            self.markers.insert(label, marker);
        }
        Ok(self)
    }
}

impl Default for LabelMapping {
    /// Apple Mail flag colours: red, orange, green, blue, gray, purple.
    fn default() -> Self {
        Self::new(
            [
                (Label::Alert, 2),
                (Label::Respond, 1),
                (Label::Interesting, 6),
                (Label::Fyi, 4),
                (Label::Delete, 7),
                (Label::Idk, 5),
            ],
            DEFAULT_MARKER,
        )
    }
}

// ── Run summary ─────────────────────────────────────────────────────

/// Counts reported at the end of a triage run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    /// Messages that received a classification (label write may still have failed).
    pub processed: usize,
    /// Messages skipped because the classification call failed.
    pub skipped: usize,
    /// Label writes that failed; diagnostic only.
    pub label_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            fetched: 0,
            processed: 0,
            skipped: 0,
            label_failures: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}
