//! The mail store seam: fetch a transport batch, write a marker back.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::MailStoreError;

/// Trait for mail store adapters. Pure I/O, no triage logic.
///
/// Implementations are treated as unsafe for concurrent writes; the
/// processor never issues two `apply_label` calls at once.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Store name for logging (e.g. "apple-mail").
    fn name(&self) -> &str;

    /// Transport-encoded batch of inbox messages received within `window`.
    ///
    /// If filtering by time fails, implementations return the most recent
    /// fixed-size slice of the inbox instead of failing.
    async fn fetch_recent(&self, window: Duration) -> Result<String, MailStoreError>;

    /// Set the visual marker on message `id`, looking in the inbox first and
    /// then the sent mailbox.
    ///
    /// Fails with `MessageNotFound` when the id is in neither mailbox and
    /// `LabelRejected` when the message was found but the write failed.
    async fn apply_label(&self, id: i64, marker: u8) -> Result<(), MailStoreError>;
}
