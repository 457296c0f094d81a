//! Sentinel-delimited transport format shared with the mail bridge.
//!
//! A batch is a flat string of records:
//!
//! ```text
//! <<<START>>>id<<<TAB>>>subject<<<TAB>>>sender<<<TAB>>>date<<<TAB>>>body<<<END>>>...
//! ```
//!
//! Text fields are escaped so they never contain `<<<` or `>>>`:
//! `[` → `[LB]`, then `<<<` → `[LT]`, then `>>>` → `[GT]`. Every `[` in an
//! escaped field therefore starts a placeholder, which makes unescaping a
//! single unambiguous scan. The bridge script applies the same rules.

use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::pipeline::types::Message;

pub const START_SENTINEL: &str = "<<<START>>>";
pub const END_SENTINEL: &str = "<<<END>>>";
pub const FIELD_SENTINEL: &str = "<<<TAB>>>";

const OPEN_RUN: &str = "<<<";
const CLOSE_RUN: &str = ">>>";
const LT_PLACEHOLDER: &str = "[LT]";
const GT_PLACEHOLDER: &str = "[GT]";
const LB_PLACEHOLDER: &str = "[LB]";

/// Marker appended to bodies cut by [`truncate_body`].
pub const TRUNCATION_MARKER: &str = "...";

/// Result of decoding a batch: the good records plus what was dropped.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub messages: Vec<Message>,
    pub rejected: Vec<DecodeError>,
}

/// Escape a text field for transport.
pub fn escape_field(text: &str) -> String {
    text.replace('[', LB_PLACEHOLDER)
        .replace(OPEN_RUN, LT_PLACEHOLDER)
        .replace(CLOSE_RUN, GT_PLACEHOLDER)
}

/// Reverse [`escape_field`]. Unknown `[` sequences pass through untouched.
pub fn unescape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('[') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(LT_PLACEHOLDER) {
            out.push_str(OPEN_RUN);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(GT_PLACEHOLDER) {
            out.push_str(CLOSE_RUN);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(LB_PLACEHOLDER) {
            out.push('[');
            rest = after;
        } else {
            out.push('[');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

/// Cut a body to `limit` characters, appending [`TRUNCATION_MARKER`] when cut.
pub fn truncate_body(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &body[..byte_idx], TRUNCATION_MARKER),
        None => body.to_string(),
    }
}

/// Encode a batch of messages into one transport string.
pub fn encode_batch(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(START_SENTINEL);
        out.push_str(&message.id.to_string());
        for field in [
            &message.subject,
            &message.sender,
            &message.date,
            &message.body,
        ] {
            out.push_str(FIELD_SENTINEL);
            out.push_str(&escape_field(field));
        }
        out.push_str(END_SENTINEL);
    }
    out
}

/// Decode a transport string. Malformed records are dropped and reported;
/// they never abort the rest of the batch.
pub fn decode_batch(raw: &str) -> DecodedBatch {
    let mut batch = DecodedBatch::default();

    // Anything before the first start sentinel is noise.
    for (index, segment) in raw.split(START_SENTINEL).skip(1).enumerate() {
        match decode_record(index, segment) {
            Ok(message) => {
                debug!(id = message.id, subject = %message.subject, "Decoded message");
                batch.messages.push(message);
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed transport record");
                batch.rejected.push(e);
            }
        }
    }

    debug!(
        decoded = batch.messages.len(),
        rejected = batch.rejected.len(),
        raw_len = raw.len(),
        "Decoded transport batch"
    );
    batch
}

fn decode_record(index: usize, segment: &str) -> Result<Message, DecodeError> {
    let (record, _) = segment
        .split_once(END_SENTINEL)
        .ok_or(DecodeError::Unterminated { index })?;

    let fields: Vec<&str> = record.split(FIELD_SENTINEL).collect();
    let [id, subject, sender, date, body] = fields.as_slice() else {
        return Err(DecodeError::FieldCount {
            index,
            found: fields.len(),
        });
    };

    let id = id.trim();
    let id: i64 = id.parse().map_err(|_| DecodeError::InvalidId {
        index,
        raw: id.to_string(),
    })?;

    let restore = |field: &str| unescape_field(field).trim().to_string();

    Ok(Message {
        id,
        subject: restore(subject),
        sender: restore(sender),
        date: restore(date),
        body: restore(body),
    })
}
