//! Mail store access: the transport codec, the store trait, and the
//! Apple Mail bridge.

pub mod apple_mail;
pub mod codec;
pub mod scripts;
pub mod store;

pub use apple_mail::{AppleMailConfig, AppleMailStore};
pub use codec::{DecodedBatch, decode_batch, encode_batch};
pub use store::MailStore;
