use base64::{engine::general_purpose, Engine as _};
use perplexity_api::Message;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

const EMPTY_SEED: &str = "empty";

/// Derives a new thread id from the first message and the current time.
#[must_use]
pub fn new_thread_id(messages: &[Message]) -> String {
    thread_id_at(messages, OffsetDateTime::now_utc())
}

/// Deterministic form of [`new_thread_id`] for a fixed instant.
///
/// Ids are the SHA-256 digest encoded as unpadded URL-safe base64, so they are
/// always 43 characters and safe to use as file names.
#[must_use]
pub fn thread_id_at(messages: &[Message], at: OffsetDateTime) -> String {
    let mut hasher = Sha256::new();
    match messages.first() {
        Some(first) => {
            hasher.update(first.content.as_bytes());
            hasher.update(at.unix_timestamp_nanos().to_string().as_bytes());
        }
        None => hasher.update(EMPTY_SEED.as_bytes()),
    }
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}
