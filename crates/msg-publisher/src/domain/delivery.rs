//! Classification of downstream push failures.

use shared_types::SignedMessage;

/// Node already holds a message with a newer nonce for the sender.
pub const NONCE_BELOW_MINIMUM: &str = "minimum expected nonce";

/// Node already holds a message with the same nonce for the sender.
pub const NONCE_ALREADY_EXISTS: &str = "message with nonce already exists";

/// How a push rejection is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Expected under multi-path delivery; logged at debug and dropped.
    Benign,
    /// Recorded on the message record for operator visibility.
    Persistent,
}

/// Classify a rejection by its error text.
#[must_use]
pub fn classify_failure(reason: &str) -> FailureClass {
    if reason.contains(NONCE_BELOW_MINIMUM) || reason.contains(NONCE_ALREADY_EXISTS) {
        FailureClass::Benign
    } else {
        FailureClass::Persistent
    }
}

/// Messages of a rejected batch the node did not take.
///
/// The node accepts a prefix of the batch before failing, so only the
/// suffix from `accepted` on carries the failure.
#[must_use]
pub fn unaccepted(batch: &[SignedMessage], accepted: usize) -> &[SignedMessage] {
    &batch[accepted.min(batch.len())..]
}

/// Error annotations are rewritten only when the text changes.
#[must_use]
pub fn needs_annotation(stored: &str, reason: &str) -> bool {
    stored != reason
}
