//! Outcome classification for a single request attempt.

use crate::metrics::types::OutcomeClass;

/// Map a response status (or its absence) to an outcome category.
///
/// `None` means no status was received at all: the connection failed or the
/// request timed out.
pub fn classify(status: Option<u16>) -> OutcomeClass {
    match status {
        None => OutcomeClass::NetworkFailure,
        Some(429) => OutcomeClass::Throttled,
        Some(code) if code >= 500 => OutcomeClass::ServerError,
        Some(_) => OutcomeClass::Success,
    }
}
