//! Maps the failures of an operation response to an HTTP status.

use axum::http::StatusCode;

use super::operations::{FailureCode, OperationFailure};

/// Phrases that mark a failure message as a conflict. Matched case-insensitively.
pub const CONFLICT_MARKERS: [&str; 4] = [
    "already exists",
    "documents already exist",
    "duplicate identifiers",
    "duplicate key error",
];

pub fn is_conflict_message(message: &str) -> bool {
    let message = message.to_lowercase();
    CONFLICT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Status for a response carrying `failures`.
///
/// No failures keeps `base`. Any conflict failure gives 409, anything else 400.
pub fn status_for_failures(failures: &[OperationFailure], base: StatusCode) -> StatusCode {
    if failures.is_empty() {
        return base;
    }

    let conflict = failures
        .iter()
        .any(|f| f.code == FailureCode::Conflict || is_conflict_message(&f.message));
    if conflict {
        StatusCode::CONFLICT
    } else {
        StatusCode::BAD_REQUEST
    }
}
