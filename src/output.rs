//! JSON serialization for worker results.

use crate::result::WorkerResult;

/// Serialize a result to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for
/// `WorkerResult`).
pub fn to_json(result: &WorkerResult) -> Result<String, serde_json::Error> {
    serde_json::to_string(result)
}

/// Serialize a result to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for
/// `WorkerResult`).
pub fn to_json_pretty(result: &WorkerResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}
