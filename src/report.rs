//! Structured outcome emission.
//!
//! Exactly one JSON document is written to stdout per invocation: the success
//! payload `{changed, result, rowcount}` or the failure payload
//! `{failed, msg, errno?}`. Logs never go to stdout.

use std::io::{self, Write};

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::RunnerError;
use crate::types::QueryOutcome;

/// Render the success payload.
#[must_use]
pub fn success_payload(outcome: &QueryOutcome) -> JsonValue {
    let mut payload = JsonMap::with_capacity(3);
    payload.insert("changed".to_string(), JsonValue::Bool(outcome.changed));
    payload.insert("result".to_string(), outcome.rows.to_json());
    payload.insert("rowcount".to_string(), JsonValue::from(outcome.rowcount));
    JsonValue::Object(payload)
}

/// Render the failure payload. `errno` is omitted when the driver supplied no
/// numeric code.
#[must_use]
pub fn failure_payload(err: &RunnerError) -> JsonValue {
    let mut payload = JsonMap::with_capacity(3);
    payload.insert("failed".to_string(), JsonValue::Bool(true));
    payload.insert("msg".to_string(), JsonValue::String(err.to_string()));
    if let Some(errno) = err.errno() {
        payload.insert("errno".to_string(), JsonValue::from(errno));
    }
    JsonValue::Object(payload)
}

/// Write the success payload to `out`, newline-terminated.
///
/// # Errors
///
/// Returns `io::Error` if the write fails.
pub fn emit_success(out: &mut impl Write, outcome: &QueryOutcome) -> io::Result<()> {
    writeln!(out, "{}", success_payload(outcome))
}

/// Write the failure payload to `out`, newline-terminated.
///
/// # Errors
///
/// Returns `io::Error` if the write fails.
pub fn emit_failure(out: &mut impl Write, err: &RunnerError) -> io::Result<()> {
    writeln!(out, "{}", failure_payload(err))
}
