//! Normalization of raw measurement logs into [`IntervalRecord`]s.
//!
//! The log is a JSON document with an optional top-level `error` field and an
//! `intervals` array. Each interval carries its figures in one of three
//! alternative summary objects, tried in order: `sum` (both directions),
//! `sum_sent`, `sum_received`.

use ccbench_core::models::IntervalRecord;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Summary fields in priority order.
const SUMMARY_FIELDS: [&str; 3] = ["sum", "sum_sent", "sum_received"];

const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Why a log yielded no data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogParseError {
    /// The bytes are not a JSON document.
    #[error("log is not valid JSON: {0}")]
    Decode(String),

    /// The measurement tool reported a failure.
    #[error("log reports an upstream error: {0}")]
    UpstreamError(String),

    /// No `intervals` array at the top level.
    #[error("log has no interval list")]
    MissingIntervals,

    /// Every interval entry was unusable (or the list was empty).
    #[error("none of the {0} interval entries is usable")]
    NoUsableIntervals(usize),
}

impl LogParseError {
    /// Taxonomy name used in skip reports.
    pub fn category(&self) -> &'static str {
        match self {
            LogParseError::Decode(_) => "ParseError",
            _ => "SchemaMismatchError",
        }
    }
}

/// Parse one raw log into interval records ordered by start time.
///
/// Never panics on malformed input; every failure is an explicit
/// [`LogParseError`].
pub fn parse_log(raw: &[u8]) -> Result<Vec<IntervalRecord>, LogParseError> {
    let data: Value =
        serde_json::from_slice(raw).map_err(|e| LogParseError::Decode(e.to_string()))?;

    if let Some(message) = data.get("error").and_then(upstream_error) {
        return Err(LogParseError::UpstreamError(message));
    }

    let entries = data
        .get("intervals")
        .and_then(Value::as_array)
        .ok_or(LogParseError::MissingIntervals)?;

    let mut records: Vec<IntervalRecord> = entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let record = parse_entry(entry);
            if record.is_none() {
                debug!("Discarding unusable interval entry #{}", idx);
            }
            record
        })
        .collect();

    if records.is_empty() {
        return Err(LogParseError::NoUsableIntervals(entries.len()));
    }

    records.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(records)
}

/// Interpret the top-level `error` field; `Some(message)` when it is set.
fn upstream_error(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Map one interval entry to a record, `None` when it is unusable.
fn parse_entry(entry: &Value) -> Option<IntervalRecord> {
    let summary = SUMMARY_FIELDS
        .iter()
        .find_map(|field| entry.get(*field).and_then(Value::as_object))?;

    let start = float_field(summary, "start")?;
    let end = float_field(summary, "end")?;
    let bits_per_second = float_field(summary, "bits_per_second")?;
    let retransmits = count_field(summary, "retransmits")?;

    IntervalRecord::new(start, end, bits_per_second / BITS_PER_MEGABIT, retransmits)
}

/// Numeric field with a `0.0` default; `None` when present but not a number.
fn float_field(summary: &Map<String, Value>, name: &str) -> Option<f64> {
    match summary.get(name) {
        None | Some(Value::Null) => Some(0.0),
        Some(v) => v.as_f64(),
    }
}

/// Non-negative integer field with a `0` default.
///
/// Integral floats such as `3.0` are accepted; anything else, including a
/// float too large for `u64`, makes the entry unusable.
fn count_field(summary: &Map<String, Value>, name: &str) -> Option<u64> {
    match summary.get(name) {
        None | Some(Value::Null) => Some(0),
        Some(v) => v.as_u64().or_else(|| v.as_f64().and_then(integral_count)),
    }
}

/// `value` as a count when it is a non-negative whole number below `2^64`.
pub(crate) fn integral_count(value: f64) -> Option<u64> {
    let in_range = value >= 0.0 && value < u64::MAX as f64;
    (in_range && value.fract() == 0.0).then_some(value as u64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
