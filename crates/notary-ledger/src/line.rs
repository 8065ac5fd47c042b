//! Text encoding of ledger records.
//!
//! One record per line:
//!
//! ```text
//! 7 | 2026-01-01T10:00:00.000000Z | userId=u1 | userName=alice | service=KMS | action=CREATE_KEY | details=Create key : 3 | status=SUCCESS | prev=<b64> | hash=<b64>
//! ```
//!
//! Everything before ` | prev=` is the canonical field string that gets
//! hashed. Field values never contain CR or LF, and every field except
//! `details` has `|` replaced by `/`, so the line splits unambiguously.

use notary_contracts::ledger::{LedgerRecord, Outcome};

const PREV_MARK: &str = " | prev=";
const HASH_MARK: &str = " | hash=";

/// Make a value safe for any field other than `details`.
pub fn sanitize_field(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\r' | '\n' => ' ',
            '|' => '/',
            other => other,
        })
        .collect()
}

/// Make a free-text detail safe for a single line.
pub fn sanitize_detail(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// The deterministic field string a record's hash commits to.
pub fn canonical_fields(record: &LedgerRecord) -> String {
    format!(
        "{} | {} | userId={} | userName={} | service={} | action={} | details={} | status={}",
        record.sequence,
        record.timestamp,
        record.actor_id,
        record.actor_name,
        record.service,
        record.action,
        record.detail,
        record.outcome,
    )
}

pub fn format_line(record: &LedgerRecord) -> String {
    format!(
        "{}{}{}{}{}",
        canonical_fields(record),
        PREV_MARK,
        record.previous_hash,
        HASH_MARK,
        record.current_hash
    )
}

/// Split a line into `(canonical_fields, prev, hash)`.
///
/// The last ` | prev=` marker wins, so a detail that happens to contain the
/// marker text cannot shift the split point.
pub fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let (data, rest) = line.rsplit_once(PREV_MARK)?;
    let (prev, hash) = rest.split_once(HASH_MARK)?;
    Some((data, prev, hash))
}

/// The stored `hash=` value of a line, if the line is well formed.
pub fn stored_hash(line: &str) -> Option<&str> {
    split_line(line).map(|(_, _, hash)| hash)
}

/// Parse a full line back into a record. Returns `None` for malformed lines.
pub fn parse_line(line: &str) -> Option<LedgerRecord> {
    let (data, prev, hash) = split_line(line)?;

    let (sequence, rest) = data.split_once(" | ")?;
    let (timestamp, rest) = rest.split_once(" | ")?;
    let rest = rest.strip_prefix("userId=")?;
    let (actor_id, rest) = rest.split_once(" | userName=")?;
    let (actor_name, rest) = rest.split_once(" | service=")?;
    let (service, rest) = rest.split_once(" | action=")?;
    let (action, rest) = rest.split_once(" | details=")?;
    let (detail, status) = rest.rsplit_once(" | status=")?;

    Some(LedgerRecord {
        sequence: sequence.parse().ok()?,
        timestamp: timestamp.to_string(),
        actor_id: actor_id.to_string(),
        actor_name: actor_name.to_string(),
        service: service.to_string(),
        action: action.to_string(),
        detail: detail.to_string(),
        outcome: Outcome::parse(status)?,
        previous_hash: prev.to_string(),
        current_hash: hash.to_string(),
    })
}
