//! Tracking state codecs
//!
//! The same logical `TrackingState` lives in two incompatible physical
//! encodings:
//!
//! - **Borrower records** store opaque JSON values per field id. The doc
//!   lists are usually JSON arrays, but legacy records carry
//!   newline-delimited text instead.
//! - **Deal records** store typed fields (stringValue/numberValue per
//!   field id). Missing docs are `"Name [STAGE]"` lines joined by `\n`,
//!   received docs are bare names joined by `\n`.
//!
//! Decoding is total: malformed input degrades (unparsable content becomes
//! a single plain-text PRE entry, non-numeric counters become 0) instead
//! of failing. Encoding is the exact inverse for well-formed state, so
//! `encode(decode(x)) == x` up to surrounding whitespace.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::crm::fields::TrackingFieldIds;
use crate::crm::records::DealField;

use super::state::{DocStage, MissingDocEntry, TrackingState};
use super::status::DocStatus;

// ============================================================================
// Borrower-record encoding (opaque JSON values per field id)
// ============================================================================

/// Decode tracking state from a borrower record's custom fields
pub fn decode_borrower(
    fields: &HashMap<String, Value>,
    ids: &TrackingFieldIds,
) -> TrackingState {
    TrackingState {
        missing_docs: parse_missing_value(fields.get(&ids.missing_docs)),
        received_docs: parse_received_value(fields.get(&ids.received_docs)),
        pre_docs_total: parse_count(fields.get(&ids.pre_docs_total)),
        pre_docs_received: parse_count(fields.get(&ids.pre_docs_received)),
        full_docs_total: parse_count(fields.get(&ids.full_docs_total)),
        full_docs_received: parse_count(fields.get(&ids.full_docs_received)),
        doc_status: fields
            .get(&ids.doc_status)
            .and_then(Value::as_str)
            .and_then(DocStatus::parse)
            .unwrap_or(DocStatus::NotStarted),
    }
}

/// Encode tracking state into borrower custom-field values
pub fn encode_borrower(
    state: &TrackingState,
    ids: &TrackingFieldIds,
) -> HashMap<String, Value> {
    let missing = Value::Array(
        state
            .missing_docs
            .iter()
            .map(|e| json!({ "name": e.name, "stage": e.stage.as_str() }))
            .collect(),
    );
    let received = Value::Array(
        state
            .received_docs
            .iter()
            .map(|n| Value::String(n.clone()))
            .collect(),
    );

    let mut fields = HashMap::new();
    fields.insert(ids.missing_docs.clone(), missing);
    fields.insert(ids.received_docs.clone(), received);
    fields.insert(ids.pre_docs_total.clone(), json!(state.pre_docs_total));
    fields.insert(ids.pre_docs_received.clone(), json!(state.pre_docs_received));
    fields.insert(ids.full_docs_total.clone(), json!(state.full_docs_total));
    fields.insert(ids.full_docs_received.clone(), json!(state.full_docs_received));
    fields.insert(
        ids.doc_status.clone(),
        Value::String(state.doc_status.as_str().to_string()),
    );
    fields
}

fn parse_missing_value(value: Option<&Value>) -> Vec<MissingDocEntry> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(missing_entry_from_value).collect(),
        Some(Value::String(text)) => parse_missing_text(text),
        Some(other) => parse_missing_text(&other.to_string()),
    }
}

fn parse_received_value(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(received_name_from_value).collect(),
        Some(Value::String(text)) => parse_received_text(text),
        Some(other) => parse_received_text(&other.to_string()),
    }
}

fn missing_entry_from_value(value: &Value) -> Option<MissingDocEntry> {
    match value {
        Value::Object(map) => {
            let name = map.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let stage = map
                .get("stage")
                .and_then(Value::as_str)
                .map(DocStage::parse_lenient)
                .unwrap_or(DocStage::Pre);
            Some(MissingDocEntry::new(name, stage))
        }
        Value::String(s) if !s.trim().is_empty() => Some(MissingDocEntry::from_line(s)),
        _ => None,
    }
}

fn received_name_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from),
        _ => None,
    }
}

// ============================================================================
// Text fallbacks (shared by both encodings)
// ============================================================================

/// Parse missing-doc text: structured JSON first, else non-empty lines.
/// A single line of plain text becomes a single PRE entry.
pub fn parse_missing_text(text: &str) -> Vec<MissingDocEntry> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return items.iter().filter_map(missing_entry_from_value).collect();
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(MissingDocEntry::from_line)
        .collect()
}

/// Parse received-doc text: structured JSON first, else non-empty lines
pub fn parse_received_text(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return items.iter().filter_map(received_name_from_value).collect();
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a counter value: JSON numbers and numeric-looking strings count,
/// everything else (missing, null, garbage, negatives) is 0
fn parse_count(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|f| *f >= 0.0)
            .map(|f| f as u32)
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| *f >= 0.0)
            .map(|f| f as u32)
            .unwrap_or(0),
        _ => 0,
    }
}

// ============================================================================
// Deal-record encoding (typed stringValue/numberValue fields)
// ============================================================================

/// Decode tracking state from a deal's typed custom fields
pub fn decode_deal(fields: &[DealField], ids: &TrackingFieldIds) -> TrackingState {
    TrackingState {
        missing_docs: field_text(fields, &ids.missing_docs)
            .map(parse_missing_text)
            .unwrap_or_default(),
        received_docs: field_text(fields, &ids.received_docs)
            .map(parse_received_text)
            .unwrap_or_default(),
        pre_docs_total: field_count(fields, &ids.pre_docs_total),
        pre_docs_received: field_count(fields, &ids.pre_docs_received),
        full_docs_total: field_count(fields, &ids.full_docs_total),
        full_docs_received: field_count(fields, &ids.full_docs_received),
        doc_status: field_text(fields, &ids.doc_status)
            .and_then(DocStatus::parse)
            .unwrap_or(DocStatus::NotStarted),
    }
}

/// Encode tracking state into deal custom fields
pub fn encode_deal(state: &TrackingState, ids: &TrackingFieldIds) -> Vec<DealField> {
    let missing = state
        .missing_docs
        .iter()
        .map(MissingDocEntry::to_line)
        .collect::<Vec<_>>()
        .join("\n");
    let received = state.received_docs.join("\n");

    vec![
        DealField::text(ids.missing_docs.clone(), missing),
        DealField::text(ids.received_docs.clone(), received),
        DealField::number(ids.pre_docs_total.clone(), state.pre_docs_total as f64),
        DealField::number(ids.pre_docs_received.clone(), state.pre_docs_received as f64),
        DealField::number(ids.full_docs_total.clone(), state.full_docs_total as f64),
        DealField::number(ids.full_docs_received.clone(), state.full_docs_received as f64),
        DealField::text(ids.doc_status.clone(), state.doc_status.as_str()),
    ]
}

fn field_text<'a>(fields: &'a [DealField], id: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| f.id == id)
        .and_then(|f| f.string_value.as_deref())
}

fn field_count(fields: &[DealField], id: &str) -> u32 {
    let Some(field) = fields.iter().find(|f| f.id == id) else {
        return 0;
    };
    if let Some(n) = field.number_value {
        if n >= 0.0 {
            return n as u32;
        }
        return 0;
    }
    field
        .string_value
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| *f >= 0.0)
        .map(|f| f as u32)
        .unwrap_or(0)
}
