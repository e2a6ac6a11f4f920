//! Versioned on-disk format for the entry history.
//!
//! Version 1 is the bare JSON array the first client wrote (`date`, `icon`,
//! optional `aiResponse`/`suggestions`). Version 2 wraps the entries in
//! `{"version": 2, "entries": [...]}`. Every record is treated as untrusted
//! input and repaired field by field after the upgrade chain runs.

use super::StoreError;
use crate::entry::{JournalEntry, SuggestedAction, MISSING_RESPONSE};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const CURRENT_VERSION: u64 = 2;

type RecordUpgrade = fn(&mut Map<String, Value>);

/// Upgrade steps indexed by the version they upgrade *from*.
const UPGRADES: &[(u64, RecordUpgrade)] = &[(1, upgrade_v1_record)];

#[derive(Serialize)]
struct Envelope<'a> {
    version: u64,
    entries: &'a [JournalEntry],
}

#[derive(Debug, Default)]
pub struct Decoded {
    pub entries: Vec<JournalEntry>,
    /// Reasons for records that could not be repaired and were dropped.
    pub dropped: Vec<String>,
}

pub fn encode(entries: &[JournalEntry]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        version: CURRENT_VERSION,
        entries,
    })
}

pub fn decode(blob: &str) -> Result<Decoded, StoreError> {
    let value: Value =
        serde_json::from_str(blob).map_err(|e| StoreError::Parse(e.to_string()))?;
    let (version, records) = split_envelope(value)?;

    let mut decoded = Decoded::default();
    let mut seen = HashSet::new();

    for (index, record) in records.into_iter().enumerate() {
        let Value::Object(mut fields) = record else {
            decoded
                .dropped
                .push(format!("record {index}: not an object"));
            continue;
        };

        for (from, upgrade) in UPGRADES {
            if *from >= version {
                upgrade(&mut fields);
            }
        }

        match repair_record(fields) {
            Ok(entry) => {
                if seen.insert(entry.id.clone()) {
                    decoded.entries.push(entry);
                } else {
                    decoded
                        .dropped
                        .push(format!("record {index}: duplicate id {}", entry.id));
                }
            }
            Err(reason) => decoded.dropped.push(format!("record {index}: {reason}")),
        }
    }

    Ok(decoded)
}

fn split_envelope(value: Value) -> Result<(u64, Vec<Value>), StoreError> {
    match value {
        Value::Array(records) => Ok((1, records)),
        Value::Object(mut envelope) => {
            let version = envelope
                .get("version")
                .and_then(Value::as_u64)
                .ok_or_else(|| StoreError::Parse("missing schema version".to_string()))?;
            if version == 0 {
                return Err(StoreError::Parse("schema version 0".to_string()));
            }
            if version > CURRENT_VERSION {
                return Err(StoreError::UnsupportedVersion(version));
            }
            match envelope.remove("entries") {
                Some(Value::Array(records)) => Ok((version, records)),
                _ => Err(StoreError::Parse("missing entries array".to_string())),
            }
        }
        _ => Err(StoreError::Parse(
            "expected an array or a versioned object".to_string(),
        )),
    }
}

fn upgrade_v1_record(fields: &mut Map<String, Value>) {
    if !fields.contains_key("createdAt") {
        if let Some(date) = fields.remove("date") {
            fields.insert("createdAt".to_string(), date);
        }
    }
    if let Some(Value::Array(suggestions)) = fields.get_mut("suggestions") {
        for suggestion in suggestions.iter_mut() {
            if let Value::Object(s) = suggestion {
                if !s.contains_key("iconKey") {
                    if let Some(icon) = s.remove("icon") {
                        s.insert("iconKey".to_string(), icon);
                    }
                }
            }
        }
    }
}

fn repair_record(mut fields: Map<String, Value>) -> Result<JournalEntry, String> {
    let id = match fields.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err("missing id".to_string()),
    };

    let content = match fields.remove("content") {
        Some(Value::String(content)) => content,
        _ => return Err(format!("entry {id} has no content")),
    };

    let created_at = match fields.remove("createdAt") {
        Some(Value::String(created_at)) => created_at,
        _ => String::new(),
    };

    let sentiment = match fields.remove("sentiment") {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    };

    let is_concerning = matches!(fields.remove("isConcerning"), Some(Value::Bool(true)));

    let ai_response = match fields.remove("aiResponse") {
        Some(Value::String(r)) if !r.is_empty() => r,
        _ => MISSING_RESPONSE.to_string(),
    };

    let suggestions = match fields.remove("suggestions") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<SuggestedAction>(item) {
                Ok(action) => Some(action),
                Err(e) => {
                    log::debug!("Dropping malformed suggestion on entry {id}: {e}");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(JournalEntry {
        id,
        content,
        created_at,
        sentiment,
        is_concerning,
        ai_response,
        suggestions,
    })
}
