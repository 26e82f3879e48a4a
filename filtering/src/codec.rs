//! Compact record format for persisted favorites.
//!
//! Each favorite becomes one slot `"<b64 name>|<b64 hash>|<rfc3339 created>"`
//! keyed by its position. History entries are never packed.

use crate::canonical::deparam;
use crate::entry::Entry;
use crate::entry::EntryStatus;
use crate::error::CodecError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;
use std::collections::HashSet;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

/// Position (as a decimal string) to packed slot.
pub type PackedRecord = BTreeMap<String, String>;

const FIELD_SEPARATOR: char = '|';

pub fn pack(entries: &[Entry]) -> PackedRecord {
    entries
        .iter()
        .filter(|entry| entry.is_favorite())
        .filter_map(|entry| match encode_slot(entry) {
            Ok(slot) => Some(slot),
            Err(err) => {
                warn!("skipping favorite {:?}: {err}", entry.canonical_hash);
                None
            }
        })
        .enumerate()
        .map(|(position, slot)| (position.to_string(), slot))
        .collect()
}

/// Decodes every usable slot in ascending position order. Broken slots are
/// skipped; a repeated hash keeps its first slot.
pub fn unpack(record: &PackedRecord) -> Vec<Entry> {
    let mut slots = Vec::with_capacity(record.len());
    for (key, value) in record {
        match key.trim().parse::<u64>() {
            Ok(position) => slots.push((position, value)),
            Err(_) => warn!("ignoring favorites slot: {}", CodecError::SlotKey(key.clone())),
        }
    }
    slots.sort_by_key(|(position, _)| *position);

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(slots.len());
    for (position, value) in slots {
        match decode_slot(value) {
            Ok(entry) if seen.insert(entry.canonical_hash.clone()) => entries.push(entry),
            Ok(entry) => warn!(
                "dropping duplicate favorite {:?} at slot {position}",
                entry.canonical_hash
            ),
            Err(err) => warn!("dropping favorites slot {position}: {err}"),
        }
    }
    entries
}

pub fn encode_slot(entry: &Entry) -> Result<String, CodecError> {
    let created = entry
        .created_at
        .format(&Rfc3339)
        .map_err(|err| CodecError::Timestamp {
            value: entry.created_at.to_string(),
            reason: err.to_string(),
        })?;
    Ok(format!(
        "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{created}",
        STANDARD.encode(entry.name.as_bytes()),
        STANDARD.encode(entry.canonical_hash.as_bytes()),
    ))
}

pub fn decode_slot(slot: &str) -> Result<Entry, CodecError> {
    let fields = slot.split(FIELD_SEPARATOR).collect::<Vec<_>>();
    let [name, hash, created] = fields.as_slice() else {
        return Err(CodecError::FieldCount(fields.len()));
    };
    let name = decode_text("name", name)?;
    let canonical_hash = decode_text("hash", hash)?;
    let created_at =
        OffsetDateTime::parse(created, &Rfc3339).map_err(|err| CodecError::Timestamp {
            value: (*created).to_string(),
            reason: err.to_string(),
        })?;
    Ok(Entry {
        name,
        parameters: deparam(&canonical_hash),
        canonical_hash,
        created_at,
        last_visited_at: None,
        status: EntryStatus::Favorite,
    })
}

fn decode_text(field: &'static str, encoded: &str) -> Result<String, CodecError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|err| CodecError::Base64 {
            field,
            reason: err.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|_| CodecError::Utf8(field))
}
