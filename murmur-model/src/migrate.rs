//! Table-shape migration: fold the legacy flat `words` and `speaker_hints`
//! tables into serialized collections on their parent transcripts.
//!
//! Earlier versions stored every transcript word as its own row, which made
//! session datasets enormous and merges slow. Current versions embed the
//! collection as one JSON cell per transcript. This pass runs once after
//! load on the writer window, inside one transaction, and is a fast no-op
//! when no legacy rows exist.

use crate::schema::tables;
use murmur_store::MergeableStore;
use murmur_types::Cell;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

fn num(row: &murmur_store::Row, cell: &str) -> f64 {
    row.get(cell).and_then(Cell::as_num).unwrap_or_default()
}

fn text(row: &murmur_store::Row, cell: &str) -> String {
    row.get(cell)
        .and_then(Cell::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Embeds legacy word and speaker-hint rows into their transcripts.
///
/// Returns true when legacy rows were found and rewritten, in which case
/// the caller must schedule a durable save; false means the store was
/// already in the current shape.
pub fn embed_transcript_details(store: &mut MergeableStore) -> bool {
    let words = store.get_table(tables::WORDS);
    let hints = store.get_table(tables::SPEAKER_HINTS);
    if words.is_empty() && hints.is_empty() {
        return false;
    }

    // Group per transcript, words ordered by their start offset.
    let mut words_by_transcript: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for row in words.values() {
        let transcript_id = text(row, "transcript_id");
        if transcript_id.is_empty() {
            continue;
        }
        words_by_transcript.entry(transcript_id).or_default().push(json!({
            "text": text(row, "text"),
            "start_ms": num(row, "start_ms"),
            "end_ms": num(row, "end_ms"),
            "speaker": text(row, "speaker"),
        }));
    }
    for collection in words_by_transcript.values_mut() {
        collection.sort_by(|a, b| {
            let (a, b) = (a["start_ms"].as_f64(), b["start_ms"].as_f64());
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let mut hints_by_transcript: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for row in hints.values() {
        let transcript_id = text(row, "transcript_id");
        if transcript_id.is_empty() {
            continue;
        }
        hints_by_transcript.entry(transcript_id).or_default().push(json!({
            "label": text(row, "label"),
            "offset_ms": num(row, "offset_ms"),
        }));
    }

    store.transaction(|store| {
        for (transcript_id, collection) in &words_by_transcript {
            store.set_cell(
                tables::TRANSCRIPTS,
                transcript_id,
                "words",
                Value::Array(collection.clone()).to_string(),
            );
        }
        for (transcript_id, collection) in &hints_by_transcript {
            store.set_cell(
                tables::TRANSCRIPTS,
                transcript_id,
                "speaker_hints",
                Value::Array(collection.clone()).to_string(),
            );
        }
        for row_id in words.keys() {
            store.del_row(tables::WORDS, row_id);
        }
        for row_id in hints.keys() {
            store.del_row(tables::SPEAKER_HINTS, row_id);
        }
    });

    info!(
        transcripts = words_by_transcript.len(),
        legacy_words = words.len(),
        legacy_hints = hints.len(),
        "embedded legacy transcript details"
    );
    true
}
