//! Repair pass for stamp leaks in durable documents.
//!
//! A durable cell must be a bare scalar. A historical bug serialized whole
//! stamped slots, leaving `[scalar, stamp]` tuples in cell position; loading
//! such a document would nest stamps inside stamps and corrupt every later
//! merge of that cell. The repair runs on the raw JSON before decoding and
//! rewrites each leaked tuple back to its scalar.

use serde_json::Value;

/// Rewrites every `[scalar, stamp, ...]`-shaped cell or value in a
/// `[tables, values]` document to its scalar. Returns the number of slots
/// repaired; zero-leak documents are untouched. Idempotent.
pub fn unwrap_stamp_leak(doc: &mut Value) -> usize {
    let Some(parts) = doc.as_array_mut() else {
        return 0;
    };
    let mut repaired = 0;
    if let Some(tables) = parts.first_mut().and_then(Value::as_object_mut) {
        for rows in tables.values_mut().filter_map(Value::as_object_mut) {
            for cells in rows.values_mut().filter_map(Value::as_object_mut) {
                for cell in cells.values_mut() {
                    repaired += repair_slot(cell);
                }
            }
        }
    }
    if let Some(values) = parts.get_mut(1).and_then(Value::as_object_mut) {
        for value in values.values_mut() {
            repaired += repair_slot(value);
        }
    }
    repaired
}

/// Unwraps one slot, peeling nested leaks, and returns how many layers were
/// removed.
fn repair_slot(slot: &mut Value) -> usize {
    let mut layers = 0;
    while is_stamped_tuple(slot) {
        let scalar = slot
            .as_array_mut()
            .and_then(|tuple| tuple.first_mut())
            .map(Value::take)
            .unwrap_or(Value::Null);
        *slot = scalar;
        layers += 1;
    }
    layers
}

/// A two- or three-element array whose second element looks like a stamp:
/// either an encoded stamp string or a `{wall_time, logical}` object.
fn is_stamped_tuple(value: &Value) -> bool {
    let Some(tuple) = value.as_array() else {
        return false;
    };
    if !(2..=3).contains(&tuple.len()) {
        return false;
    }
    match &tuple[1] {
        Value::String(_) => true,
        Value::Object(fields) => fields.contains_key("wall_time") && fields.contains_key("logical"),
        _ => false,
    }
}
