//! Delta engine: minimal field-level diffs between snapshots
//!
//! Compares the last published snapshot of an instrument against its
//! current state and produces the set of changed fields. Equality is
//! the `FieldValue` contract: floating-point `==` for numbers,
//! epoch-millisecond integers for timestamps, element-wise for lists.
//!
//! Fields with unchanged values are omitted; a delta with no fields is
//! never emitted. The engine is idempotent: diffing twice with no
//! intervening mutation yields nothing the second time, because the
//! store swaps `published` to the emitted state at emission.

use serde::Serialize;
use std::collections::BTreeMap;
use types::field::{FieldMap, FieldValue};
use types::ids::InstrumentId;

/// A minimal field-level update for one instrument.
///
/// Wire shape: `{ instrumentId, timestamp, fields }` with epoch-ms
/// timestamps. Fields absent from the mapping are unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentDelta {
    pub instrument_id: InstrumentId,
    /// Emission time, epoch-ms
    pub timestamp: i64,
    /// Changed fields: wire name → new value
    pub fields: BTreeMap<String, FieldValue>,
}

impl InstrumentDelta {
    /// Number of changed fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Diff two field maps: every key of `current` whose value differs
/// from `published` (including keys absent from `published`, e.g. the
/// first trade writing `lastTradePrice`).
///
/// Keys present only in `published` cannot occur (instruments never
/// lose fields), so the comparison walks `current` alone.
pub fn diff_fields(published: &FieldMap, current: &FieldMap) -> BTreeMap<String, FieldValue> {
    let mut changed = BTreeMap::new();
    for (name, value) in current {
        if published.get(name) != Some(value) {
            changed.insert((*name).to_string(), value.clone());
        }
    }
    changed
}

/// Build a delta if anything changed between the two snapshots.
pub fn compute_delta(
    instrument_id: &InstrumentId,
    published: &FieldMap,
    current: &FieldMap,
    now_ms: i64,
) -> Option<InstrumentDelta> {
    let fields = diff_fields(published, current);
    if fields.is_empty() {
        return None;
    }
    Some(InstrumentDelta {
        instrument_id: instrument_id.clone(),
        timestamp: now_ms,
        fields,
    })
}
