//! Instrument store: authoritative catalog state
//!
//! Holds two snapshots per instrument: `current`, mutated by the
//! tick generator and admin merges, and `published`, the last state an
//! emitted delta reflected. The pair is swapped atomically inside the
//! map entry at emission time.
//!
//! Mutations are serialized per instrument by the map shard entry; a
//! writer to one instrument never blocks readers of others beyond an
//! O(1) critical section. Lookup by id is O(1) expected. The store
//! holds state only; delta computation is delegated to the delta
//! module and triggered through `publish`.

use dashmap::DashMap;
use tracing::debug;
use types::errors::FeedError;
use types::field::FieldValue;
use types::ids::InstrumentId;
use types::instrument::{Currency, Instrument, InstrumentStatus, Rating, SecurityType};

use crate::delta::{compute_delta, InstrumentDelta};

/// The snapshot pair tracked per instrument.
#[derive(Debug, Clone)]
struct StoredInstrument {
    current: Instrument,
    published: Instrument,
}

/// Catalog listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    pub security_type: Option<SecurityType>,
    pub currency: Option<Currency>,
    pub status: Option<InstrumentStatus>,
    pub rating: Option<Rating>,
}

impl CatalogFilter {
    fn matches(&self, instrument: &Instrument) -> bool {
        self.security_type
            .is_none_or(|t| instrument.security_type() == t)
            && self.currency.is_none_or(|c| instrument.currency == c)
            && self.status.is_none_or(|s| instrument.status == s)
            && self.rating.is_none_or(|r| instrument.rating == r)
    }
}

/// Shared, id-indexed instrument catalog.
pub struct InstrumentStore {
    instruments: DashMap<InstrumentId, StoredInstrument>,
}

impl InstrumentStore {
    pub fn new() -> Self {
        Self {
            instruments: DashMap::new(),
        }
    }

    /// Insert a new instrument. The published snapshot is initialized
    /// equal to the current state.
    pub fn insert(&self, instrument: Instrument) -> Result<(), FeedError> {
        instrument.validate()?;
        let id = instrument.id.clone();
        match self.instruments.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(FeedError::AlreadyExists {
                id: id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(instrument = %id, "instrument inserted");
                slot.insert(StoredInstrument {
                    published: instrument.clone(),
                    current: instrument,
                });
                Ok(())
            }
        }
    }

    /// Remove an instrument, returning its last current state.
    pub fn remove(&self, id: &InstrumentId) -> Result<Instrument, FeedError> {
        self.instruments
            .remove(id)
            .map(|(_, stored)| {
                debug!(instrument = %id, "instrument removed");
                stored.current
            })
            .ok_or_else(|| FeedError::InstrumentNotFound { id: id.to_string() })
    }

    /// Current snapshot of one instrument (cloned, never torn).
    pub fn get(&self, id: &InstrumentId) -> Option<Instrument> {
        self.instruments.get(id).map(|entry| entry.current.clone())
    }

    /// Last published snapshot of one instrument.
    pub fn get_published(&self, id: &InstrumentId) -> Option<Instrument> {
        self.instruments
            .get(id)
            .map(|entry| entry.published.clone())
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.instruments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// All instrument ids, sorted for deterministic visit order.
    pub fn ids(&self) -> Vec<InstrumentId> {
        let mut ids: Vec<InstrumentId> = self
            .instruments
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Current snapshots of the whole catalog. Consistency is
    /// per-instrument: each snapshot is whole, but instruments read
    /// at different instants may straddle an in-flight tick.
    pub fn list_all(&self) -> Vec<Instrument> {
        let mut all: Vec<Instrument> = self
            .instruments
            .iter()
            .map(|entry| entry.current.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Catalog listing restricted by kind/currency/status/rating.
    pub fn list_by(&self, filter: &CatalogFilter) -> Vec<Instrument> {
        let mut matching: Vec<Instrument> = self
            .instruments
            .iter()
            .filter(|entry| filter.matches(&entry.current))
            .map(|entry| entry.current.clone())
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        matching
    }

    /// Mutate one instrument's current state under its entry lock.
    pub fn update_with<F>(&self, id: &InstrumentId, mutate: F) -> Result<(), FeedError>
    where
        F: FnOnce(&mut Instrument),
    {
        let mut entry = self
            .instruments
            .get_mut(id)
            .ok_or_else(|| FeedError::InstrumentNotFound { id: id.to_string() })?;
        mutate(&mut entry.current);
        Ok(())
    }

    /// Field-wise merge into the current state (admin update path).
    ///
    /// All assignments are validated before any is applied, so a bad
    /// field name leaves the instrument untouched. `lastUpdate` moves
    /// only if the caller names it.
    pub fn merge(
        &self,
        id: &InstrumentId,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Instrument, FeedError> {
        let mut entry = self
            .instruments
            .get_mut(id)
            .ok_or_else(|| FeedError::InstrumentNotFound { id: id.to_string() })?;

        let mut updated = entry.current.clone();
        for (name, json) in fields {
            let value =
                FieldValue::from_json(json).ok_or_else(|| FeedError::InvalidArgument {
                    message: format!("field {name}: unsupported value"),
                })?;
            updated.apply_field(name, &value)?;
        }
        updated.validate()?;

        entry.current = updated.clone();
        Ok(updated)
    }

    /// Emit a delta for this instrument if its current state differs
    /// from the published snapshot, atomically advancing `published`
    /// to a copy of the current state on emission.
    pub fn publish(
        &self,
        id: &InstrumentId,
        now_ms: i64,
    ) -> Result<Option<InstrumentDelta>, FeedError> {
        let mut entry = self
            .instruments
            .get_mut(id)
            .ok_or_else(|| FeedError::InstrumentNotFound { id: id.to_string() })?;

        let published_map = entry.published.field_map();
        let current_map = entry.current.field_map();
        let delta = compute_delta(id, &published_map, &current_map, now_ms);
        if delta.is_some() {
            entry.published = entry.current.clone();
        }
        Ok(delta)
    }
}

impl Default for InstrumentStore {
    fn default() -> Self {
        Self::new()
    }
}
