//! Unique identifier types for feed entities
//!
//! Instruments are keyed by stable human-readable symbols assigned by
//! the admin layer ("US10Y", "ZN-U25"). Subscriptions use UUID v7 for
//! time-sortable ordering so a session's subscriptions can be listed
//! chronologically.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier for an instrument
///
/// A free-form non-empty symbol chosen at insert time. Referenced by
/// subscriber interest sets, correlation rows, and option-to-underlying
/// links; never a pointer into the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Create a new InstrumentId from a symbol string
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the symbol is empty (rejected at the request boundary)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a subscription
///
/// Uses UUID v7 for time-based sorting within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new SubscriptionId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
