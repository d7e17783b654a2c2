//! Market Data Service core
//!
//! Holds the authoritative instrument catalog and fans field-level
//! deltas out to subscribers:
//! - Instrument store with current/published snapshot pairs
//! - Delta engine producing minimal field-level diffs
//! - Subscriber registry with per-session token buckets and pacing
//! - Declarative predicate filter evaluation
//! - Dispatcher routing deltas through the admission gates
//! - Wire message definitions for the transport layer
//!
//! # Architecture
//!
//! ```text
//! Tick Generator (simulator crate)
//!        │ mutates
//!    ┌───▼───┐
//!    │ Store │  current ↔ published snapshot pair per instrument
//!    └───┬───┘
//!        │ publish() diff
//!    ┌───▼───┐
//!    │ Delta │  changed fields only, never empty
//!    └───┬───┘
//!        │
//!    ┌───▼────────┐   registry: interest, token bucket, pacing
//!    │ Dispatcher │ ← filter: predicate gate
//!    └───┬────────┘
//!        │ try_send (never blocks, full = drop)
//!    ┌───▼───────────┐
//!    │ UpdateSink(s) │  one per connected session
//!    └───────────────┘
//! ```

pub mod delta;
pub mod dispatch;
pub mod events;
pub mod filter;
pub mod metrics;
pub mod registry;
pub mod store;
pub mod transport;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
