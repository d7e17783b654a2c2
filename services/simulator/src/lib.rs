//! Market simulator
//!
//! Stochastic tick engine over the instrument store. Each tick visits
//! every instrument once, derives an effective volatility from the
//! configured scenario, time-of-day phase, and rare flash excursions,
//! draws a correlated price move, applies kind-specific field updates,
//! and publishes the resulting delta through the store.
//!
//! This is a plausibility engine, not a pricing library: sensitivities
//! and Greeks are nudged, never solved for.

pub mod correlation;
pub mod engine;
mod kinds;

pub use engine::MarketSimulator;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
