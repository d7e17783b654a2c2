//! Stochastic tick engine
//!
//! Drives the instrument store once per tick: derives an effective
//! volatility from config, scenario, time-of-day, and rare flash
//! excursions; draws a correlated primary move per instrument;
//! applies the kind-specific update; and publishes the resulting
//! delta. A failure on one instrument is logged and the pass
//! continues; a single misbehaving instrument never halts the
//! simulator.
//!
//! The correlated term reads the realized percent changes recorded as
//! instruments are visited, so late-visited instruments see same-tick
//! values for earlier ones and previous-tick values otherwise.

use chrono::Timelike;
use market_data::delta::InstrumentDelta;
use market_data::store::InstrumentStore;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use types::config::{FeedConfig, TimeOfDay, TimeOfDayMode};
use types::errors::FeedError;
use types::ids::InstrumentId;
use types::instrument::{Instrument, Kind};

use crate::correlation::CorrelationGraph;
use crate::kinds::{advance_instrument, TickInputs};

/// Weight of the correlated term in the primary move.
const CORRELATION_WEIGHT: f64 = 0.3;

/// The market simulator: correlation graph, deterministic RNG, and
/// per-instrument move bookkeeping.
pub struct MarketSimulator {
    config: FeedConfig,
    rng: ChaCha8Rng,
    correlations: CorrelationGraph,
    /// Most recent realized percent change per instrument
    pct_changes: HashMap<InstrumentId, f64>,
    enabled: bool,
}

impl MarketSimulator {
    /// Create a simulator. A configured seed makes runs reproducible;
    /// otherwise one is drawn from the OS.
    pub fn new(config: FeedConfig) -> Self {
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        info!(seed, scenario = ?config.scenario, "market simulator initialized");
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            correlations: CorrelationGraph::new(),
            pct_changes: HashMap::new(),
            enabled: true,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn correlations(&self) -> &CorrelationGraph {
        &self.correlations
    }

    /// Freeze or resume the tick loop.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        info!(enabled, "simulator toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Wire the correlation rows for a newly added instrument.
    pub fn instrument_added(&mut self, added: &Instrument, existing: &[Instrument]) {
        self.correlations.instrument_added(
            added,
            existing,
            self.config.correlation_strength,
            &mut self.rng,
        );
    }

    /// Drop all simulator state for a removed instrument.
    pub fn instrument_removed(&mut self, id: &InstrumentId) {
        self.correlations.instrument_removed(id);
        self.pct_changes.remove(id);
    }

    /// The time-of-day phase in effect: pinned, or derived from the
    /// local wall clock.
    pub fn current_time_of_day(&self) -> TimeOfDay {
        match self.config.time_of_day {
            TimeOfDayMode::Fixed(phase) => phase,
            TimeOfDayMode::Auto => {
                let now = chrono::Local::now();
                TimeOfDay::from_clock(now.hour(), now.minute())
            }
        }
    }

    /// One logical tick: visit every instrument exactly once and
    /// collect the emitted deltas.
    pub fn tick(&mut self, store: &InstrumentStore, now_ms: i64) -> Vec<InstrumentDelta> {
        if !self.enabled {
            return Vec::new();
        }
        let time_of_day = self.current_time_of_day();
        let mut deltas = Vec::new();
        for id in store.ids() {
            match self.tick_instrument(store, &id, time_of_day, now_ms) {
                Ok(Some(delta)) => deltas.push(delta),
                Ok(None) => {}
                Err(err) => {
                    warn!(instrument = %id, error = %err, "tick failed for instrument, continuing");
                }
            }
        }
        deltas
    }

    /// Advance a single instrument and publish its delta. Exposed so
    /// the ticker task can yield between instruments.
    pub fn tick_instrument(
        &mut self,
        store: &InstrumentStore,
        id: &InstrumentId,
        time_of_day: TimeOfDay,
        now_ms: i64,
    ) -> Result<Option<InstrumentDelta>, FeedError> {
        let snapshot = store
            .get(id)
            .ok_or_else(|| FeedError::InstrumentNotFound { id: id.to_string() })?;

        let volatility = self.effective_volatility(time_of_day);
        let raw = (self.rng.gen::<f64>() - 0.5) * volatility
            + self.config.scenario.trend_bias() * volatility;
        let price_delta = raw + self.correlated_move(id);

        let (underlying_delta, underlying_mark) = match &snapshot.kind {
            Kind::Option(option) => match &option.underlying_id {
                Some(underlying) => (
                    self.pct_changes.get(underlying).copied(),
                    store.get(underlying).map(|u| u.trade_mark()),
                ),
                None => (None, None),
            },
            _ => (None, None),
        };

        let inputs = TickInputs {
            price_delta,
            underlying_delta,
            underlying_mark,
            now_ms,
        };

        let rng = &mut self.rng;
        let mut realized = 0.0;
        store.update_with(id, |instrument| {
            realized = advance_instrument(instrument, &inputs, rng);
        })?;
        self.pct_changes.insert(id.clone(), realized);

        store.publish(id, now_ms)
    }

    /// Base volatility shaped by time-of-day and scenario, with a
    /// rare flash excursion.
    fn effective_volatility(&mut self, time_of_day: TimeOfDay) -> f64 {
        let mut volatility = self.config.volatility_factor
            * time_of_day.volatility_multiplier()
            * self.config.scenario.volatility_multiplier();
        if self.rng.gen::<f64>() < self.config.flash_event_probability {
            debug!(
                magnitude = self.config.flash_event_magnitude,
                "flash excursion"
            );
            volatility *= self.config.flash_event_magnitude;
        }
        volatility
    }

    /// `0.3 · Σ c(i,j) · pct_change(j)` over correlated neighbors.
    fn correlated_move(&self, id: &InstrumentId) -> f64 {
        CORRELATION_WEIGHT
            * self
                .correlations
                .neighbors(id)
                .map(|(other, coefficient)| {
                    coefficient * self.pct_changes.get(other).copied().unwrap_or(0.0)
                })
                .sum::<f64>()
    }
}
