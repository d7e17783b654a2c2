//! Correlation graph between instruments
//!
//! A symmetric sparse mapping from unordered id-pair to a coefficient
//! in [−1, 1], derived from categorical attributes when an instrument
//! is added and erased when it is removed. The diagonal is undefined.
//! Only the tick engine reads it.

use rand::Rng;
use std::collections::BTreeMap;
use types::ids::InstrumentId;
use types::instrument::Instrument;

/// Symmetric pairwise affinity coefficients.
#[derive(Debug, Default)]
pub struct CorrelationGraph {
    /// Keyed by (min, max) of the pair so lookups are order-free.
    coefficients: BTreeMap<(InstrumentId, InstrumentId), f64>,
}

fn pair_key(a: &InstrumentId, b: &InstrumentId) -> (InstrumentId, InstrumentId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl CorrelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive coefficients between the new instrument and every
    /// existing one:
    ///
    /// `strength · clamp(−1, 1, 0.3·[same kind] + 0.4·[same sector]
    ///  + 0.2·[same currency] + U(−0.1, 0.1))`
    pub fn instrument_added<R: Rng>(
        &mut self,
        added: &Instrument,
        existing: &[Instrument],
        strength: f64,
        rng: &mut R,
    ) {
        for other in existing {
            if other.id == added.id {
                continue;
            }
            let mut affinity: f64 = 0.0;
            if other.security_type() == added.security_type() {
                affinity += 0.3;
            }
            if other.sector == added.sector {
                affinity += 0.4;
            }
            if other.currency == added.currency {
                affinity += 0.2;
            }
            affinity += rng.gen_range(-0.1..0.1);

            let coefficient = strength * affinity.clamp(-1.0, 1.0);
            self.coefficients
                .insert(pair_key(&added.id, &other.id), coefficient);
        }
    }

    /// Erase every pair involving the removed instrument.
    pub fn instrument_removed(&mut self, id: &InstrumentId) {
        self.coefficients
            .retain(|(a, b), _| a != id && b != id);
    }

    /// The coefficient for an unordered pair; None on the diagonal or
    /// for unknown pairs.
    pub fn coefficient(&self, a: &InstrumentId, b: &InstrumentId) -> Option<f64> {
        if a == b {
            return None;
        }
        self.coefficients.get(&pair_key(a, b)).copied()
    }

    /// All correlated counterparties of one instrument.
    pub fn neighbors<'a>(
        &'a self,
        id: &'a InstrumentId,
    ) -> impl Iterator<Item = (&'a InstrumentId, f64)> + 'a {
        self.coefficients.iter().filter_map(move |((a, b), c)| {
            if a == id {
                Some((b, *c))
            } else if b == id {
                Some((a, *c))
            } else {
                None
            }
        })
    }

    /// Number of stored pairs.
    pub fn pair_count(&self) -> usize {
        self.coefficients.len()
    }
}
