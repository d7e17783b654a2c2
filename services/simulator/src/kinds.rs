//! Kind-specific tick updates
//!
//! Applies one tick's price move to an instrument's fields. Each kind
//! updates its own payload plus the shared quote header; trade
//! telemetry is written only when the trade draw fires, so ticks
//! without a trade can never surface trade fields in a delta.
//!
//! Floors: bond price 0.1, swap rate 0.001, future price 0.01, option
//! premium 0.001.

use rand::Rng;
use types::instrument::{Instrument, Kind};

/// Per-instrument inputs for one tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TickInputs {
    /// Primary move in percent, already trend-biased and correlated
    pub price_delta: f64,
    /// Underlying's realized move this/last tick, for options
    pub underlying_delta: Option<f64>,
    /// Underlying's current trade mark, for intrinsic value
    pub underlying_mark: Option<f64>,
    pub now_ms: i64,
}

/// Outcome of the kind-specific step, applied to the shared header
/// after the payload borrow ends.
struct KindOutcome {
    /// New mid used to derive bid/ask
    mid: f64,
    /// Spread coefficient for this kind
    spread_coefficient: f64,
    /// Trade fill (price, size) when the trade draw fired
    trade: Option<(f64, f64)>,
}

/// Advance one instrument by one tick. Returns the realized percent
/// change of its mark, which feeds the correlation term of later
/// visits.
pub(crate) fn advance_instrument<R: Rng>(
    instrument: &mut Instrument,
    inputs: &TickInputs,
    rng: &mut R,
) -> f64 {
    let previous_mark = instrument.mark_price();
    let last_trade_price = instrument.last_trade_price;

    let outcome = match &mut instrument.kind {
        Kind::Bond(bond) => {
            let d = inputs.price_delta;
            bond.price = (bond.price * (1.0 + d / 100.0)).max(0.1);
            // Yield moves inversely to price
            bond.yield_to_maturity -= d * 1.2 / 100.0;
            bond.duration *= 1.0 + rng.gen_range(-0.005..0.005);
            bond.convexity *= 1.0 + rng.gen_range(-0.005..0.005);
            bond.spread_to_benchmark *= 1.0 + rng.gen_range(-0.01..0.01);

            let trade = if rng.gen_bool(0.10) {
                let size = rng.gen_range(1..=10) as f64 * 1_000_000.0;
                Some((bond.price, size))
            } else {
                None
            };
            KindOutcome {
                mid: bond.price,
                spread_coefficient: 0.05,
                trade,
            }
        }
        Kind::Swap(swap) => {
            let d = inputs.price_delta;
            swap.swap_rate = (swap.swap_rate + d / 100.0).max(0.001);
            swap.fixed_dv01 *= 1.0 + rng.gen_range(-0.005..0.005);
            swap.floating_dv01 *= 1.0 + rng.gen_range(-0.005..0.005);

            let trade = if rng.gen_bool(0.05) {
                let size = rng.gen_range(1..=20) as f64 * 5_000_000.0;
                Some((swap.swap_rate, size))
            } else {
                None
            };
            KindOutcome {
                mid: swap.swap_rate,
                spread_coefficient: 0.02,
                trade,
            }
        }
        Kind::Future(future) => {
            let d = inputs.price_delta;
            // Futures move off the latest print, not the stale quote
            let base = last_trade_price.unwrap_or(future.price);
            future.price = (base * (1.0 + d / 100.0)).max(0.01);
            future.implied_rate = 100.0 - future.price;
            future.open_interest =
                (future.open_interest + ((rng.gen::<f64>() - 0.45) * 100.0).floor()).max(0.0);

            let trade = if rng.gen_bool(0.20) {
                let size = rng.gen_range(1..=50) as f64 * 100_000.0;
                Some((future.price, size))
            } else {
                None
            };
            KindOutcome {
                mid: future.price,
                spread_coefficient: 0.01,
                trade,
            }
        }
        Kind::Option(option) => {
            let u = inputs.underlying_delta.unwrap_or(inputs.price_delta);
            let scale = inputs.underlying_mark.unwrap_or(100.0) / 100.0;
            let change =
                (option.delta * u + 0.5 * option.gamma * u * u - option.theta / 365.0) * scale;
            option.premium = (option.premium + change).max(0.001);

            option.implied_volatility =
                (option.implied_volatility + rng.gen_range(-0.005..0.005)).max(0.0001);

            let (lo, hi) = option.style.delta_bounds();
            option.delta = (option.delta * (1.0 + rng.gen_range(-0.01..0.01))).clamp(lo, hi);
            option.gamma *= 1.0 + rng.gen_range(-0.01..0.01);
            option.theta *= 1.0 + rng.gen_range(-0.01..0.01);
            option.vega *= 1.0 + rng.gen_range(-0.01..0.01);

            if let Some(underlying_mark) = inputs.underlying_mark {
                option.intrinsic_value = option.style.intrinsic(underlying_mark, option.strike);
            }
            option.time_value = (option.premium - option.intrinsic_value).max(0.0);

            let trade = if rng.gen_bool(0.05) {
                let size = rng.gen_range(1..=10) as f64 * 100.0;
                Some((option.premium, size))
            } else {
                None
            };
            KindOutcome {
                mid: option.premium,
                spread_coefficient: 0.05,
                trade,
            }
        }
    };

    let spread =
        outcome.spread_coefficient * (1.0 + 2.0 * inputs.price_delta.abs()).max(0.5);
    instrument.bid_price = (outcome.mid * (1.0 - spread / 200.0)).max(0.0);
    instrument.ask_price = outcome.mid * (1.0 + spread / 200.0);

    if let Some((price, size)) = outcome.trade {
        instrument.last_trade_price = Some(price);
        instrument.last_trade_size = Some(size);
        instrument.last_trade_time = Some(inputs.now_ms);
        instrument.volume += size;
    }

    instrument.touch(inputs.now_ms);

    if previous_mark != 0.0 {
        (instrument.mark_price() - previous_mark) / previous_mark * 100.0
    } else {
        0.0
    }
}
