//! Example instrument catalog seeded at startup
//!
//! A small fixed-income desk: two Treasuries, a SOFR swap, the 10Y
//! note future, and a call on that future, so every kind and the
//! option-to-underlying link are exercised out of the box.

use tracing::info;
use types::errors::FeedError;
use types::ids::InstrumentId;
use types::instrument::{
    BondFields, Currency, FutureFields, Instrument, InstrumentStatus, Kind, OptionFields,
    OptionStyle, Rating, Sector, SwapFields,
};

use crate::state::{epoch_ms, AppState};

fn header(
    id: &str,
    description: &str,
    sector: Sector,
    rating: Rating,
    bid: f64,
    ask: f64,
    now_ms: i64,
    kind: Kind,
) -> Instrument {
    Instrument {
        id: InstrumentId::new(id),
        description: description.to_string(),
        currency: Currency::Usd,
        sector,
        rating,
        status: InstrumentStatus::Active,
        bid_price: bid,
        ask_price: ask,
        volume: 0.0,
        last_trade_price: None,
        last_trade_size: None,
        last_trade_time: None,
        last_update: now_ms,
        kind,
    }
}

fn example_catalog(now_ms: i64) -> Vec<Instrument> {
    vec![
        header(
            "US10Y",
            "US Treasury 10Y 4.0% Feb-2036",
            Sector::Government,
            Rating::Aaa,
            98.20,
            98.30,
            now_ms,
            Kind::Bond(BondFields {
                price: 98.25,
                yield_to_maturity: 4.21,
                coupon: 4.0,
                duration: 8.2,
                convexity: 80.5,
                spread_to_benchmark: 0.0,
                maturity_date: 2_086_000_000_000,
            }),
        ),
        header(
            "US30Y",
            "US Treasury 30Y 4.5% Feb-2056",
            Sector::Government,
            Rating::Aaa,
            101.10,
            101.26,
            now_ms,
            Kind::Bond(BondFields {
                price: 101.18,
                yield_to_maturity: 4.43,
                coupon: 4.5,
                duration: 16.8,
                convexity: 370.0,
                spread_to_benchmark: 22.0,
                maturity_date: 2_717_000_000_000,
            }),
        ),
        header(
            "USD-SOFR-5Y",
            "USD SOFR 5Y par swap",
            Sector::Financial,
            Rating::Aa,
            3.84,
            3.86,
            now_ms,
            Kind::Swap(SwapFields {
                swap_rate: 3.85,
                tenor_years: 5.0,
                notional: 10_000_000.0,
                fixed_dv01: 4_600.0,
                floating_dv01: 120.0,
            }),
        ),
        header(
            "ZN-U25",
            "10Y T-Note future Sep-2025",
            Sector::Government,
            Rating::NotRated,
            111.48,
            111.52,
            now_ms,
            Kind::Future(FutureFields {
                price: 111.50,
                implied_rate: -11.50,
                open_interest: 4_200_000.0,
                contract_month: "SEP25".to_string(),
                expiry_date: 1_758_000_000_000,
            }),
        ),
        header(
            "ZN-C-112",
            "Call 112 on ZN-U25",
            Sector::Government,
            Rating::NotRated,
            1.45,
            1.55,
            now_ms,
            Kind::Option(OptionFields {
                premium: 1.50,
                strike: 112.0,
                implied_volatility: 0.065,
                delta: 0.42,
                gamma: 0.11,
                theta: -0.018,
                vega: 0.14,
                intrinsic_value: 0.0,
                time_value: 1.50,
                style: OptionStyle::Call,
                underlying_id: Some(InstrumentId::new("ZN-U25")),
                expiry_date: 1_756_000_000_000,
            }),
        ),
    ]
}

/// Insert the example catalog and wire its correlation rows.
pub fn seed_examples(state: &AppState) -> Result<(), FeedError> {
    let now_ms = epoch_ms();
    for instrument in example_catalog(now_ms) {
        let existing = state.store.list_all();
        state.store.insert(instrument.clone())?;
        state
            .simulator
            .lock()
            .expect("simulator lock poisoned")
            .instrument_added(&instrument, &existing);
    }
    info!(count = state.store.len(), "example instruments seeded");
    Ok(())
}
