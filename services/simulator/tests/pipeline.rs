//! End-to-end pipeline scenarios: simulator → store → dispatcher
//!
//! Replays the service's subscriber-facing behaviors with manual
//! ticks and explicit clocks. The subscribe flow mirrors the session
//! handler: snapshot the requested instruments through the predicate,
//! emit initial-data, then register the subscription.

use std::sync::{Arc, Mutex};

use market_data::dispatch::Dispatcher;
use market_data::events::ServerMessage;
use market_data::filter;
use market_data::metrics::FeedMetrics;
use market_data::registry::SubscriberRegistry;
use market_data::store::InstrumentStore;
use market_data::transport::testing::RecordingSink;
use market_data::transport::UpdateSink;
use simulator::MarketSimulator;
use types::config::{FeedConfig, Scenario, TimeOfDay, TimeOfDayMode};
use types::field::FieldValue;
use types::ids::{InstrumentId, SubscriptionId};
use types::instrument::{
    BondFields, Currency, FutureFields, Instrument, InstrumentStatus, Kind, Rating, Sector,
};
use types::predicate::Predicate;

fn config(update_frequency_ms: u64, max_updates_per_second: f64, bucket_size: f64) -> FeedConfig {
    FeedConfig {
        update_frequency_ms,
        max_updates_per_second,
        bucket_size,
        scenario: Scenario::Normal,
        time_of_day: TimeOfDayMode::Fixed(TimeOfDay::Morning),
        rng_seed: Some(42),
        ..FeedConfig::default()
    }
}

fn bond(id: &str) -> Instrument {
    Instrument {
        id: InstrumentId::new(id),
        description: format!("{id} bond"),
        currency: Currency::Usd,
        sector: Sector::Government,
        rating: Rating::Aaa,
        status: InstrumentStatus::Active,
        bid_price: 98.2,
        ask_price: 98.3,
        volume: 0.0,
        last_trade_price: None,
        last_trade_size: None,
        last_trade_time: None,
        last_update: 1_000,
        kind: Kind::Bond(BondFields {
            price: 98.25,
            yield_to_maturity: 4.25,
            coupon: 4.0,
            duration: 8.5,
            convexity: 82.0,
            spread_to_benchmark: 0.0,
            maturity_date: 2_026_000_000_000,
        }),
    }
}

fn future(id: &str) -> Instrument {
    Instrument {
        id: InstrumentId::new(id),
        description: format!("{id} future"),
        currency: Currency::Usd,
        sector: Sector::Government,
        rating: Rating::NotRated,
        status: InstrumentStatus::Active,
        bid_price: 111.48,
        ask_price: 111.52,
        volume: 0.0,
        last_trade_price: None,
        last_trade_size: None,
        last_trade_time: None,
        last_update: 1_000,
        kind: Kind::Future(FutureFields {
            price: 111.5,
            implied_rate: -11.5,
            open_interest: 1_000_000.0,
            contract_month: "SEP23".to_string(),
            expiry_date: 2_030_000_000_000,
        }),
    }
}

struct Pipeline {
    store: InstrumentStore,
    simulator: MarketSimulator,
    registry: Arc<Mutex<SubscriberRegistry>>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    fn new(config: FeedConfig, instruments: Vec<Instrument>) -> Self {
        let store = InstrumentStore::new();
        let mut simulator = MarketSimulator::new(config.clone());
        for instrument in instruments {
            let existing = store.list_all();
            store.insert(instrument.clone()).unwrap();
            simulator.instrument_added(&instrument, &existing);
        }

        let registry = Arc::new(Mutex::new(SubscriberRegistry::new(
            config.bucket_size,
            config.max_updates_per_second,
        )));
        let metrics = Arc::new(FeedMetrics::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), metrics);

        Self {
            store,
            simulator,
            registry,
            dispatcher,
        }
    }

    fn connect(&self, now_ms: i64) -> (u64, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::unbounded());
        let session = self
            .registry
            .lock()
            .unwrap()
            .register(sink.clone(), now_ms);
        (session, sink)
    }

    /// The session handler's subscribe flow: snapshot through the
    /// predicate, enqueue initial-data, then register.
    fn subscribe(
        &self,
        session: u64,
        sink: &RecordingSink,
        instrument_ids: &[&str],
        filter_json: Option<serde_json::Value>,
        frequency: Option<f64>,
    ) -> SubscriptionId {
        let ids: Vec<InstrumentId> = instrument_ids
            .iter()
            .map(|id| InstrumentId::new(*id))
            .collect();
        let predicate = filter_json.map(|value| Predicate::parse(&value).unwrap());

        let snapshots: Vec<serde_json::Value> = ids
            .iter()
            .filter_map(|id| self.store.get(id))
            .filter(|inst| filter::matches(predicate.as_ref(), &inst.field_map()))
            .filter_map(|inst| serde_json::to_value(inst.field_map()).ok())
            .collect();
        sink.try_send(ServerMessage::InitialData {
            instruments: snapshots,
        })
        .unwrap();

        self.registry
            .lock()
            .unwrap()
            .add_subscription(session, ids, predicate, frequency)
            .unwrap()
    }

    /// One simulator tick plus dispatch of every emitted delta.
    fn tick(&mut self, now_ms: i64) {
        for delta in self.simulator.tick(&self.store, now_ms) {
            if let Some(snapshot) = self.store.get(&delta.instrument_id) {
                self.dispatcher
                    .dispatch(&delta, &snapshot.field_map(), now_ms);
            }
        }
    }
}

fn updates(sink: &RecordingSink) -> Vec<(String, i64, usize)> {
    sink.sent
        .lock()
        .unwrap()
        .iter()
        .filter_map(|message| match message {
            ServerMessage::Update(delta) => Some((
                delta.instrument_id.as_str().to_string(),
                delta.timestamp,
                delta.fields.len(),
            )),
            _ => None,
        })
        .collect()
}

fn initial_data(sink: &RecordingSink) -> Vec<Vec<serde_json::Value>> {
    sink.sent
        .lock()
        .unwrap()
        .iter()
        .filter_map(|message| match message {
            ServerMessage::InitialData { instruments } => Some(instruments.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn single_subscriber_fanout() {
    // updateFrequencyMs=100, maxUpdatesPerSecond=20, bucketSize=20:
    // over a 2s window a lone subscriber sees one initial-data and
    // one paced update per tick
    let mut pipeline = Pipeline::new(config(100, 20.0, 20.0), vec![bond("US10Y")]);
    let (session, sink) = pipeline.connect(10_000);
    pipeline.subscribe(session, &sink, &["US10Y"], None, None);

    let mut now = 10_000;
    for _ in 0..20 {
        now += 100;
        pipeline.tick(now);
    }

    let initials = initial_data(&sink);
    assert_eq!(initials.len(), 1, "exactly one initial-data expected");
    assert_eq!(initials[0].len(), 1);
    assert_eq!(initials[0][0]["id"], "US10Y");

    let received = updates(&sink);
    assert!(
        (10..=40).contains(&received.len()),
        "expected 10..=40 updates over the window, got {}",
        received.len()
    );
    for (instrument, _, field_count) in &received {
        assert_eq!(instrument, "US10Y");
        assert!(*field_count > 0, "empty update delivered");
    }
}

#[test]
fn predicate_excludes_other_kinds() {
    let mut pipeline = Pipeline::new(
        config(100, 20.0, 20.0),
        vec![bond("US10Y"), future("ZN-U23")],
    );
    let (session, sink) = pipeline.connect(10_000);
    pipeline.subscribe(
        session,
        &sink,
        &["US10Y", "ZN-U23"],
        Some(serde_json::json!({"==": [{"var": "securityType"}, "Bond"]})),
        None,
    );

    let initials = initial_data(&sink);
    assert_eq!(initials[0].len(), 1, "initial-data must contain only the bond");
    assert_eq!(initials[0][0]["id"], "US10Y");

    let mut now = 10_000;
    for _ in 0..20 {
        now += 100;
        pipeline.tick(now);
    }

    for (instrument, _, _) in updates(&sink) {
        assert_ne!(
            instrument, "ZN-U23",
            "filtered instrument leaked through the predicate gate"
        );
    }
}

#[test]
fn pacing_caps_delivery_rate() {
    // maxUpdatesPerSecond=5, bucketSize=5, tick every 50ms: over 4s
    // at most bucket + rate·window = 25 updates get through
    let mut pipeline = Pipeline::new(config(50, 5.0, 5.0), vec![bond("US10Y")]);
    let (session, sink) = pipeline.connect(10_000);
    pipeline.subscribe(session, &sink, &["US10Y"], None, None);

    let mut now = 10_000;
    for _ in 0..80 {
        now += 50;
        pipeline.tick(now);
    }

    let received = updates(&sink).len();
    assert!(
        received <= 25,
        "pacing cap violated: {received} updates over 4s"
    );
}

#[test]
fn unsubscribe_is_prompt() {
    let mut pipeline = Pipeline::new(config(100, 20.0, 20.0), vec![bond("US10Y")]);
    let (session, sink) = pipeline.connect(10_000);
    let subscription = pipeline.subscribe(session, &sink, &["US10Y"], None, None);

    let mut now = 10_000;
    while updates(&sink).len() < 2 {
        now += 100;
        pipeline.tick(now);
    }

    pipeline
        .registry
        .lock()
        .unwrap()
        .remove_subscription(session, subscription)
        .unwrap();
    let after_unsubscribe = updates(&sink).len();

    // A further second of ticks delivers nothing
    for _ in 0..10 {
        now += 100;
        pipeline.tick(now);
    }
    assert_eq!(updates(&sink).len(), after_unsubscribe);
}

#[test]
fn subscribe_then_immediate_unsubscribe() {
    let mut pipeline = Pipeline::new(config(100, 20.0, 20.0), vec![bond("US10Y")]);
    let (session, sink) = pipeline.connect(10_000);
    let subscription = pipeline.subscribe(session, &sink, &["US10Y"], None, None);
    pipeline
        .registry
        .lock()
        .unwrap()
        .remove_subscription(session, subscription)
        .unwrap();

    let mut now = 10_000;
    for _ in 0..10 {
        now += 100;
        pipeline.tick(now);
    }

    assert_eq!(initial_data(&sink).len(), 1);
    assert!(updates(&sink).is_empty());
}

#[test]
fn frozen_simulator_delta_minimality() {
    // With the tick loop disabled, a manual change to one field must
    // produce a delta containing exactly that field
    let mut pipeline = Pipeline::new(config(100, 20.0, 20.0), vec![bond("US10Y")]);
    pipeline.simulator.set_enabled(false);
    let (session, sink) = pipeline.connect(10_000);
    pipeline.subscribe(session, &sink, &["US10Y"], None, None);

    pipeline.tick(10_100);
    assert!(updates(&sink).is_empty(), "frozen simulator still ticked");

    let id = InstrumentId::new("US10Y");
    let fields = serde_json::json!({"bidPrice": 98.4});
    pipeline
        .store
        .merge(&id, fields.as_object().unwrap())
        .unwrap();

    let delta = pipeline.store.publish(&id, 10_200).unwrap().unwrap();
    assert_eq!(delta.fields.len(), 1);
    assert_eq!(delta.fields.get("bidPrice"), Some(&FieldValue::Number(98.4)));

    let snapshot = pipeline.store.get(&id).unwrap().field_map();
    pipeline.dispatcher.dispatch(&delta, &snapshot, 10_200);
    let received = updates(&sink);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].2, 1);
}

#[test]
fn correlation_symmetry_same_attributes() {
    let pipeline = Pipeline::new(
        config(100, 20.0, 20.0),
        vec![bond("US02Y"), bond("US10Y"), bond("US30Y")],
    );

    let ids = [
        InstrumentId::new("US02Y"),
        InstrumentId::new("US10Y"),
        InstrumentId::new("US30Y"),
    ];
    let correlations = pipeline.simulator.correlations();
    for a in &ids {
        for b in &ids {
            if a == b {
                assert_eq!(correlations.coefficient(a, b), None);
                continue;
            }
            let ab = correlations.coefficient(a, b).unwrap();
            let ba = correlations.coefficient(b, a).unwrap();
            assert_eq!(ab, ba, "asymmetric coefficient for {a}/{b}");
            assert!(
                (0.0..=1.0).contains(&ab),
                "same-attribute coefficient {ab} outside [0, 1]"
            );
        }
    }
}

#[test]
fn non_trade_ticks_exclude_trade_fields() {
    let mut pipeline = Pipeline::new(config(100, 1_000.0, 1_000.0), vec![bond("US10Y")]);
    let (session, sink) = pipeline.connect(10_000);
    pipeline.subscribe(session, &sink, &["US10Y"], None, Some(1_000.0));

    let mut now = 10_000;
    for _ in 0..50 {
        now += 100;
        pipeline.tick(now);
    }

    // lastTradeTime advances on every trade, so any update carrying
    // trade telemetry must carry it; a repeated size or price may be
    // omitted as unchanged, but telemetry can never appear without a
    // trade having happened this tick
    let messages = sink.sent.lock().unwrap();
    for message in messages.iter() {
        if let ServerMessage::Update(delta) = message {
            let has_price = delta.fields.contains_key("lastTradePrice");
            let has_size = delta.fields.contains_key("lastTradeSize");
            let has_time = delta.fields.contains_key("lastTradeTime");
            if has_price || has_size {
                assert!(has_time, "trade telemetry without a trade timestamp");
            }
        }
    }
}
