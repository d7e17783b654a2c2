//! Shared application state for the gateway

use market_data::dispatch::Dispatcher;
use market_data::metrics::FeedMetrics;
use market_data::registry::SubscriberRegistry;
use market_data::store::InstrumentStore;
use simulator::MarketSimulator;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use types::config::FeedConfig;

/// Everything the handlers, the ticker, and the dispatcher share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FeedConfig>,
    pub store: Arc<InstrumentStore>,
    pub registry: Arc<Mutex<SubscriberRegistry>>,
    pub dispatcher: Arc<Dispatcher>,
    pub simulator: Arc<Mutex<MarketSimulator>>,
    pub metrics: Arc<FeedMetrics>,
}

impl AppState {
    pub fn new(config: FeedConfig) -> Self {
        let registry = Arc::new(Mutex::new(SubscriberRegistry::new(
            config.bucket_size,
            config.max_updates_per_second,
        )));
        let metrics = Arc::new(FeedMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
        ));
        let simulator = Arc::new(Mutex::new(MarketSimulator::new(config.clone())));
        Self {
            config: Arc::new(config),
            store: Arc::new(InstrumentStore::new()),
            registry,
            dispatcher,
            simulator,
            metrics,
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as i64
}
