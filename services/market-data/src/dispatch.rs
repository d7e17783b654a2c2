//! Dispatcher: routes deltas through the per-session admission gates
//!
//! For each delta the dispatcher enumerates interested sessions and
//! runs three gates in order (token bucket, pacing interval,
//! subscription/predicate) and hands the delta to the session's
//! transport sink. Gate checks run under the registry lock; the sends
//! themselves do not, so one stuck transport never stalls the whole
//! fan-out. Send times are recorded only for deliveries the sink
//! accepted, so a transport-full drop leaves the next delta to be
//! attempted fresh.
//!
//! Within one (session, instrument) pair deltas go out in emission
//! order; across instruments or sessions no ordering is promised.

use std::sync::{Arc, Mutex};
use tracing::{debug, trace};
use types::field::FieldMap;

use crate::delta::InstrumentDelta;
use crate::events::ServerMessage;
use crate::metrics::FeedMetrics;
use crate::registry::{Admission, SessionId, SubscriberRegistry};
use crate::transport::{SinkError, UpdateSink};

/// Shared handle to the subscriber registry.
pub type SharedRegistry = Arc<Mutex<SubscriberRegistry>>;

/// Fan-out dispatcher over a shared registry.
pub struct Dispatcher {
    registry: SharedRegistry,
    metrics: Arc<FeedMetrics>,
}

impl Dispatcher {
    pub fn new(registry: SharedRegistry, metrics: Arc<FeedMetrics>) -> Self {
        Self { registry, metrics }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Route one delta. `snapshot_fields` is the instrument's current
    /// field map, used for predicate evaluation. Returns the number
    /// of sessions the delta was delivered to.
    pub fn dispatch(
        &self,
        delta: &InstrumentDelta,
        snapshot_fields: &FieldMap,
        now_ms: i64,
    ) -> usize {
        // Phase 1: admission under the registry lock. try_send is
        // deliberately not called here.
        let admitted: Vec<(SessionId, Arc<dyn UpdateSink>)> = {
            let mut registry = self.registry.lock().expect("registry lock poisoned");
            let interested = registry.interested(&delta.instrument_id);
            let mut admitted = Vec::with_capacity(interested.len());
            for session_id in interested {
                match registry.admit(session_id, &delta.instrument_id, now_ms) {
                    Admission::Granted => {}
                    Admission::NoToken => {
                        self.metrics.record_drop_bucket();
                        trace!(
                            session = session_id,
                            instrument = %delta.instrument_id,
                            "delta dropped, token bucket empty"
                        );
                        continue;
                    }
                    Admission::TooSoon => {
                        self.metrics.record_drop_pacing();
                        trace!(
                            session = session_id,
                            instrument = %delta.instrument_id,
                            "delta dropped inside pacing interval"
                        );
                        continue;
                    }
                    Admission::UnknownSession => continue,
                }
                if !registry.subscription_matches(
                    session_id,
                    &delta.instrument_id,
                    snapshot_fields,
                ) {
                    self.metrics.record_drop_filter();
                    continue;
                }
                if let Some(sink) = registry.sink(session_id) {
                    admitted.push((session_id, sink));
                }
            }
            admitted
        };

        // Phase 2: sends, outside the lock.
        let mut delivered: Vec<SessionId> = Vec::with_capacity(admitted.len());
        for (session_id, sink) in admitted {
            match sink.try_send(ServerMessage::Update(delta.clone())) {
                Ok(()) => {
                    self.metrics.record_sent();
                    delivered.push(session_id);
                }
                Err(SinkError::Full) => {
                    self.metrics.record_drop_transport();
                    debug!(
                        session = session_id,
                        instrument = %delta.instrument_id,
                        "transport queue full, update dropped"
                    );
                }
                Err(SinkError::Closed) => {
                    self.metrics.record_drop_transport();
                    debug!(session = session_id, "transport closed, update dropped");
                }
            }
        }

        // Phase 3: record send times for accepted deliveries.
        if !delivered.is_empty() {
            let mut registry = self.registry.lock().expect("registry lock poisoned");
            for session_id in &delivered {
                registry.record_sent(*session_id, &delta.instrument_id, now_ms);
            }
        }

        delivered.len()
    }
}
