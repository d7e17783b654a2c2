//! Subscriber registry: sessions, subscriptions, and pacing state
//!
//! Tracks every connected session, its subscriptions (interest set +
//! optional predicate + pacing hint), its token bucket, and the last
//! send time per instrument. All of that state is owned here and
//! mutated only through registry operations; session tasks and the
//! dispatcher never reach into it directly.
//!
//! Every operation takes an explicit `now_ms` so admission behavior
//! is fully testable without wall-clock sleeps.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use types::errors::FeedError;
use types::ids::{InstrumentId, SubscriptionId};
use types::predicate::Predicate;

use crate::transport::UpdateSink;

/// Session identifier, assigned at registration. Never leaves the
/// process, so a plain counter is enough.
pub type SessionId = u64;

/// Rate-limit primitive: capacity C, continuous refill at r
/// tokens/second computed lazily from elapsed wall time.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill_ms: i64,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_sec: f64, now_ms: i64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill_ms: now_ms,
        }
    }

    fn refill(&mut self, now_ms: i64) {
        let elapsed_ms = (now_ms - self.last_refill_ms).max(0);
        self.tokens = f64::min(
            self.capacity,
            self.tokens + elapsed_ms as f64 / 1000.0 * self.refill_per_sec,
        );
        self.last_refill_ms = now_ms;
    }

    /// Admit one request, consuming exactly one token.
    pub fn try_admit(&mut self, now_ms: i64) -> bool {
        self.refill(now_ms);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Change capacity and refill rate at runtime, preserving the
    /// current level and crediting any capacity increase.
    pub fn reconfigure(&mut self, capacity: f64, refill_per_sec: f64) {
        if capacity > self.capacity {
            self.tokens += capacity - self.capacity;
        }
        self.capacity = capacity;
        self.refill_per_sec = refill_per_sec;
        self.tokens = self.tokens.min(capacity);
    }

    /// Current token level (post-refill at construction or last check).
    pub fn level(&self) -> f64 {
        self.tokens
    }
}

/// Outcome of a (session, instrument) admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Token consumed, pacing satisfied
    Granted,
    /// Bucket empty
    NoToken,
    /// Token consumed but still inside the pacing interval
    TooSoon,
    /// Session is gone
    UnknownSession,
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// One subscription: interest set + optional predicate + pacing hint.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Ordered, non-empty set of instrument ids of interest
    pub instrument_ids: Vec<InstrumentId>,
    pub predicate: Option<Predicate>,
    /// Desired updates per second; server default when None
    pub max_updates_per_second: Option<f64>,
}

impl Subscription {
    pub fn covers(&self, id: &InstrumentId) -> bool {
        self.instrument_ids.contains(id)
    }
}

/// Per-session state owned by the registry.
struct SessionState {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    bucket: TokenBucket,
    /// Last successful send time per instrument, epoch-ms
    last_sent: HashMap<InstrumentId, i64>,
    sink: Arc<dyn UpdateSink>,
}

/// Registry of connected subscribers.
pub struct SubscriberRegistry {
    sessions: BTreeMap<SessionId, SessionState>,
    next_session: SessionId,
    /// Fallback refill rate and pacing frequency, updates/second
    default_updates_per_second: f64,
    bucket_capacity: f64,
}

impl SubscriberRegistry {
    pub fn new(bucket_capacity: f64, default_updates_per_second: f64) -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_session: 1,
            default_updates_per_second,
            bucket_capacity,
        }
    }

    /// Register a connected session with its outbound sink.
    pub fn register(&mut self, sink: Arc<dyn UpdateSink>, now_ms: i64) -> SessionId {
        let session_id = self.next_session;
        self.next_session += 1;
        self.sessions.insert(
            session_id,
            SessionState {
                subscriptions: BTreeMap::new(),
                bucket: TokenBucket::new(
                    self.bucket_capacity,
                    self.default_updates_per_second,
                    now_ms,
                ),
                last_sent: HashMap::new(),
                sink,
            },
        );
        debug!(session = session_id, "session registered");
        session_id
    }

    /// Detach a session, dropping its subscriptions and bucket.
    pub fn unregister(&mut self, session_id: SessionId) -> bool {
        let removed = self.sessions.remove(&session_id).is_some();
        if removed {
            debug!(session = session_id, "session unregistered");
        }
        removed
    }

    /// Create a subscription for a session.
    pub fn add_subscription(
        &mut self,
        session_id: SessionId,
        instrument_ids: Vec<InstrumentId>,
        predicate: Option<Predicate>,
        max_updates_per_second: Option<f64>,
    ) -> Result<SubscriptionId, FeedError> {
        if instrument_ids.is_empty() {
            return Err(FeedError::InvalidArgument {
                message: "subscription requires at least one instrument id".to_string(),
            });
        }
        if instrument_ids.iter().any(|id| id.is_empty()) {
            return Err(FeedError::InvalidArgument {
                message: "instrument ids must not be empty".to_string(),
            });
        }
        if max_updates_per_second.is_some_and(|f| f <= 0.0 || !f.is_finite()) {
            return Err(FeedError::InvalidArgument {
                message: "updateFrequency must be a positive number".to_string(),
            });
        }

        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(FeedError::SessionNotFound { id: session_id })?;

        let subscription_id = SubscriptionId::new();
        session.subscriptions.insert(
            subscription_id,
            Subscription {
                id: subscription_id,
                instrument_ids,
                predicate,
                max_updates_per_second,
            },
        );
        debug!(session = session_id, subscription = %subscription_id, "subscription added");
        Ok(subscription_id)
    }

    /// Destroy a subscription.
    pub fn remove_subscription(
        &mut self,
        session_id: SessionId,
        subscription_id: SubscriptionId,
    ) -> Result<(), FeedError> {
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(FeedError::SessionNotFound { id: session_id })?;
        session
            .subscriptions
            .remove(&subscription_id)
            .map(|_| {
                debug!(session = session_id, subscription = %subscription_id, "subscription removed");
            })
            .ok_or_else(|| FeedError::SubscriptionNotFound {
                id: subscription_id.to_string(),
            })
    }

    /// Sessions with any subscription listing this instrument.
    pub fn interested(&self, instrument_id: &InstrumentId) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, state)| {
                state
                    .subscriptions
                    .values()
                    .any(|sub| sub.covers(instrument_id))
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Minimum inter-update interval for a (session, instrument)
    /// pair: 1000 / max frequency over the session's subscriptions
    /// covering the instrument, falling back to the server default.
    pub fn pacing_interval_ms(
        &self,
        session_id: SessionId,
        instrument_id: &InstrumentId,
    ) -> f64 {
        let frequency = self
            .sessions
            .get(&session_id)
            .and_then(|state| {
                state
                    .subscriptions
                    .values()
                    .filter(|sub| sub.covers(instrument_id))
                    .filter_map(|sub| sub.max_updates_per_second)
                    .fold(None, |acc: Option<f64>, f| {
                        Some(acc.map_or(f, |a| a.max(f)))
                    })
            })
            .unwrap_or(self.default_updates_per_second);
        1000.0 / frequency
    }

    /// Token-bucket and pacing admission for one (session,
    /// instrument) delivery. The token is consumed at the bucket gate
    /// even if the pacing gate then refuses.
    pub fn admit(
        &mut self,
        session_id: SessionId,
        instrument_id: &InstrumentId,
        now_ms: i64,
    ) -> Admission {
        let interval_ms = self.pacing_interval_ms(session_id, instrument_id);
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Admission::UnknownSession;
        };

        if !session.bucket.try_admit(now_ms) {
            return Admission::NoToken;
        }

        match session.last_sent.get(instrument_id) {
            Some(last) if ((now_ms - last) as f64) < interval_ms => Admission::TooSoon,
            _ => Admission::Granted,
        }
    }

    /// Record a successful delivery for pacing purposes.
    pub fn record_sent(
        &mut self,
        session_id: SessionId,
        instrument_id: &InstrumentId,
        now_ms: i64,
    ) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.last_sent.insert(instrument_id.clone(), now_ms);
        }
    }

    /// Whether any of the session's subscriptions covering this
    /// instrument admits the given snapshot through its predicate.
    pub fn subscription_matches(
        &self,
        session_id: SessionId,
        instrument_id: &InstrumentId,
        fields: &types::field::FieldMap,
    ) -> bool {
        let Some(session) = self.sessions.get(&session_id) else {
            return false;
        };
        session
            .subscriptions
            .values()
            .filter(|sub| sub.covers(instrument_id))
            .any(|sub| crate::filter::matches(sub.predicate.as_ref(), fields))
    }

    /// The session's outbound sink.
    pub fn sink(&self, session_id: SessionId) -> Option<Arc<dyn UpdateSink>> {
        self.sessions
            .get(&session_id)
            .map(|state| Arc::clone(&state.sink))
    }

    /// Apply new bucket parameters to every session, preserving
    /// current levels.
    pub fn reconfigure_buckets(&mut self, capacity: f64, refill_per_sec: f64) {
        self.bucket_capacity = capacity;
        self.default_updates_per_second = refill_per_sec;
        for state in self.sessions.values_mut() {
            state.bucket.reconfigure(capacity, refill_per_sec);
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.sessions
            .values()
            .map(|state| state.subscriptions.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingSink;

    fn registry() -> SubscriberRegistry {
        SubscriberRegistry::new(20.0, 10.0)
    }

    fn sink() -> Arc<RecordingSink> {
        Arc::new(RecordingSink::unbounded())
    }

    #[test]
    fn test_token_bucket_consumes_and_refills() {
        let mut bucket = TokenBucket::new(2.0, 10.0, 0);
        assert!(bucket.try_admit(0));
        assert!(bucket.try_admit(0));
        assert!(!bucket.try_admit(0)); // drained

        // 10 tokens/s → one token back after 100ms
        assert!(bucket.try_admit(100));
        assert!(!bucket.try_admit(100));
    }

    #[test]
    fn test_token_bucket_clamps_to_capacity() {
        let mut bucket = TokenBucket::new(5.0, 100.0, 0);
        // Long idle must not overfill
        bucket.refill(60_000);
        assert!(bucket.level() <= 5.0);
    }

    #[test]
    fn test_token_bucket_reconfigure_preserves_level() {
        let mut bucket = TokenBucket::new(10.0, 1.0, 0);
        for _ in 0..4 {
            assert!(bucket.try_admit(0));
        }
        assert_eq!(bucket.level(), 6.0);

        // Capacity increase credits the delta
        bucket.reconfigure(15.0, 1.0);
        assert_eq!(bucket.level(), 11.0);

        // Capacity decrease clamps
        bucket.reconfigure(3.0, 1.0);
        assert_eq!(bucket.level(), 3.0);
    }

    #[test]
    fn test_register_unregister() {
        let mut reg = registry();
        let s1 = reg.register(sink(), 0);
        let s2 = reg.register(sink(), 0);
        assert_ne!(s1, s2);
        assert_eq!(reg.session_count(), 2);

        assert!(reg.unregister(s1));
        assert!(!reg.unregister(s1));
        assert_eq!(reg.session_count(), 1);
    }

    #[test]
    fn test_add_subscription_validation() {
        let mut reg = registry();
        let session = reg.register(sink(), 0);

        let err = reg
            .add_subscription(session, vec![], None, None)
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidArgument { .. }));

        let err = reg
            .add_subscription(session, vec![InstrumentId::new("US10Y")], None, Some(-1.0))
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidArgument { .. }));

        let err = reg
            .add_subscription(99, vec![InstrumentId::new("US10Y")], None, None)
            .unwrap_err();
        assert!(matches!(err, FeedError::SessionNotFound { .. }));

        reg.add_subscription(session, vec![InstrumentId::new("US10Y")], None, None)
            .unwrap();
        assert_eq!(reg.subscription_count(), 1);
    }

    #[test]
    fn test_remove_subscription() {
        let mut reg = registry();
        let session = reg.register(sink(), 0);
        let sub = reg
            .add_subscription(session, vec![InstrumentId::new("US10Y")], None, None)
            .unwrap();

        reg.remove_subscription(session, sub).unwrap();
        let err = reg.remove_subscription(session, sub).unwrap_err();
        assert!(matches!(err, FeedError::SubscriptionNotFound { .. }));
    }

    #[test]
    fn test_interested_sessions() {
        let mut reg = registry();
        let s1 = reg.register(sink(), 0);
        let s2 = reg.register(sink(), 0);
        let s3 = reg.register(sink(), 0);

        reg.add_subscription(s1, vec![InstrumentId::new("US10Y")], None, None)
            .unwrap();
        reg.add_subscription(
            s2,
            vec![InstrumentId::new("ZN-U25"), InstrumentId::new("US10Y")],
            None,
            None,
        )
        .unwrap();
        reg.add_subscription(s3, vec![InstrumentId::new("ZN-U25")], None, None)
            .unwrap();

        let interested = reg.interested(&InstrumentId::new("US10Y"));
        assert_eq!(interested, vec![s1, s2]);
    }

    #[test]
    fn test_pacing_interval_takes_max_frequency() {
        let mut reg = registry();
        let session = reg.register(sink(), 0);
        let id = InstrumentId::new("US10Y");

        // No explicit frequency → server default 10/s → 100ms
        reg.add_subscription(session, vec![id.clone()], None, None)
            .unwrap();
        assert_eq!(reg.pacing_interval_ms(session, &id), 100.0);

        // A faster subscription wins
        reg.add_subscription(session, vec![id.clone()], None, Some(20.0))
            .unwrap();
        assert_eq!(reg.pacing_interval_ms(session, &id), 50.0);

        // A slower one does not drag it back down
        reg.add_subscription(session, vec![id.clone()], None, Some(2.0))
            .unwrap();
        assert_eq!(reg.pacing_interval_ms(session, &id), 50.0);
    }

    #[test]
    fn test_admit_enforces_pacing() {
        let mut reg = registry();
        let session = reg.register(sink(), 0);
        let id = InstrumentId::new("US10Y");
        reg.add_subscription(session, vec![id.clone()], None, Some(10.0))
            .unwrap();

        assert!(reg.admit(session, &id, 1_000).is_granted());
        reg.record_sent(session, &id, 1_000);

        // 50ms later: token available but pacing refuses
        assert_eq!(reg.admit(session, &id, 1_050), Admission::TooSoon);

        // 100ms later: admitted
        assert!(reg.admit(session, &id, 1_100).is_granted());
    }

    #[test]
    fn test_admit_exhausts_bucket() {
        let mut reg = SubscriberRegistry::new(3.0, 1.0);
        let session = reg.register(sink(), 0);
        let id = InstrumentId::new("US10Y");
        reg.add_subscription(session, vec![id.clone()], None, Some(1000.0))
            .unwrap();

        // Pacing admits every other ms at 1000/s and the refill is
        // negligible over a few ms, so the bucket is the binding
        // constraint
        assert!(reg.admit(session, &id, 1).is_granted());
        reg.record_sent(session, &id, 1);
        assert!(reg.admit(session, &id, 3).is_granted());
        reg.record_sent(session, &id, 3);
        assert!(reg.admit(session, &id, 5).is_granted());
        reg.record_sent(session, &id, 5);
        assert_eq!(reg.admit(session, &id, 7), Admission::NoToken);
    }

    #[test]
    fn test_admit_unknown_session() {
        let mut reg = registry();
        assert_eq!(
            reg.admit(42, &InstrumentId::new("US10Y"), 0),
            Admission::UnknownSession
        );
    }

    #[test]
    fn test_reconfigure_buckets_applies_to_sessions() {
        let mut reg = SubscriberRegistry::new(1.0, 1.0);
        let session = reg.register(sink(), 0);
        let id = InstrumentId::new("US10Y");
        reg.add_subscription(session, vec![id.clone()], None, Some(1000.0))
            .unwrap();

        assert!(reg.admit(session, &id, 0).is_granted());
        assert_eq!(reg.admit(session, &id, 1), Admission::NoToken);

        // Raising capacity credits the increase immediately
        reg.reconfigure_buckets(5.0, 1.0);
        assert!(reg.admit(session, &id, 2).is_granted());
    }
}
