//! Transport adapter contract
//!
//! The dispatcher addresses sessions through this boundary; the
//! gateway implements it over a bounded per-session channel. Sends
//! never block: a full queue is reported as `SinkError::Full` and the
//! dispatcher treats it as a pacing-equivalent drop; the next delta
//! for that session is attempted fresh.

use crate::events::ServerMessage;

/// Why a non-blocking send did not deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The session's outbound queue is full; drop this message.
    Full,
    /// The session is gone; the registry entry should be removed.
    Closed,
}

/// Non-blocking outbound message channel for one session.
pub trait UpdateSink: Send + Sync {
    /// Attempt to enqueue a message without blocking.
    fn try_send(&self, message: ServerMessage) -> Result<(), SinkError>;
}

/// Test support: an in-memory sink that records what was sent.
/// Compiled unconditionally so integration suites and downstream
/// crates can drive the dispatcher without a transport.
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Recording sink for tests: stores everything, optionally
    /// rejecting after a capacity limit to exercise drop handling.
    pub struct RecordingSink {
        pub sent: Mutex<Vec<ServerMessage>>,
        capacity: usize,
        rejected: AtomicUsize,
    }

    impl RecordingSink {
        pub fn unbounded() -> Self {
            Self::with_capacity(usize::MAX)
        }

        pub fn with_capacity(capacity: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                capacity,
                rejected: AtomicUsize::new(0),
            }
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn rejected_count(&self) -> usize {
            self.rejected.load(Ordering::Relaxed)
        }
    }

    impl UpdateSink for RecordingSink {
        fn try_send(&self, message: ServerMessage) -> Result<(), SinkError> {
            let mut sent = self.sent.lock().unwrap();
            if sent.len() >= self.capacity {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(SinkError::Full);
            }
            sent.push(message);
            Ok(())
        }
    }
}
