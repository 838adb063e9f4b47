//! Sub-stream id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates process-monotonic sub-stream ids.
///
/// The side that will consume a stateful interaction (terminal UI, exec
/// session, log viewer) allocates a fresh id, passes it to the peer as a
/// scalar in the outer call, and the peer dials back on that id. Keeping
/// allocation on the consuming side means each side's stream-routing table
/// only ever holds ids it allocated itself.
#[derive(Debug, Default)]
pub struct Broker {
    next: AtomicU64,
}

impl Broker {
    /// Creates a broker starting at stream id 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh stream id, never reused within this process.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
