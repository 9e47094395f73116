//! Event-driven readiness detection
//!
//! The remote service gives no explicit "fully operational" signal beyond a
//! successful handshake. Observing live event traffic is the practical
//! proxy: once a minimum number of events arrive in the current connection
//! epoch, the remote has evidently finished initializing and the connection
//! is promoted to Ready. The threshold is a tunable heuristic, not a
//! protocol guarantee.

use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::traits::ConnectionHooks;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Per-epoch event counter and one-shot readiness latch
pub struct ReadinessDetector {
    threshold: u64,
    events_this_epoch: AtomicU64,
    ready_fired: AtomicBool,
    state: Arc<AtomicConnectionState>,
    hooks: Arc<dyn ConnectionHooks>,
}

impl ReadinessDetector {
    pub fn new(
        threshold: u64,
        state: Arc<AtomicConnectionState>,
        hooks: Arc<dyn ConnectionHooks>,
    ) -> Self {
        Self {
            threshold: threshold.max(1),
            events_this_epoch: AtomicU64::new(0),
            ready_fired: AtomicBool::new(false),
            state,
            hooks,
        }
    }

    /// Record one inbound event frame
    ///
    /// Returns true when this observation crossed the threshold and fired
    /// the readiness transition. The latch guarantees at most one firing
    /// per epoch; the hook runs inside `catch_unwind` so a panicking
    /// callback cannot kill the listening loop.
    pub fn observe_event(&self) -> bool {
        let seen = self.events_this_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        if seen < self.threshold {
            return false;
        }

        if self
            .ready_fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // Ready is only reachable from Connected. Losing this race means
        // the epoch is already over; the latch still holds until reset.
        if self
            .state
            .compare_exchange(ConnectionState::Connected, ConnectionState::Ready)
            .is_err()
        {
            return false;
        }

        info!(events = seen, "event stream is live, connection is ready");

        let hooks = Arc::clone(&self.hooks);
        if let Err(panic) = catch_unwind(AssertUnwindSafe(move || hooks.on_ready())) {
            error!(?panic, "ready hook panicked");
        }

        true
    }

    pub fn is_ready(&self) -> bool {
        self.ready_fired.load(Ordering::Acquire)
    }

    pub fn events_this_epoch(&self) -> u64 {
        self.events_this_epoch.load(Ordering::Acquire)
    }

    /// Start a new connection epoch: clear the counter and the latch
    pub fn reset(&self) {
        self.events_this_epoch.store(0, Ordering::Release);
        self.ready_fired.store(false, Ordering::Release);
    }
}
