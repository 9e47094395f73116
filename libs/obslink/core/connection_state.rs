//! Lock-free connection state and counters
//!
//! The lifecycle state and the traffic counters are the only pieces of
//! state shared across the supervisor task, request callers and the async
//! worker, so they live in atomics rather than behind a lock.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of the connection
///
/// `Ready` is reached only from `Connected` once the readiness heuristic is
/// met. `Reconnecting` is entered from any connected state on transport
/// loss. `Failed` is terminal once reconnection attempts are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    /// Transport is open, identification handshake in flight
    Identifying = 2,
    /// Identified but not yet observed to be live
    Connected = 3,
    /// Identified and emitting events; safe to issue requests
    Ready = 4,
    Reconnecting = 5,
    /// Reconnection attempts exhausted
    Failed = 6,
    ShuttingDown = 7,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Identifying,
            3 => ConnectionState::Connected,
            4 => ConnectionState::Ready,
            5 => ConnectionState::Reconnecting,
            6 => ConnectionState::Failed,
            _ => ConnectionState::ShuttingDown,
        }
    }
}

/// Atomic wrapper around [`ConnectionState`]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Transition only if the current state matches `current`
    ///
    /// Returns the observed state on failure, so exactly one racing caller
    /// wins a given transition.
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> std::result::Result<ConnectionState, ConnectionState> {
        self.inner
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ConnectionState::Disconnected
    }

    /// True while a connection attempt is in progress (including handshake
    /// and reconnection)
    #[inline]
    pub fn is_connecting(&self) -> bool {
        matches!(
            self.get(),
            ConnectionState::Connecting | ConnectionState::Identifying | ConnectionState::Reconnecting
        )
    }

    /// True once identified, whether or not the readiness heuristic has met
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self.get(), ConnectionState::Connected | ConnectionState::Ready)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Ready
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.get() == ConnectionState::Failed
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.get() == ConnectionState::ShuttingDown
    }
}

/// Atomic traffic counters
///
/// `events_seen` counts op-5 frames for the lifetime of the client, not per
/// epoch; the per-epoch counter used by the readiness heuristic lives in
/// the detector.
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    events_seen: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            events_seen: AtomicU64::new(0),
            reconnect_count: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_events(&self) {
        self.events_seen.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn events_seen(&self) -> u64 {
        self.events_seen.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }
}

impl Default for AtomicMetrics {
    fn default() -> Self {
        Self::new()
    }
}
