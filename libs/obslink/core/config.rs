use crate::core::frame::event_subscription;
use crate::traits::{ConnectionHooks, ExponentialBackoff, NoopHooks, ReconnectionStrategy};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for [`ObsClient`](crate::core::client::ObsClient)
///
/// All values are static configuration with enumerated effects; nothing is
/// negotiated at runtime. Built via the type-state builder, which supplies
/// the defaults documented on each field.
pub struct ClientConfig {
    /// WebSocket URL of the remote control service (ws:// or wss://)
    pub(crate) url: String,

    /// Protocol version carried in the Identify frame (default 1)
    pub(crate) rpc_version: u32,

    /// Event-subscription bitmask carried in the Identify frame
    /// (default [`event_subscription::DEFAULT`])
    pub(crate) event_subscriptions: u32,

    /// Bound on transport connect plus handshake (default 10s)
    pub(crate) connect_timeout: Duration,

    /// Default deadline for a synchronous request (default 5s)
    pub(crate) request_timeout: Duration,

    /// Events observed in an epoch before the connection counts as Ready
    /// (default 2; a heuristic, see the readiness module)
    pub(crate) ready_event_threshold: u64,

    /// Backoff policy between reconnection attempts
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Lifecycle hooks (ready / connection failed)
    pub(crate) hooks: Arc<dyn ConnectionHooks>,

    /// Shutdown flag - true means keep running; storing false stops the
    /// supervisor and prevents reconnection. Shareable for external
    /// shutdown coordination.
    pub(crate) shutdown_flag: Arc<AtomicBool>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rpc_version: 1,
            event_subscriptions: event_subscription::DEFAULT,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            ready_event_threshold: 2,
            reconnect_strategy: Box::new(ExponentialBackoff::default()),
            hooks: Arc::new(NoopHooks),
            shutdown_flag: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rpc_version(&self) -> u32 {
        self.rpc_version
    }

    pub fn event_subscriptions(&self) -> u32 {
        self.event_subscriptions
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn ready_event_threshold(&self) -> u64 {
        self.ready_event_threshold
    }
}
