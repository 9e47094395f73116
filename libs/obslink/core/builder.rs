//! Type-state builder for [`ObsClient`]
//!
//! The URL is the one field a client cannot exist without, so it is
//! enforced at compile time: `build()` only exists once `url()` has been
//! called. Everything else has documented defaults.

use crate::core::client::ObsClient;
use crate::core::config::ClientConfig;
use crate::traits::{ConnectionHooks, ReconnectionStrategy, Result};
use states::*;
use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Type-state markers for the builder pattern
pub mod states {
    /// Marker trait for URL state
    pub trait UrlState {}

    /// URL has not been set
    pub struct NoUrl;
    impl UrlState for NoUrl {}

    /// URL has been set
    pub struct HasUrl;
    impl UrlState for HasUrl {}
}

/// Builder for [`ObsClient`]
///
/// ```ignore
/// let client = obslink::builder()
///     .url("ws://localhost:4455")
///     .ready_event_threshold(2)
///     .reconnect_strategy(ExponentialBackoff::default())
///     .hooks(MyHooks)
///     .build()?;
/// ```
pub struct ObsClientBuilder<U: UrlState> {
    _url_state: PhantomData<U>,
    url: Option<String>,
    config: ClientConfig,
}

impl ObsClientBuilder<NoUrl> {
    pub fn new() -> Self {
        Self {
            _url_state: PhantomData,
            url: None,
            config: ClientConfig::new(""),
        }
    }

    /// Set the WebSocket URL of the remote control service
    pub fn url(self, url: impl Into<String>) -> ObsClientBuilder<HasUrl> {
        ObsClientBuilder {
            _url_state: PhantomData,
            url: Some(url.into()),
            config: self.config,
        }
    }
}

impl Default for ObsClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: UrlState> ObsClientBuilder<U> {
    /// Protocol version for the Identify frame (default 1)
    pub fn rpc_version(mut self, version: u32) -> Self {
        self.config.rpc_version = version;
        self
    }

    /// Event-subscription bitmask for the Identify frame
    ///
    /// Combine constants from [`crate::core::frame::event_subscription`].
    pub fn event_subscriptions(mut self, mask: u32) -> Self {
        self.config.event_subscriptions = mask;
        self
    }

    /// Bound on transport connect plus handshake (default 10s)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Default deadline for synchronous requests (default 5s)
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Events observed before the connection counts as Ready (default 2)
    pub fn ready_event_threshold(mut self, threshold: u64) -> Self {
        self.config.ready_event_threshold = threshold;
        self
    }

    /// Backoff policy between reconnection attempts
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.config.reconnect_strategy = Box::new(strategy);
        self
    }

    /// Lifecycle hooks (ready / connection failed)
    pub fn hooks(mut self, hooks: impl ConnectionHooks) -> Self {
        self.config.hooks = Arc::new(hooks);
        self
    }

    /// Share an externally owned shutdown flag (true = keep running)
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.shutdown_flag = flag;
        self
    }
}

impl ObsClientBuilder<HasUrl> {
    /// Build the client
    ///
    /// Spawns the async-request worker; the connection is not opened until
    /// [`ObsClient::start`].
    pub fn build(mut self) -> Result<ObsClient> {
        self.config.url = self
            .url
            .ok_or_else(|| crate::traits::ObsLinkError::Configuration("url missing".into()))?;
        ObsClient::from_config(self.config)
    }
}
