//! # obslink
//!
//! A control-plane protocol client for a remote audio/video production
//! tool's WebSocket control service.
//!
//! ## Features
//!
//! - **Identification handshake**: Hello → Identify → Identified before any
//!   other traffic
//! - **One socket, two traffic classes**: unsolicited events and
//!   id-correlated request/response pairs, multiplexed by a single listener
//! - **Heuristic readiness**: the connection counts as Ready once live
//!   event traffic is observed, with a one-shot ready hook
//! - **Supervised lifecycle**: capped exponential-backoff reconnection with
//!   a bounded attempt count and a one-shot failure hook
//! - **Blocking and queued request APIs**: condvar-backed wait-with-timeout
//!   plus a FIFO worker that keeps slow round trips off caller threads

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    builder,
    client::{Metrics, ObsClient},
    config::ClientConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    correlator::{RequestOutcome, ResponseCorrelator},
    frame::{event_subscription, Frame, OpCode},
    ObsClientBuilder,
};

/// Type alias for Result with ObsLinkError
pub type Result<T> = std::result::Result<T, traits::ObsLinkError>;
