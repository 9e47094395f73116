//! Core client functionality: wire codec, handshake, correlation,
//! readiness detection, the connection supervisor and the request façade.
//!
//! ## Example
//!
//! ```rust,ignore
//! use obslink::{builder, FnHooks};
//!
//! #[tokio::main]
//! async fn main() -> obslink::Result<()> {
//!     let client = builder()
//!         .url("ws://localhost:4455")
//!         .hooks(FnHooks::new().on_ready(|| println!("ready")))
//!         .build()?;
//!
//!     client.start();
//!
//!     // From a worker thread, once ready:
//!     // let outcome = client.send_request("GetVersion", None);
//!
//!     client.shutdown().await
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod correlator;
pub mod dispatcher;
pub mod frame;
pub mod handshake;
pub mod ops;
pub mod readiness;

// Re-export main types
pub use builder::{states, ObsClientBuilder};
pub use client::{Metrics, ObsClient};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use correlator::{RequestOutcome, ResponseCorrelator};
pub use frame::{event_subscription, EventPayload, Frame, Identify, OpCode, RequestPayload, RequestResponsePayload, RequestStatus};
pub use readiness::ReadinessDetector;

/// Create a new client builder
///
/// Convenience entry point for the type-state builder.
///
/// # Example
/// ```ignore
/// let client = obslink::builder()
///     .url("ws://localhost:4455")
///     .build()?;
/// ```
pub fn builder() -> ObsClientBuilder<builder::states::NoUrl> {
    ObsClientBuilder::new()
}
