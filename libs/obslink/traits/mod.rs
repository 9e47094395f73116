//! # obslink Traits
//!
//! Core traits and types for the obslink control-plane client.
//!
//! - **ConnectionHooks**: Lifecycle callbacks (ready / connection failed)
//! - **ReconnectionStrategy**: Control reconnection behavior
//! - **ObsLinkError**: Crate-wide error taxonomy

pub mod error;
pub mod hooks;
pub mod reconnect;

// Re-export commonly used types
pub use error::{ObsLinkError, Result};
pub use hooks::{ConnectionHooks, FnHooks, NoopHooks};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
