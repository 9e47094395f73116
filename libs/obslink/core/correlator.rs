//! Response correlation
//!
//! Requests and responses share one socket with unsolicited events, so a
//! response is matched to its caller by request id, never by arrival order.
//! Callers block on a condition variable keyed through the pending map; no
//! fixed-interval polling. The mutex guards map mutation only — it is
//! released by the condvar while a caller sleeps.

use crate::core::frame::RequestResponsePayload;
use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Terminal outcome of a request
///
/// Remote rejection is an expected, frequent result (acting on a source
/// that does not exist, for instance), so failure is data here, never an
/// `Err`. `Timeout` is distinct from `Failure`: "rejected" versus "unknown
/// outcome".
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Request accepted, response carried data
    Success(Value),
    /// Request accepted, no response data
    SuccessNoData,
    /// Request rejected (or failed locally before the wire)
    Failure { comment: Option<String> },
    /// No matching response arrived within the deadline
    Timeout,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_) | RequestOutcome::SuccessNoData)
    }

    /// Response data, if the request succeeded with data
    pub fn data(&self) -> Option<&Value> {
        match self {
            RequestOutcome::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            RequestOutcome::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Diagnostic reason for a non-success outcome
    pub fn comment(&self) -> Option<&str> {
        match self {
            RequestOutcome::Failure { comment } => comment.as_deref(),
            _ => None,
        }
    }

    pub fn failure(comment: impl Into<String>) -> Self {
        RequestOutcome::Failure {
            comment: Some(comment.into()),
        }
    }

    /// Map a wire response to an outcome
    pub fn from_response(payload: RequestResponsePayload) -> Self {
        if !payload.request_status.result {
            return RequestOutcome::Failure {
                comment: payload.request_status.comment,
            };
        }
        match payload.response_data {
            Some(data) => RequestOutcome::Success(data),
            None => RequestOutcome::SuccessNoData,
        }
    }
}

/// Pending-request map shared between the listening loop and request callers
///
/// An entry exists from `register` until the waiter claims it or gives up;
/// a response arriving for an id with no entry is dropped, which bounds
/// memory when a caller has already timed out.
pub struct ResponseCorrelator {
    pending: Mutex<HashMap<String, Option<RequestOutcome>>>,
    resolved: Condvar,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            resolved: Condvar::new(),
        }
    }

    /// Register a request id before the frame is sent
    pub fn register(&self, request_id: &str) {
        self.pending.lock().insert(request_id.to_string(), None);
    }

    /// Drop a registration that never made it onto the wire
    pub fn unregister(&self, request_id: &str) {
        self.pending.lock().remove(request_id);
    }

    /// Resolve a pending request with its outcome
    ///
    /// Unknown ids are dropped: the waiter already timed out and evicted
    /// its entry.
    pub fn resolve(&self, request_id: &str, outcome: RequestOutcome) {
        let mut pending = self.pending.lock();
        match pending.get_mut(request_id) {
            Some(slot) => {
                *slot = Some(outcome);
                self.resolved.notify_all();
            }
            None => {
                debug!(request_id, "dropping response for unknown or expired request");
            }
        }
    }

    /// Block until the request resolves or the timeout elapses
    ///
    /// The entry is removed either way; a late response after a timeout is
    /// discarded by `resolve`.
    pub fn wait_for(&self, request_id: &str, timeout: Duration) -> RequestOutcome {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();

        loop {
            match pending.get(request_id) {
                Some(Some(_)) => {
                    // Claimed: remove and hand the outcome to the caller.
                    return pending
                        .remove(request_id)
                        .flatten()
                        .unwrap_or(RequestOutcome::Timeout);
                }
                Some(None) => {
                    if Instant::now() >= deadline {
                        pending.remove(request_id);
                        return RequestOutcome::Timeout;
                    }
                    self.resolved.wait_until(&mut pending, deadline);
                }
                None => {
                    // Never registered, or already claimed elsewhere.
                    return RequestOutcome::Timeout;
                }
            }
        }
    }

    /// Resolve every unresolved entry as a failure and wake all waiters
    ///
    /// Called on transport loss and on disconnect so no caller blocks for a
    /// response that can no longer arrive.
    pub fn fail_all(&self, comment: &str) {
        let mut pending = self.pending.lock();
        for slot in pending.values_mut() {
            if slot.is_none() {
                *slot = Some(RequestOutcome::failure(comment));
            }
        }
        self.resolved.notify_all();
    }

    /// Number of registered requests (resolved or not)
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for ResponseCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
