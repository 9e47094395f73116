//! Request dispatch
//!
//! The shared send-then-wait core behind both the synchronous API and the
//! queue-backed asynchronous API. Outbound frames travel to the listening
//! loop's writer half through the supervisor command channel; outcomes come
//! back through the correlator.

use crate::core::client::Command;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics};
use crate::core::correlator::{RequestOutcome, ResponseCorrelator};
use crate::core::frame::{Frame, RequestPayload};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, warn};

/// Process-wide sequence for request-id uniqueness
///
/// The id keeps the human-readable `req_{type}_{millis}` shape but appends
/// a sequence number so near-simultaneous submissions of the same request
/// type cannot collide.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_request_id(request_type: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("req_{}_{}_{}", request_type, millis, seq)
}

/// Shared request core: guards, id allocation, send, correlated wait
pub struct RequestDispatcher {
    state: Arc<AtomicConnectionState>,
    correlator: Arc<ResponseCorrelator>,
    metrics: Arc<AtomicMetrics>,
    command_tx: Sender<Command>,
}

impl RequestDispatcher {
    pub(crate) fn new(
        state: Arc<AtomicConnectionState>,
        correlator: Arc<ResponseCorrelator>,
        metrics: Arc<AtomicMetrics>,
        command_tx: Sender<Command>,
    ) -> Self {
        Self {
            state,
            correlator,
            metrics,
            command_tx,
        }
    }

    /// Send a request and block until its outcome is known
    ///
    /// Guards, in order:
    /// - never from inside an async runtime: blocking here would stall the
    ///   worker threads the listening loop runs on, and with them the very
    ///   response this call waits for
    /// - only when Ready: a not-yet-identified remote silently drops
    ///   requests, so the frame never touches the transport
    ///
    /// Non-success outcomes are returned as data, never as panics or
    /// errors; remote rejection is routine.
    pub fn dispatch(
        &self,
        request_type: &str,
        data: Option<Value>,
        timeout: Duration,
    ) -> RequestOutcome {
        if tokio::runtime::Handle::try_current().is_ok() {
            warn!(
                request_type,
                "send_request called from an async runtime context, refusing to block"
            );
            return RequestOutcome::failure("send_request must not run on the listener's runtime");
        }

        if !self.state.is_ready() {
            debug!(request_type, state = ?self.state.get(), "rejecting request, connection not ready");
            return RequestOutcome::failure("connection not ready");
        }

        let request_id = next_request_id(request_type);
        let payload = RequestPayload {
            request_type: request_type.to_string(),
            request_id: request_id.clone(),
            request_data: data.unwrap_or_else(|| Value::Object(Default::default())),
        };

        let text = match Frame::request(&payload).and_then(|frame| frame.encode()) {
            Ok(text) => text,
            Err(e) => return RequestOutcome::failure(format!("failed to encode request: {}", e)),
        };

        // Register before sending so the response can never race the wait.
        self.correlator.register(&request_id);

        debug!(request_type, request_id = %request_id, "sending request");
        if self.command_tx.send(Command::Send(text)).is_err() {
            self.correlator.unregister(&request_id);
            return RequestOutcome::failure("connection supervisor is not running");
        }
        self.metrics.increment_sent();

        let outcome = self.correlator.wait_for(&request_id, timeout);
        if outcome == RequestOutcome::Timeout {
            warn!(request_type, request_id = %request_id, ?timeout, "request timed out");
        }
        outcome
    }
}

/// A request queued for the asynchronous worker
pub(crate) struct QueuedRequest {
    pub request_type: String,
    pub data: Option<Value>,
    pub timeout: Duration,
    pub callback: Box<dyn FnOnce(RequestOutcome) + Send>,
}

/// Drain the FIFO request queue on a dedicated OS thread
///
/// One worker serializes outbound traffic: each queued request completes
/// its round trip before the next is sent, so slow remote calls never block
/// a caller's thread and submissions cannot interleave. Callback panics are
/// contained, the worker keeps draining.
pub(crate) fn spawn_request_worker(
    dispatcher: Arc<RequestDispatcher>,
    queue_rx: Receiver<QueuedRequest>,
    shutdown_flag: Arc<AtomicBool>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("obslink-requests".to_string())
        .spawn(move || {
            debug!("request worker started");
            loop {
                if !shutdown_flag.load(Ordering::Acquire) {
                    break;
                }
                match queue_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(request) => {
                        let outcome = dispatcher.dispatch(
                            &request.request_type,
                            request.data,
                            request.timeout,
                        );
                        let callback = request.callback;
                        if let Err(panic) =
                            catch_unwind(AssertUnwindSafe(move || callback(outcome)))
                        {
                            error!(?panic, "async request callback panicked");
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            // Queued-but-unsent requests still owe their callers an answer;
            // dropping them would leave async callers waiting forever.
            while let Ok(request) = queue_rx.try_recv() {
                let callback = request.callback;
                if let Err(panic) = catch_unwind(AssertUnwindSafe(move || {
                    callback(RequestOutcome::failure("client disconnected"))
                })) {
                    error!(?panic, "async request callback panicked");
                }
            }
            debug!("request worker exiting");
        })
}
