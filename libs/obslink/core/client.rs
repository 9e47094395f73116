//! Connection supervisor
//!
//! Owns the connection's lifecycle: transport open, identification
//! handshake, the listening loop (sole reader of the socket), and capped
//! exponential-backoff reconnection. Collaborators never touch the socket;
//! they go through [`ObsClient`]'s request API and lifecycle hooks.

use crate::core::config::ClientConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::correlator::{RequestOutcome, ResponseCorrelator};
use crate::core::dispatcher::{spawn_request_worker, QueuedRequest, RequestDispatcher};
use crate::core::frame::{EventPayload, Frame, OpCode, RequestResponsePayload};
use crate::core::handshake::{self, WsStream};
use crate::core::readiness::ReadinessDetector;
use crate::traits::{ConnectionHooks, ObsLinkError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Internal command messages for the supervisor
#[derive(Debug)]
pub(crate) enum Command {
    /// Send an encoded text frame to the transport
    Send(String),
    /// Close the transport and stop
    Shutdown,
}

/// Snapshot of client counters and state
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub events_seen: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// Control-plane client for a remote production tool
///
/// One `ObsClient` owns one logical connection. Construct it with
/// [`crate::builder()`], register hooks through the builder, call
/// [`start`](Self::start) from within a tokio runtime, and issue requests
/// from plain caller threads (or through the async queue) once the
/// connection reports Ready.
pub struct ObsClient {
    config: Arc<ClientConfig>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    correlator: Arc<ResponseCorrelator>,
    readiness: Arc<ReadinessDetector>,
    dispatcher: Arc<RequestDispatcher>,
    command_tx: Sender<Command>,
    command_rx: Receiver<Command>,
    queue_tx: Sender<QueuedRequest>,
    worker_handle: Option<std::thread::JoinHandle<()>>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    started: AtomicBool,
    shutdown_flag: Arc<AtomicBool>,
}

impl ObsClient {
    /// Create a client from configuration
    ///
    /// Called by the builder's `build()`. Spawns the async-request worker
    /// thread; the connection itself is not opened until [`start`](Self::start).
    pub(crate) fn from_config(config: ClientConfig) -> Result<Self> {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let correlator = Arc::new(ResponseCorrelator::new());
        let shutdown_flag = Arc::clone(&config.shutdown_flag);

        let readiness = Arc::new(ReadinessDetector::new(
            config.ready_event_threshold,
            Arc::clone(&state),
            Arc::clone(&config.hooks),
        ));

        let (command_tx, command_rx) = unbounded();
        let (queue_tx, queue_rx) = unbounded();

        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&state),
            Arc::clone(&correlator),
            Arc::clone(&metrics),
            command_tx.clone(),
        ));

        let worker_handle =
            spawn_request_worker(Arc::clone(&dispatcher), queue_rx, Arc::clone(&shutdown_flag))
                .map_err(|e| ObsLinkError::Configuration(format!("failed to spawn request worker: {}", e)))?;

        Ok(Self {
            config,
            state,
            metrics,
            correlator,
            readiness,
            dispatcher,
            command_tx,
            command_rx,
            queue_tx,
            worker_handle: Some(worker_handle),
            task_handle: Mutex::new(None),
            started: AtomicBool::new(false),
            shutdown_flag,
        })
    }

    /// Start the supervisor task: connect, identify, listen, reconnect
    ///
    /// Non-blocking; must be called from within a tokio runtime. Calling it
    /// twice is a no-op — at most one supervisor per client.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("start() called twice, supervisor already running");
            return;
        }

        let ctx = SupervisorCtx {
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
            correlator: Arc::clone(&self.correlator),
            readiness: Arc::clone(&self.readiness),
            command_rx: self.command_rx.clone(),
            shutdown_flag: Arc::clone(&self.shutdown_flag),
        };

        let handle = tokio::spawn(async move {
            run_supervisor(ctx).await;
        });
        *self.task_handle.lock() = Some(handle);
    }

    /// Current lifecycle state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// True once identified (Ready or not)
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// True once the readiness heuristic has been met this epoch
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Counter snapshot
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            events_seen: self.metrics.events_seen(),
            reconnect_count: self.metrics.reconnect_count(),
            connection_state: self.state.get(),
        }
    }

    /// Number of requests awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Shared shutdown flag (true = keep running)
    ///
    /// Hand a clone to external shutdown coordination; storing `false`
    /// stops the supervisor and prevents reconnection.
    pub fn shutdown_flag(&self) -> &Arc<AtomicBool> {
        &self.shutdown_flag
    }

    /// Send a request and block for its outcome, using the configured
    /// default timeout
    ///
    /// See [`send_request_with_timeout`](Self::send_request_with_timeout)
    /// for the guards and outcome semantics.
    pub fn send_request(&self, request_type: &str, data: Option<Value>) -> RequestOutcome {
        self.send_request_with_timeout(request_type, data, self.config.request_timeout)
    }

    /// Send a request with an explicit deadline
    ///
    /// Must not be called from inside a tokio runtime (it blocks), and the
    /// connection must be Ready; either guard failing yields a non-success
    /// outcome without touching the transport. Remote rejection comes back
    /// as [`RequestOutcome::Failure`], an absent response as
    /// [`RequestOutcome::Timeout`] — failures are data, not panics.
    pub fn send_request_with_timeout(
        &self,
        request_type: &str,
        data: Option<Value>,
        timeout: Duration,
    ) -> RequestOutcome {
        self.dispatcher.dispatch(request_type, data, timeout)
    }

    /// Queue a request for the dedicated worker thread
    ///
    /// The callback receives the outcome once the round trip completes.
    /// Queued requests are serialized in FIFO order, so slow remote calls
    /// never block the caller.
    pub fn send_request_async(
        &self,
        request_type: &str,
        data: Option<Value>,
        callback: impl FnOnce(RequestOutcome) + Send + 'static,
    ) {
        // The worker stops once the shutdown flag clears; anything queued
        // after that would never be picked up.
        if !self.shutdown_flag.load(Ordering::Acquire) {
            callback(RequestOutcome::failure("client disconnected"));
            return;
        }
        let queued = QueuedRequest {
            request_type: request_type.to_string(),
            data,
            timeout: self.config.request_timeout,
            callback: Box::new(callback),
        };
        if self.queue_tx.send(queued).is_err() {
            warn!(request_type, "async request queue is closed, dropping request");
        }
    }

    /// Stop the connection and fail everything pending
    ///
    /// Clears the ready flag, prevents reconnection and resolves every
    /// pending request as a failure so no caller blocks on a response that
    /// cannot arrive. Synchronous and callable from any thread; use
    /// [`shutdown`](Self::shutdown) to also await task teardown.
    pub fn disconnect(&self) {
        info!("disconnecting");
        self.shutdown_flag.store(false, Ordering::Release);
        let _ = self.command_tx.send(Command::Shutdown);
        self.correlator.fail_all("client disconnected");
        self.readiness.reset();
        if !self.state.is_failed() {
            self.state.set(ConnectionState::Disconnected);
        }
    }

    /// Disconnect and wait for the supervisor task and worker thread to end
    pub async fn shutdown(mut self) -> Result<()> {
        self.disconnect();

        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        // Dropping the queue sender closes the channel; the worker drains
        // and exits within its 100ms recv timeout.
        drop(self.queue_tx);
        if let Some(worker) = self.worker_handle.take() {
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
        }

        info!("client shut down");
        Ok(())
    }
}

/// Everything the supervisor task needs, detached from the `ObsClient` handle
struct SupervisorCtx {
    config: Arc<ClientConfig>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    correlator: Arc<ResponseCorrelator>,
    readiness: Arc<ReadinessDetector>,
    command_rx: Receiver<Command>,
    shutdown_flag: Arc<AtomicBool>,
}

/// Supervisor loop: connect → identify → listen, reconnect with backoff
async fn run_supervisor(ctx: SupervisorCtx) {
    let mut reconnect_attempt: usize = 0;

    loop {
        if !ctx.shutdown_flag.load(Ordering::Acquire) {
            debug!("shutdown flag cleared, exiting supervisor");
            break;
        }
        if ctx.state.is_shutting_down() {
            break;
        }

        ctx.state.set(if reconnect_attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });

        match open_and_identify(&ctx).await {
            Ok(ws) => {
                info!(url = %ctx.config.url(), "identified, listening");
                ctx.state.set(ConnectionState::Connected);
                ctx.readiness.reset();
                reconnect_attempt = 0;

                match listen(ws, &ctx).await {
                    Ok(()) => {
                        // Clean shutdown path
                        ctx.correlator.fail_all("client disconnected");
                        ctx.readiness.reset();
                        ctx.state.set(ConnectionState::Disconnected);
                        break;
                    }
                    Err(e) => {
                        error!("connection lost: {}", e);
                    }
                }

                // Transport gone mid-session: nothing pending can resolve.
                ctx.correlator.fail_all("connection lost");
                ctx.readiness.reset();
            }
            Err(e) => {
                error!("connection attempt failed: {}", e);
            }
        }

        if !ctx.shutdown_flag.load(Ordering::Acquire) {
            ctx.state.set(ConnectionState::Disconnected);
            break;
        }

        match ctx.config.reconnect_strategy.next_delay(reconnect_attempt) {
            Some(delay) => {
                ctx.state.set(ConnectionState::Reconnecting);
                info!(attempt = reconnect_attempt + 1, ?delay, "reconnecting after backoff");
                if !interruptible_sleep(delay, &ctx.shutdown_flag).await {
                    ctx.state.set(ConnectionState::Disconnected);
                    break;
                }
                reconnect_attempt += 1;
                ctx.metrics.increment_reconnects();
            }
            None => {
                warn!(
                    attempts = reconnect_attempt,
                    "reconnection attempts exhausted, giving up"
                );
                ctx.state.set(ConnectionState::Failed);
                let hooks = Arc::clone(&ctx.config.hooks);
                fire_connection_failed(hooks);
                break;
            }
        }
    }

    debug!("supervisor task exiting");
}

/// Open the transport and run the handshake, both under the connect timeout
async fn open_and_identify(ctx: &SupervisorCtx) -> Result<WsStream> {
    let config = &ctx.config;

    let connected = tokio::time::timeout(config.connect_timeout(), connect_async(config.url()))
        .await
        .map_err(|_| {
            ObsLinkError::Timeout(format!(
                "connect to {} timed out after {:?}",
                config.url(),
                config.connect_timeout()
            ))
        })?
        .map_err(|e| ObsLinkError::WebSocket(e.to_string()))?;

    let (mut ws, _) = connected;
    debug!(url = %config.url(), "transport open, identifying");
    ctx.state.set(ConnectionState::Identifying);

    match tokio::time::timeout(config.connect_timeout(), handshake::identify(&mut ws, config)).await
    {
        Ok(Ok(())) => Ok(ws),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ObsLinkError::Handshake(format!(
            "handshake timed out after {:?}",
            config.connect_timeout()
        ))),
    }
}

/// Listening loop: sole reader of the transport for this epoch
///
/// Multiplexes inbound frames (events to the readiness detector, responses
/// to the correlator) with outbound commands. Returns `Ok(())` only on an
/// orderly shutdown; any transport error bubbles up for the supervisor to
/// handle.
async fn listen(ws: WsStream, ctx: &SupervisorCtx) -> Result<()> {
    let (mut write, mut read) = ws.split();

    // One persistent forwarder per epoch bridges the sync command channel
    // into the select. The mpsc `recv` below is cancel-safe; a fresh
    // blocking receiver per iteration is not, because losing the select
    // race detaches it along with any command it has already taken off the
    // channel. The forwarder also owns the periodic shutdown-flag check:
    // when the flag clears it exits, the sender drops, and the `None` arm
    // ends the epoch.
    let (bridge_tx, mut bridge_rx) = tokio::sync::mpsc::unbounded_channel();
    let command_rx = ctx.command_rx.clone();
    let bridge_shutdown = Arc::clone(&ctx.shutdown_flag);
    let bridge = tokio::task::spawn_blocking(move || loop {
        if !bridge_shutdown.load(Ordering::Acquire) {
            break;
        }
        match command_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(cmd) => {
                if bridge_tx.send(cmd).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    });

    let outcome = loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        ctx.metrics.increment_received();
                        handle_frame(&text, ctx);
                    }
                    Some(Ok(Message::Close(_))) => {
                        break Err(ObsLinkError::ConnectionClosed("close frame received".into()));
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by the transport; binary
                        // frames are not part of this protocol.
                    }
                    Some(Err(e)) => {
                        break Err(ObsLinkError::WebSocket(e.to_string()));
                    }
                    None => {
                        break Err(ObsLinkError::ConnectionClosed("stream ended".into()));
                    }
                }
            }

            cmd = bridge_rx.recv() => {
                match cmd {
                    Some(Command::Send(text)) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            break Err(ObsLinkError::WebSocket(e.to_string()));
                        }
                    }
                    Some(Command::Shutdown) => {
                        info!("received shutdown command");
                        let _ = write.close().await;
                        break Ok(());
                    }
                    None => {
                        debug!("shutdown requested, closing transport");
                        let _ = write.close().await;
                        break Ok(());
                    }
                }
            }
        }
    };

    // Unblock the forwarder (its next send fails) and reap it.
    drop(bridge_rx);
    let _ = bridge.await;
    outcome
}

/// Classify one inbound frame and feed the right consumer
///
/// Undecodable frames are logged and skipped; a bad frame must never take
/// the listening loop down.
fn handle_frame(text: &str, ctx: &SupervisorCtx) {
    let frame = match Frame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("skipping undecodable frame: {}", e);
            return;
        }
    };

    match frame.op {
        OpCode::Event => {
            ctx.metrics.increment_events();
            match frame.payload::<EventPayload>() {
                Ok(event) => debug!(event_type = %event.event_type, "event"),
                Err(e) => warn!("event frame with malformed payload: {}", e),
            }
            ctx.readiness.observe_event();
        }
        OpCode::RequestResponse => match frame.payload::<RequestResponsePayload>() {
            Ok(response) => {
                let request_id = response.request_id.clone();
                ctx.correlator
                    .resolve(&request_id, RequestOutcome::from_response(response));
            }
            Err(e) => warn!("response frame with malformed payload: {}", e),
        },
        other => {
            debug!(op = ?other, "ignoring frame outside the session flow");
        }
    }
}

/// Sleep in slices, checking the shutdown flag between them
///
/// Returns false if shutdown was requested during the sleep.
async fn interruptible_sleep(total: Duration, shutdown_flag: &AtomicBool) -> bool {
    let slice = Duration::from_millis(100);
    let mut elapsed = Duration::ZERO;

    while elapsed < total {
        if !shutdown_flag.load(Ordering::Acquire) {
            return false;
        }
        let step = slice.min(total - elapsed);
        tokio::time::sleep(step).await;
        elapsed += step;
    }
    shutdown_flag.load(Ordering::Acquire)
}

/// Invoke the failure hook, containing panics
fn fire_connection_failed(hooks: Arc<dyn ConnectionHooks>) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(move || hooks.on_connection_failed())) {
        error!(?panic, "connection-failed hook panicked");
    }
}
