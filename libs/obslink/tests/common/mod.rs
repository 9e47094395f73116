//! Common test utilities for obslink integration tests
//!
//! Provides a scriptable mock control-service WebSocket server speaking the
//! tagged-envelope protocol (Hello/Identify/Identified, events, request
//! responses).

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// How the mock server answers request frames
#[derive(Debug, Clone)]
pub enum ReplyMode {
    /// `result: true`, with optional responseData
    Success(Option<Value>),
    /// `result: false` with a comment
    Failure(String),
    /// Never answer; the caller should time out
    Ignore,
}

/// Scripted per-connection behavior
#[derive(Debug, Clone)]
pub enum SessionScript {
    /// Complete the handshake, emit `events` event frames, then answer
    /// requests according to `reply`
    Normal { events: usize, reply: ReplyMode },
    /// Complete the handshake, then close the connection
    DropAfterHandshake,
    /// Complete the handshake, emit `events` event frames, then close the
    /// connection on the first request without answering it
    DropOnRequest { events: usize },
    /// Complete the handshake, then stream events at `interval` forever
    /// while answering every request with a bare success
    EventFlood { interval: Duration },
    /// Send a frame with an unknown op instead of Hello
    BadHello,
}

/// A scriptable mock control-service server
pub struct MockObsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    connections: Arc<AtomicUsize>,
    requests_seen: Arc<AtomicUsize>,
}

/// Install the test logging subscriber, once per process
///
/// `RUST_LOG=obslink=debug cargo test` makes the client-side tracing
/// visible alongside test output.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl MockObsServer {
    /// Create and start a mock server; every accepted connection runs `script`
    pub async fn start(script: SessionScript) -> Self {
        init_test_logging();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));
        let requests_seen = Arc::new(AtomicUsize::new(0));

        let shutdown_accept = shutdown.clone();
        let connections_accept = connections.clone();
        let requests_accept = requests_seen.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let script = script.clone();
                                let connections = connections_accept.clone();
                                let requests = requests_accept.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, script, connections, requests).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_accept.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            connections,
            requests_seen,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        script: SessionScript,
        connections: Arc<AtomicUsize>,
        requests_seen: Arc<AtomicUsize>,
    ) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        connections.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        if matches!(script, SessionScript::BadHello) {
            let _ = write
                .send(Message::Text(json!({"op": 99, "d": {}}).to_string()))
                .await;
            // Give the client a moment to read it before the socket drops.
            tokio::time::sleep(Duration::from_millis(100)).await;
            return;
        }

        // Hello
        if write
            .send(Message::Text(
                json!({"op": 0, "d": {"rpcVersion": 1}}).to_string(),
            ))
            .await
            .is_err()
        {
            return;
        }

        // Await Identify
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    if frame["op"] == 1 {
                        assert_eq!(frame["d"]["rpcVersion"], 1, "identify must carry rpcVersion");
                        break;
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return,
            }
        }

        // Identified
        if write
            .send(Message::Text(
                json!({"op": 2, "d": {"negotiatedRpcVersion": 1}}).to_string(),
            ))
            .await
            .is_err()
        {
            return;
        }

        if let SessionScript::EventFlood { interval } = &script {
            let mut ticker = tokio::time::interval(*interval);
            let mut i = 0usize;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let event = json!({
                            "op": 5,
                            "d": {"eventType": format!("MockEvent{}", i), "eventData": {}}
                        });
                        i += 1;
                        if write.send(Message::Text(event.to_string())).await.is_err() {
                            return;
                        }
                    }
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let frame: Value = match serde_json::from_str(&text) {
                                    Ok(v) => v,
                                    Err(_) => continue,
                                };
                                if frame["op"] != 6 {
                                    continue;
                                }
                                requests_seen.fetch_add(1, Ordering::SeqCst);
                                let request_id =
                                    frame["d"]["requestId"].as_str().unwrap_or("").to_string();
                                let response = json!({
                                    "op": 7,
                                    "d": {
                                        "requestId": request_id,
                                        "requestStatus": {"result": true}
                                    }
                                });
                                if write.send(Message::Text(response.to_string())).await.is_err() {
                                    return;
                                }
                            }
                            Some(Ok(Message::Close(_))) => return,
                            Some(Ok(_)) => continue,
                            Some(Err(_)) | None => return,
                        }
                    }
                }
            }
        }

        let (events, reply, drop_on_request) = match &script {
            SessionScript::Normal { events, reply } => (*events, Some(reply.clone()), false),
            SessionScript::DropAfterHandshake => return,
            SessionScript::DropOnRequest { events } => (*events, None, true),
            SessionScript::EventFlood { .. } | SessionScript::BadHello => unreachable!(),
        };

        for i in 0..events {
            let event = json!({
                "op": 5,
                "d": {"eventType": format!("MockEvent{}", i), "eventData": {}}
            });
            if write.send(Message::Text(event.to_string())).await.is_err() {
                return;
            }
        }

        // Request loop
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    if frame["op"] != 6 {
                        continue;
                    }
                    requests_seen.fetch_add(1, Ordering::SeqCst);

                    if drop_on_request {
                        return;
                    }

                    let request_id = frame["d"]["requestId"].as_str().unwrap_or("").to_string();
                    let response = match reply.as_ref() {
                        Some(ReplyMode::Success(data)) => {
                            let mut d = json!({
                                "requestId": request_id,
                                "requestStatus": {"result": true}
                            });
                            if let Some(data) = data {
                                d["responseData"] = data.clone();
                            }
                            Some(json!({"op": 7, "d": d}))
                        }
                        Some(ReplyMode::Failure(comment)) => Some(json!({
                            "op": 7,
                            "d": {
                                "requestId": request_id,
                                "requestStatus": {"result": false, "comment": comment}
                            }
                        })),
                        Some(ReplyMode::Ignore) | None => None,
                    };

                    if let Some(response) = response {
                        if write.send(Message::Text(response.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return,
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Request frames observed so far
    pub fn requests_seen(&self) -> usize {
        self.requests_seen.load(Ordering::SeqCst)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockObsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll a condition until it holds or the timeout elapses
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
