//! Integration tests for reconnection behavior
//!
//! Backoff strategy arithmetic, recovery after a mid-session drop, and the
//! bounded-attempt path into terminal failure.

mod common;

use common::{wait_until, MockObsServer, SessionScript};
use obslink::core::connection_state::ConnectionState;
use obslink::{
    builder, ExponentialBackoff, FixedDelay, FnHooks, NeverReconnect, ReconnectionStrategy,
    RequestOutcome,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Macro for verbose test output
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[test]
fn test_default_backoff_is_doubling_capped_and_bounded() {
    let strategy = ExponentialBackoff::default();

    // min(30s, 2^attempt) with five attempts
    let expected_secs = [1, 2, 4, 8, 16];
    for (attempt, &secs) in expected_secs.iter().enumerate() {
        let delay = strategy.next_delay(attempt).unwrap();
        verbose_println!("attempt {}: {:?}", attempt, delay);
        assert_eq!(delay, Duration::from_secs(secs));
    }
    assert!(strategy.next_delay(5).is_none(), "five attempts, then stop");
}

#[test]
fn test_backoff_cap_applies() {
    let strategy = ExponentialBackoff::new(
        Duration::from_secs(1),
        Duration::from_secs(30),
        None,
    );

    assert_eq!(strategy.next_delay(4).unwrap(), Duration::from_secs(16));
    assert_eq!(strategy.next_delay(5).unwrap(), Duration::from_secs(30), "capped");
    assert_eq!(strategy.next_delay(6).unwrap(), Duration::from_secs(30));
    assert_eq!(strategy.next_delay(20).unwrap(), Duration::from_secs(30));
}

#[test]
fn test_backoff_overflow_safety() {
    let strategy = ExponentialBackoff::new(
        Duration::from_millis(100),
        Duration::from_secs(3600),
        None,
    );

    // 100ms * 2^100 would overflow; the cap must hold instead of panicking.
    assert!(strategy.next_delay(100).unwrap() <= Duration::from_secs(3600));
    assert!(strategy.next_delay(1000).unwrap() <= Duration::from_secs(3600));
}

#[test]
fn test_fixed_delay_and_attempt_limit() {
    let strategy = FixedDelay::new(Duration::from_millis(50), Some(3));

    assert_eq!(strategy.next_delay(0).unwrap(), Duration::from_millis(50));
    assert_eq!(strategy.next_delay(2).unwrap(), Duration::from_millis(50));
    assert!(strategy.next_delay(3).is_none());
    assert!(!strategy.should_reconnect(3));
}

#[test]
fn test_never_reconnect_always_stops() {
    let strategy = NeverReconnect;
    for attempt in 0..10 {
        assert!(strategy.next_delay(attempt).is_none());
        assert!(!strategy.should_reconnect(attempt));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mid_session_drop_fails_pending_and_recovers() {
    let server = MockObsServer::start(SessionScript::DropOnRequest { events: 2 }).await;

    let client = builder()
        .url(server.ws_url())
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(50), Some(5)))
        .build()
        .unwrap();
    client.start();
    assert!(wait_until(|| client.is_ready(), Duration::from_secs(5)).await);
    let first_epoch_connections = server.connections();

    // The server hangs up on this request instead of answering it.
    let outcome = thread::scope(|s| {
        s.spawn(|| {
            client.send_request_with_timeout("GetVersion", None, Duration::from_secs(10))
        })
        .join()
        .unwrap()
    });

    assert!(
        matches!(outcome, RequestOutcome::Failure { .. } | RequestOutcome::Timeout),
        "pending request must resolve when the transport dies, got {:?}",
        outcome
    );

    // A fresh epoch: reconnect, re-handshake, and become ready again.
    assert!(
        wait_until(|| client.is_ready(), Duration::from_secs(5)).await,
        "client should recover after the drop"
    );
    assert!(server.connections() > first_epoch_connections);
    assert!(client.metrics().reconnect_count >= 1);

    client.disconnect();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exhausted_attempts_end_in_failed_with_one_hook_firing() {
    // Bind a port, then drop the listener so every connect is refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let failed_count = Arc::new(AtomicUsize::new(0));
    let failed_hook = Arc::clone(&failed_count);

    let client = builder()
        .url(format!("ws://{}", addr))
        .connect_timeout(Duration::from_millis(500))
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(20), Some(3)))
        .hooks(FnHooks::new().on_connection_failed(move || {
            failed_hook.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();
    client.start();

    assert!(
        wait_until(
            || client.connection_state() == ConnectionState::Failed,
            Duration::from_secs(10)
        )
        .await,
        "client should give up after three attempts"
    );
    assert_eq!(failed_count.load(Ordering::SeqCst), 1);

    // No late extra firing.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(failed_count.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drop_after_handshake_clears_ready_between_epochs() {
    let server = MockObsServer::start(SessionScript::DropAfterHandshake).await;

    let ready_count = Arc::new(AtomicUsize::new(0));
    let ready_hook = Arc::clone(&ready_count);

    let client = builder()
        .url(server.ws_url())
        .reconnect_strategy(FixedDelay::new(Duration::from_millis(30), Some(2)))
        .hooks(FnHooks::new().on_ready(move || {
            ready_hook.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();
    client.start();

    // Each handshake succeeds, so the attempt counter keeps resetting and
    // the client cycles epochs indefinitely. With zero events per epoch
    // the readiness heuristic must never fire.
    assert!(
        wait_until(|| server.connections() >= 3, Duration::from_secs(10)).await,
        "client should keep re-establishing epochs"
    );
    assert!(!client.is_ready());
    assert_eq!(ready_count.load(Ordering::SeqCst), 0);

    client.disconnect();
}
