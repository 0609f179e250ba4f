use std::sync::Arc;
use std::time::Duration;

use dwitter::SocketConfig;
use dwitter::protocol::ClientFrame;
use dwitter::socket::{
	ConnectErrorKind, ConnectionEvent, ConnectionState, DisconnectReason, FakeConnection, FakeDialer, FakeServer,
	SocketClient, TransportError,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use url::Url;

const WAIT: Duration = Duration::from_secs(2);
const DELAY: Duration = Duration::from_millis(30);

struct Harness {
	socket: SocketClient,
	dialer: FakeDialer,
	server: FakeServer,
	token: Arc<Mutex<Option<String>>>,
	events: broadcast::Receiver<ConnectionEvent>,
}

fn config() -> SocketConfig {
	SocketConfig::new(Url::parse("ws://fake.invalid/").unwrap())
		.with_reconnect_delay(DELAY)
		.with_handshake_timeout(Duration::from_secs(1))
}

fn harness_with(config: SocketConfig) -> Harness {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let (dialer, server) = FakeDialer::new();
	let token = Arc::new(Mutex::new(Some("abc".to_string())));
	let accessor = Arc::clone(&token);
	let socket = SocketClient::with_dialer(config, Arc::new(dialer.clone()), move || accessor.lock().clone());
	let events = socket.events();
	Harness {
		socket,
		dialer,
		server,
		token,
		events,
	}
}

fn harness() -> Harness {
	harness_with(config())
}

impl Harness {
	async fn next_connection(&mut self) -> FakeConnection {
		timeout(WAIT, self.server.next_connection()).await.expect("no dial").expect("dialer dropped")
	}

	/// Waits for the next dial, checks the handshake and accepts it.
	async fn accept_next(&mut self) -> FakeConnection {
		let mut conn = self.next_connection().await;
		conn.expect_handshake().await.expect("no handshake");
		conn.accept();
		self.wait_state(ConnectionState::Connected).await;
		conn
	}

	async fn wait_state(&self, want: ConnectionState) {
		let mut rx = self.socket.watch_state();
		timeout(WAIT, rx.wait_for(|state| *state == want))
			.await
			.unwrap_or_else(|_| panic!("state never became {want}"))
			.expect("state channel closed");
	}

	async fn next_event(&mut self) -> ConnectionEvent {
		timeout(WAIT, self.events.recv()).await.expect("no event").expect("event stream closed")
	}

	/// Skips events until one matches.
	async fn expect_event(&mut self, matches: impl Fn(&ConnectionEvent) -> bool) -> ConnectionEvent {
		loop {
			let event = self.next_event().await;
			if matches(&event) {
				return event;
			}
		}
	}
}

#[tokio::test]
async fn handshake_carries_token_read_at_attempt_time() {
	let mut h = harness();
	*h.token.lock() = Some("first".into());
	h.socket.connect();

	let mut conn = h.next_connection().await;
	assert_eq!(conn.expect_handshake().await.unwrap().token.as_deref(), Some("first"));
	conn.accept();
	h.wait_state(ConnectionState::Connected).await;

	*h.token.lock() = Some("refreshed".into());
	conn.drop_transport();

	let mut conn = h.next_connection().await;
	assert_eq!(conn.expect_handshake().await.unwrap().token.as_deref(), Some("refreshed"));
}

#[tokio::test]
async fn server_disconnect_reconnects_immediately() {
	let mut h = harness_with(config().with_reconnect_delay(Duration::from_secs(60)));
	h.socket.connect();
	let conn = h.accept_next().await;

	conn.server_disconnect();

	assert_eq!(
		h.expect_event(|e| matches!(e, ConnectionEvent::Disconnected { .. })).await,
		ConnectionEvent::Disconnected {
			reason: DisconnectReason::ServerDisconnect
		}
	);
	assert_eq!(h.next_event().await, ConnectionEvent::ReconnectRequested);

	// A 60s retry delay would time this out if the reconnect went through it.
	let _conn = h.accept_next().await;
	assert_eq!(h.dialer.dial_count(), 2);
	assert_eq!(h.socket.last_disconnect_reason(), Some(DisconnectReason::ServerDisconnect));
}

#[tokio::test]
async fn client_disconnect_stays_closed() {
	let mut h = harness();
	h.socket.connect();
	let mut conn = h.accept_next().await;

	h.socket.disconnect();

	assert_eq!(h.socket.state(), ConnectionState::Disconnected);
	assert_eq!(h.socket.last_disconnect_reason(), Some(DisconnectReason::ClientDisconnect));
	assert_eq!(timeout(WAIT, conn.next_frame()).await.unwrap(), Some(ClientFrame::Disconnect));

	sleep(DELAY * 4).await;
	assert_eq!(h.dialer.dial_count(), 1);
	assert_eq!(h.socket.state(), ConnectionState::Disconnected);
	assert!(h.server.try_next_connection().is_none());
}

#[tokio::test]
async fn authentication_rejection_disconnects_without_retry() {
	let mut h = harness();
	h.socket.connect();
	let mut conn = h.next_connection().await;
	conn.expect_handshake().await.unwrap();

	conn.reject("Authentication error");

	let event = h.expect_event(|e| matches!(e, ConnectionEvent::ConnectError(_))).await;
	let ConnectionEvent::ConnectError(err) = event else { unreachable!() };
	assert_eq!(err.kind, ConnectErrorKind::AuthenticationRejected);
	h.wait_state(ConnectionState::Disconnected).await;

	sleep(DELAY * 4).await;
	assert_eq!(h.dialer.dial_count(), 1);

	// Resumes only on an explicit connect.
	h.socket.connect();
	let _conn = h.accept_next().await;
	assert_eq!(h.dialer.dial_count(), 2);
}

#[tokio::test]
async fn unreachable_endpoint_disconnects_without_retry() {
	let mut h = harness();
	h.dialer.refuse_next(TransportError::Unreachable("connection refused".into()));
	h.socket.connect();

	let event = h.expect_event(|e| matches!(e, ConnectionEvent::ConnectError(_))).await;
	let ConnectionEvent::ConnectError(err) = event else { unreachable!() };
	assert_eq!(err.kind, ConnectErrorKind::Unreachable);
	h.wait_state(ConnectionState::Disconnected).await;

	sleep(DELAY * 4).await;
	assert_eq!(h.dialer.dial_count(), 1);
}

#[tokio::test]
async fn other_connect_errors_retry() {
	let mut h = harness();
	h.socket.connect();
	let mut conn = h.next_connection().await;
	conn.expect_handshake().await.unwrap();

	conn.reject("Server busy");

	let event = h.expect_event(|e| matches!(e, ConnectionEvent::RetryScheduled { .. })).await;
	assert_eq!(event, ConnectionEvent::RetryScheduled { attempt: 1, delay: DELAY });
	let _conn = h.accept_next().await;
	assert_eq!(h.dialer.dial_count(), 2);
}

#[tokio::test]
async fn transport_close_retries_after_delay() {
	let mut h = harness();
	h.socket.connect();
	let conn = h.accept_next().await;

	conn.drop_transport();

	assert_eq!(
		h.expect_event(|e| matches!(e, ConnectionEvent::Disconnected { .. })).await,
		ConnectionEvent::Disconnected {
			reason: DisconnectReason::TransportClose
		}
	);
	assert_eq!(h.next_event().await, ConnectionEvent::RetryScheduled { attempt: 1, delay: DELAY });
	let _conn = h.accept_next().await;
}

#[tokio::test]
async fn transport_error_retries() {
	let mut h = harness();
	h.socket.connect();
	let conn = h.accept_next().await;

	conn.fail("connection reset");

	h.expect_event(|e| *e == ConnectionEvent::Disconnected { reason: DisconnectReason::TransportError })
		.await;
	let _conn = h.accept_next().await;
}

#[tokio::test]
async fn silence_is_ping_timeout() {
	let mut h = harness_with(config().with_ping_timeout(Duration::from_millis(100)));
	h.socket.connect();
	let _conn = h.accept_next().await;

	h.expect_event(|e| *e == ConnectionEvent::Disconnected { reason: DisconnectReason::PingTimeout })
		.await;
	assert_eq!(h.socket.last_disconnect_reason(), Some(DisconnectReason::PingTimeout));
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
	let mut h = harness();
	h.socket.connect();
	let mut conn = h.accept_next().await;

	conn.ping();

	assert_eq!(timeout(WAIT, conn.next_frame()).await.unwrap(), Some(ClientFrame::Pong));
}

#[tokio::test]
async fn retry_cap_stops_reconnecting() {
	let mut h = harness_with(config().with_reconnect_attempts(Some(1)));
	h.dialer.refuse_next(TransportError::Closed);
	h.dialer.refuse_next(TransportError::Closed);
	h.socket.connect();

	assert_eq!(
		h.expect_event(|e| matches!(e, ConnectionEvent::RetriesExhausted { .. })).await,
		ConnectionEvent::RetriesExhausted { attempts: 1 }
	);
	h.wait_state(ConnectionState::Disconnected).await;
	assert_eq!(h.dialer.dial_count(), 2);
}

#[tokio::test]
async fn disabled_reconnection_stays_closed_after_drop() {
	let mut h = harness_with(config().with_reconnection(false));
	h.socket.connect();
	let conn = h.accept_next().await;

	conn.drop_transport();

	h.wait_state(ConnectionState::Disconnected).await;
	sleep(DELAY * 4).await;
	assert_eq!(h.dialer.dial_count(), 1);
}

#[tokio::test]
async fn disconnect_cancels_pending_retry() {
	let mut h = harness_with(config().with_reconnect_delay(Duration::from_millis(200)));
	h.socket.connect();
	let conn = h.accept_next().await;
	conn.drop_transport();
	h.expect_event(|e| matches!(e, ConnectionEvent::RetryScheduled { .. })).await;

	h.socket.disconnect();

	assert_eq!(h.socket.state(), ConnectionState::Disconnected);
	sleep(Duration::from_millis(400)).await;
	assert_eq!(h.dialer.dial_count(), 1);
	assert_eq!(h.socket.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn events_reach_subscribers_until_unsubscribed() {
	let mut h = harness();
	let (first_tx, mut first_rx) = mpsc::unbounded_channel::<Value>();
	let (second_tx, mut second_rx) = mpsc::unbounded_channel::<Value>();

	// Subscribing connects lazily.
	let first = h.socket.on_event("tweets", move |data| {
		let _ = first_tx.send(data.clone());
	});
	let _second = h.socket.on_event("tweets", move |data| {
		let _ = second_tx.send(data.clone());
	});
	let conn = h.accept_next().await;
	assert_eq!(h.dialer.dial_count(), 1);
	assert_eq!(h.socket.subscriber_count("tweets"), 2);

	conn.push_event("tweets", json!({ "id": "1" }));
	assert_eq!(timeout(WAIT, first_rx.recv()).await.unwrap().unwrap()["id"], "1");
	assert_eq!(timeout(WAIT, second_rx.recv()).await.unwrap().unwrap()["id"], "1");

	first.unsubscribe();
	first.unsubscribe();
	conn.push_event("tweets", json!({ "id": "2" }));
	conn.push_event("likes", json!({ "id": "3" }));

	assert_eq!(timeout(WAIT, second_rx.recv()).await.unwrap().unwrap()["id"], "2");
	assert!(first_rx.try_recv().is_err());
	assert_eq!(h.socket.subscriber_count("tweets"), 1);
}

#[tokio::test]
async fn unsubscribe_after_teardown_is_noop() {
	let mut h = harness();
	let sub = h.socket.on_event("tweets", |_| {});
	let _conn = h.accept_next().await;

	h.socket.disconnect();
	drop(h.socket);

	sub.unsubscribe();
	assert!(!sub.is_active());
}

#[tokio::test]
async fn tweet_feed_decodes_pushes_and_skips_garbage() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let (dialer, mut server) = FakeDialer::new();
	let store = Arc::new(dwitter::MemoryCredentialStore::new());
	dwitter::CredentialStore::save(&*store, &dwitter::Credentials::new("abc", "nanduck")).unwrap();
	let config = dwitter::ClientConfig::new("http://127.0.0.1:9").unwrap().with_socket(config());
	let client = dwitter::Client::with_dialer(config, store, Arc::new(dialer)).unwrap();

	let (tx, mut rx) = mpsc::unbounded_channel();
	let _sub = client.tweets().on_sync(move |tweet| {
		let _ = tx.send(tweet);
	});

	let mut conn = timeout(WAIT, server.next_connection()).await.unwrap().unwrap();
	assert_eq!(conn.expect_handshake().await.unwrap().token.as_deref(), Some("abc"));
	conn.accept();

	conn.push_event("tweets", json!({ "id": "broken" }));
	conn.push_event(
		"tweets",
		json!({
			"id": "7",
			"text": "hello",
			"createdAt": "2026-01-01T00:00:00Z",
			"name": "Nan",
			"username": "nanduck",
		}),
	);

	let tweet = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
	assert_eq!(tweet.id, "7");
	assert_eq!(tweet.url, None);
	assert!(rx.try_recv().is_err());
}
