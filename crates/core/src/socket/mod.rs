//! Real-time connection manager.
//!
//! [`SocketClient`] owns at most one live connection. A background driver
//! task dials, performs the token handshake, pumps server frames into the
//! subscription registry and decides what happens after every drop:
//!
//! | disconnect reason      | action                         |
//! |------------------------|--------------------------------|
//! | `io server disconnect` | reconnect immediately          |
//! | `io client disconnect` | stay closed                    |
//! | anything else          | fixed-delay automatic retries  |
//!
//! Failed attempts that would fail identically on retry (unreachable
//! endpoint, rejected token) stop the driver instead of retrying.

mod fake_transport;
mod reason;
mod subscriptions;
mod transport;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dwitter_protocol::{ClientFrame, HandshakeAuth, ServerFrame};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, trace, warn};

pub use fake_transport::{FakeConnection, FakeDialer, FakeServer};
pub use reason::{ConnectError, ConnectErrorKind, ConnectionEvent, ConnectionState, DisconnectReason, Recovery};
pub use subscriptions::Subscription;
pub use transport::{BoxFuture, Dialer, Transport, TransportError, TransportParts, TransportReceiver, WebSocketDialer};

use crate::config::SocketConfig;
use subscriptions::Registry;

/// Supplies the handshake token. Called once per attempt, right before the
/// handshake frame is sent.
pub type TokenAccessor = Arc<dyn Fn() -> Option<String> + Send + Sync>;

const EVENT_CAPACITY: usize = 64;

/// Cheaply cloneable handle to the connection manager. The connection is
/// closed when the last clone is dropped.
#[derive(Clone)]
pub struct SocketClient {
	owner: Arc<Owner>,
}

struct Owner {
	inner: Arc<Inner>,
}

impl Drop for Owner {
	fn drop(&mut self) {
		self.inner.disconnect();
	}
}

struct Inner {
	config: SocketConfig,
	dialer: Arc<dyn Dialer>,
	token: TokenAccessor,
	state: watch::Sender<ConnectionState>,
	events: broadcast::Sender<ConnectionEvent>,
	last_reason: Mutex<Option<DisconnectReason>>,
	registry: Arc<Registry>,
	driver: Mutex<Option<DriverHandle>>,
	generation: AtomicU64,
}

struct DriverHandle {
	generation: u64,
	commands: mpsc::UnboundedSender<Command>,
}

enum Command {
	Disconnect,
}

impl SocketClient {
	/// Creates a manager that dials `config.url` over WebSocket. Nothing is
	/// dialed until [`connect`](Self::connect) or [`on_event`](Self::on_event).
	pub fn new<F>(config: SocketConfig, token: F) -> Self
	where
		F: Fn() -> Option<String> + Send + Sync + 'static,
	{
		let dialer = Arc::new(WebSocketDialer::new(config.url.clone()));
		Self::with_dialer(config, dialer, token)
	}

	pub fn with_dialer<F>(config: SocketConfig, dialer: Arc<dyn Dialer>, token: F) -> Self
	where
		F: Fn() -> Option<String> + Send + Sync + 'static,
	{
		let (state, _) = watch::channel(ConnectionState::Disconnected);
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		let inner = Arc::new(Inner {
			config,
			dialer,
			token: Arc::new(token),
			state,
			events,
			last_reason: Mutex::new(None),
			registry: Arc::new(Registry::default()),
			driver: Mutex::new(None),
			generation: AtomicU64::new(0),
		});
		Self {
			owner: Arc::new(Owner { inner }),
		}
	}

	/// Starts connecting unless a connection is live or being established.
	/// Must be called from within a tokio runtime.
	pub fn connect(&self) {
		let inner = &self.owner.inner;
		let mut driver = inner.driver.lock();
		if driver.is_some() {
			return;
		}

		let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let (commands, command_rx) = mpsc::unbounded_channel();
		*driver = Some(DriverHandle { generation, commands });
		inner.state.send_replace(ConnectionState::Connecting);
		drop(driver);

		debug!(target = "dwitter.socket", generation, url = %inner.config.url, "starting connection driver");
		tokio::spawn(run_driver(Arc::clone(inner), generation, command_rx));
	}

	/// Closes the connection and cancels pending retries. The manager then
	/// stays closed until the next `connect()`. Idempotent.
	pub fn disconnect(&self) {
		self.owner.inner.disconnect();
	}

	/// Registers `handler` for the named server event, connecting first if
	/// no connection is live.
	pub fn on_event<F>(&self, event: &str, handler: F) -> Subscription
	where
		F: FnMut(&Value) + Send + 'static,
	{
		if self.state() != ConnectionState::Connected {
			self.connect();
		}
		self.owner.inner.registry.insert(event, Box::new(handler))
	}

	pub fn state(&self) -> ConnectionState {
		*self.owner.inner.state.borrow()
	}

	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.owner.inner.state.subscribe()
	}

	pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
		self.owner.inner.events.subscribe()
	}

	/// Reason for the most recent drop of an established connection.
	pub fn last_disconnect_reason(&self) -> Option<DisconnectReason> {
		*self.owner.inner.last_reason.lock()
	}

	pub fn subscriber_count(&self, event: &str) -> usize {
		self.owner.inner.registry.len(event)
	}

	pub fn config(&self) -> &SocketConfig {
		&self.owner.inner.config
	}
}

impl std::fmt::Debug for SocketClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SocketClient")
			.field("url", &self.owner.inner.config.url.as_str())
			.field("state", &self.state())
			.finish()
	}
}

impl Inner {
	fn disconnect(&self) {
		let mut driver = self.driver.lock();
		let Some(handle) = driver.take() else {
			return;
		};
		let _ = handle.commands.send(Command::Disconnect);

		let was_connected = self.state.send_replace(ConnectionState::Disconnected) == ConnectionState::Connected;
		if was_connected {
			*self.last_reason.lock() = Some(DisconnectReason::ClientDisconnect);
			let _ = self.events.send(ConnectionEvent::Disconnected {
				reason: DisconnectReason::ClientDisconnect,
			});
		}
		drop(driver);
		info!(target = "dwitter.socket", reason = %DisconnectReason::ClientDisconnect, "socket closed");
	}

	/// Runs `apply` only while `generation` still owns the manager.
	fn update(&self, generation: u64, apply: impl FnOnce(&Inner)) -> bool {
		let driver = self.driver.lock();
		if driver.as_ref().map(|handle| handle.generation) != Some(generation) {
			return false;
		}
		apply(self);
		true
	}

	/// Gives up ownership after the driver stops on its own.
	fn release(&self, generation: u64) {
		let mut driver = self.driver.lock();
		if driver.as_ref().map(|handle| handle.generation) != Some(generation) {
			return;
		}
		*driver = None;
		self.state.send_replace(ConnectionState::Disconnected);
	}

	fn emit(&self, event: ConnectionEvent) {
		let _ = self.events.send(event);
	}

	async fn handshake(&self) -> Result<TransportParts, ConnectError> {
		let limit = self.config.handshake_timeout;
		match tokio::time::timeout(limit, self.try_handshake()).await {
			Ok(result) => result,
			Err(_) => Err(ConnectError::new(
				ConnectErrorKind::Other,
				format!("handshake timed out after {}ms", limit.as_millis()),
			)),
		}
	}

	async fn try_handshake(&self) -> Result<TransportParts, ConnectError> {
		let mut parts = self.dialer.dial().await.map_err(ConnectError::from_dial)?;

		let auth = HandshakeAuth { token: (self.token)() };
		parts
			.sender
			.send(ClientFrame::Connect { auth })
			.await
			.map_err(|err| ConnectError::new(ConnectErrorKind::Other, err.to_string()))?;

		loop {
			match parts.receiver.recv().await {
				Some(Ok(ServerFrame::Connected { sid })) => {
					debug!(target = "dwitter.socket", sid = sid.as_deref().unwrap_or("-"), "handshake accepted");
					return Ok(parts);
				}
				Some(Ok(ServerFrame::ConnectError { message })) => {
					let _ = parts.sender.close().await;
					return Err(ConnectError::from_refusal(message));
				}
				Some(Ok(ServerFrame::Ping)) => {
					let _ = parts.sender.send(ClientFrame::Pong).await;
				}
				Some(Ok(frame)) => {
					debug!(target = "dwitter.socket", ?frame, "ignoring frame before handshake completed");
				}
				Some(Err(err)) => return Err(ConnectError::new(ConnectErrorKind::Other, err.to_string())),
				None => {
					return Err(ConnectError::new(
						ConnectErrorKind::Other,
						"transport closed during handshake",
					));
				}
			}
		}
	}

	/// Forwards frames until the connection ends and reports why.
	async fn pump(&self, mut parts: TransportParts, commands: &mut mpsc::UnboundedReceiver<Command>) -> DisconnectReason {
		let ping_timeout = self.config.ping_timeout;
		loop {
			let next = tokio::select! {
				biased;
				_ = commands.recv() => {
					let _ = parts.sender.send(ClientFrame::Disconnect).await;
					let _ = parts.sender.close().await;
					return DisconnectReason::ClientDisconnect;
				}
				next = tokio::time::timeout(ping_timeout, parts.receiver.recv()) => next,
			};

			match next {
				Err(_) => return DisconnectReason::PingTimeout,
				Ok(None) => return DisconnectReason::TransportClose,
				Ok(Some(Err(err))) => {
					debug!(target = "dwitter.socket", error = %err, "transport failed");
					return DisconnectReason::TransportError;
				}
				Ok(Some(Ok(ServerFrame::Event { name, data }))) => {
					let handled = self.registry.dispatch(&name, &data);
					trace!(target = "dwitter.socket", event = %name, handled, "event dispatched");
				}
				Ok(Some(Ok(ServerFrame::Ping))) => {
					if let Err(err) = parts.sender.send(ClientFrame::Pong).await {
						debug!(target = "dwitter.socket", error = %err, "pong failed");
						return DisconnectReason::TransportError;
					}
				}
				Ok(Some(Ok(ServerFrame::Disconnect))) => {
					let _ = parts.sender.close().await;
					return DisconnectReason::ServerDisconnect;
				}
				Ok(Some(Ok(frame))) => {
					debug!(target = "dwitter.socket", ?frame, "ignoring unexpected frame");
				}
			}
		}
	}

	/// Sleeps out one retry delay. Returns false when the driver must stop.
	async fn wait_retry(
		&self,
		generation: u64,
		attempts: &mut u32,
		commands: &mut mpsc::UnboundedReceiver<Command>,
	) -> bool {
		if !self.config.reconnection {
			self.release(generation);
			return false;
		}

		*attempts += 1;
		let attempt = *attempts;
		if let Some(limit) = self.config.reconnect_attempts {
			if attempt > limit {
				warn!(target = "dwitter.socket", attempts = limit, "giving up reconnecting");
				if self.update(generation, |inner| inner.emit(ConnectionEvent::RetriesExhausted { attempts: limit })) {
					self.release(generation);
				}
				return false;
			}
		}

		let delay = self.config.reconnect_delay;
		let scheduled = self.update(generation, |inner| {
			inner.state.send_replace(ConnectionState::WaitingRetry);
			inner.emit(ConnectionEvent::RetryScheduled { attempt, delay });
		});
		if !scheduled {
			return false;
		}
		debug!(target = "dwitter.socket", attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");

		tokio::select! {
			biased;
			_ = commands.recv() => false,
			_ = tokio::time::sleep(delay) => true,
		}
	}
}

async fn run_driver(inner: Arc<Inner>, generation: u64, mut commands: mpsc::UnboundedReceiver<Command>) {
	let mut attempts = 0u32;
	loop {
		if !inner.update(generation, |inner| {
			inner.state.send_replace(ConnectionState::Connecting);
		}) {
			return;
		}

		let attempt = tokio::select! {
			biased;
			_ = commands.recv() => return,
			attempt = inner.handshake() => attempt,
		};

		let parts = match attempt {
			Ok(parts) => parts,
			Err(err) => {
				warn!(target = "dwitter.socket", kind = %err.kind, message = %err.message, "connect error");
				let suppress = err.kind.suppresses_retry();
				if !inner.update(generation, |inner| inner.emit(ConnectionEvent::ConnectError(err))) {
					return;
				}
				if suppress {
					info!(target = "dwitter.socket", "not retrying; manager stays disconnected");
					inner.release(generation);
					return;
				}
				if !inner.wait_retry(generation, &mut attempts, &mut commands).await {
					return;
				}
				continue;
			}
		};

		attempts = 0;
		let connected = inner.update(generation, |inner| {
			inner.state.send_replace(ConnectionState::Connected);
			inner.emit(ConnectionEvent::Connected);
		});
		if !connected {
			return;
		}
		info!(target = "dwitter.socket", url = %inner.config.url, "socket connected");

		let reason = inner.pump(parts, &mut commands).await;
		let recorded = inner.update(generation, |inner| {
			*inner.last_reason.lock() = Some(reason);
			inner.state.send_replace(ConnectionState::Disconnected);
			inner.emit(ConnectionEvent::Disconnected { reason });
		});
		if !recorded {
			return;
		}
		info!(target = "dwitter.socket", reason = %reason, "socket disconnected");

		match reason.recovery() {
			Recovery::ReconnectNow => {
				inner.emit(ConnectionEvent::ReconnectRequested);
			}
			Recovery::StayClosed => {
				inner.release(generation);
				return;
			}
			Recovery::AutoRetry => {
				if !inner.wait_retry(generation, &mut attempts, &mut commands).await {
					return;
				}
			}
		}
	}
}
