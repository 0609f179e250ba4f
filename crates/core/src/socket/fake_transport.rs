//! In-memory dialer for exercising the connection manager without a server.
//!
//! # Example
//!
//! ```ignore
//! let (dialer, mut server) = FakeDialer::new();
//! let socket = SocketClient::with_dialer(config, Arc::new(dialer), || Some("abc".into()));
//! socket.connect();
//!
//! let mut conn = server.next_connection().await.unwrap();
//! assert_eq!(conn.expect_handshake().await.unwrap().token.as_deref(), Some("abc"));
//! conn.accept();
//! conn.push_event("tweets", json!({"id": "1"}));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dwitter_protocol::{ClientFrame, HandshakeAuth, ServerFrame};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::transport::{BoxFuture, Dialer, Transport, TransportError, TransportParts, TransportReceiver};

/// Hands every dial to the paired [`FakeServer`], unless a refusal is queued.
#[derive(Clone)]
pub struct FakeDialer {
	refusals: Arc<Mutex<VecDeque<TransportError>>>,
	accepted: mpsc::UnboundedSender<FakeConnection>,
	dials: Arc<AtomicUsize>,
}

/// Receives the connections a [`FakeDialer`] opens.
pub struct FakeServer {
	accepted: mpsc::UnboundedReceiver<FakeConnection>,
}

impl FakeDialer {
	pub fn new() -> (FakeDialer, FakeServer) {
		let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
		let dialer = FakeDialer {
			refusals: Arc::new(Mutex::new(VecDeque::new())),
			accepted: accepted_tx,
			dials: Arc::new(AtomicUsize::new(0)),
		};
		(dialer, FakeServer { accepted: accepted_rx })
	}

	/// Fails the next dial with `err`. Queued refusals are consumed in order.
	pub fn refuse_next(&self, err: TransportError) {
		self.refusals.lock().push_back(err);
	}

	/// Number of dials attempted so far, refused ones included.
	pub fn dial_count(&self) -> usize {
		self.dials.load(Ordering::SeqCst)
	}
}

impl Dialer for FakeDialer {
	fn dial(&self) -> BoxFuture<'_, Result<TransportParts, TransportError>> {
		Box::pin(async move {
			self.dials.fetch_add(1, Ordering::SeqCst);
			let refusal = self.refusals.lock().pop_front();
			if let Some(err) = refusal {
				return Err(err);
			}

			let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
			let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
			let closed = Arc::new(AtomicBool::new(false));

			let connection = FakeConnection {
				inbound: inbound_tx,
				outbound: outbound_rx,
				closed: Arc::clone(&closed),
			};
			self.accepted.send(connection).map_err(|_| TransportError::Unreachable("fake server dropped".into()))?;

			Ok(TransportParts {
				sender: Box::new(FakeSender {
					outbound: outbound_tx,
					closed,
				}),
				receiver: Box::new(FakeReceiver { inbound: inbound_rx }),
			})
		})
	}
}

impl FakeServer {
	/// Waits for the next successful dial.
	pub async fn next_connection(&mut self) -> Option<FakeConnection> {
		self.accepted.recv().await
	}

	/// Returns a dial that already happened, without waiting.
	pub fn try_next_connection(&mut self) -> Option<FakeConnection> {
		self.accepted.try_recv().ok()
	}
}

/// Server side of one fake connection. Dropping it ends the client's stream.
pub struct FakeConnection {
	inbound: mpsc::UnboundedSender<Result<ServerFrame, TransportError>>,
	outbound: mpsc::UnboundedReceiver<ClientFrame>,
	closed: Arc<AtomicBool>,
}

impl FakeConnection {
	/// Reads the client's first frame, which must be the handshake.
	pub async fn expect_handshake(&mut self) -> Option<HandshakeAuth> {
		match self.outbound.recv().await? {
			ClientFrame::Connect { auth } => Some(auth),
			_ => None,
		}
	}

	pub async fn next_frame(&mut self) -> Option<ClientFrame> {
		self.outbound.recv().await
	}

	pub fn accept(&self) {
		self.push(ServerFrame::Connected {
			sid: Some("fake-sid".into()),
		});
	}

	pub fn reject(&self, message: &str) {
		self.push(ServerFrame::ConnectError {
			message: message.to_string(),
		});
	}

	pub fn push_event(&self, name: &str, data: Value) {
		self.push(ServerFrame::Event {
			name: name.to_string(),
			data,
		});
	}

	pub fn ping(&self) {
		self.push(ServerFrame::Ping);
	}

	pub fn server_disconnect(&self) {
		self.push(ServerFrame::Disconnect);
	}

	/// Fails the client's stream with a transport-level error.
	pub fn fail(&self, message: &str) {
		let _ = self.inbound.send(Err(TransportError::Protocol(message.to_string())));
	}

	/// Ends the client's stream as if the network dropped it.
	pub fn drop_transport(self) {
		drop(self);
	}

	/// Whether the client closed its sending half.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn push(&self, frame: ServerFrame) {
		let _ = self.inbound.send(Ok(frame));
	}
}

struct FakeSender {
	outbound: mpsc::UnboundedSender<ClientFrame>,
	closed: Arc<AtomicBool>,
}

impl Transport for FakeSender {
	fn send(&mut self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>> {
		let result = if self.closed.load(Ordering::SeqCst) {
			Err(TransportError::Closed)
		} else {
			self.outbound.send(frame).map_err(|_| TransportError::Closed)
		};
		Box::pin(async move { result })
	}

	fn close(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
		self.closed.store(true, Ordering::SeqCst);
		Box::pin(async { Ok(()) })
	}
}

struct FakeReceiver {
	inbound: mpsc::UnboundedReceiver<Result<ServerFrame, TransportError>>,
}

impl TransportReceiver for FakeReceiver {
	fn recv(&mut self) -> BoxFuture<'_, Option<Result<ServerFrame, TransportError>>> {
		Box::pin(async move { self.inbound.recv().await })
	}
}
