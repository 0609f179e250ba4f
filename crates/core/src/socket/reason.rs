//! Connection states and the classification tables that drive recovery.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::transport::TransportError;

/// Lifecycle of the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	Disconnected,
	Connecting,
	Connected,
	/// Between two automatic attempts.
	WaitingRetry,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ConnectionState::Disconnected => "disconnected",
			ConnectionState::Connecting => "connecting",
			ConnectionState::Connected => "connected",
			ConnectionState::WaitingRetry => "waiting-retry",
		})
	}
}

/// Why an established connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
	/// The server closed the session on purpose.
	ServerDisconnect,
	/// Local code called [`SocketClient::disconnect`](super::SocketClient::disconnect).
	ClientDisconnect,
	/// No frame arrived within the ping timeout.
	PingTimeout,
	/// The underlying stream ended.
	TransportClose,
	/// The underlying stream failed.
	TransportError,
}

/// What the manager does after a [`DisconnectReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
	/// Issue a new connect attempt immediately, bypassing the retry policy.
	ReconnectNow,
	/// Stay closed until someone calls `connect()`.
	StayClosed,
	/// Leave it to the built-in retry policy.
	AutoRetry,
}

impl DisconnectReason {
	/// Wire-compatible name, as logged by socket.io clients.
	pub fn as_str(self) -> &'static str {
		match self {
			DisconnectReason::ServerDisconnect => "io server disconnect",
			DisconnectReason::ClientDisconnect => "io client disconnect",
			DisconnectReason::PingTimeout => "ping timeout",
			DisconnectReason::TransportClose => "transport close",
			DisconnectReason::TransportError => "transport error",
		}
	}

	/// Neither the server nor the client retries a deliberate close on its
	/// own, so a server close must be re-requested here; network-level drops
	/// are left to the retry policy.
	pub fn recovery(self) -> Recovery {
		match self {
			DisconnectReason::ServerDisconnect => Recovery::ReconnectNow,
			DisconnectReason::ClientDisconnect => Recovery::StayClosed,
			DisconnectReason::PingTimeout | DisconnectReason::TransportClose | DisconnectReason::TransportError => Recovery::AutoRetry,
		}
	}
}

impl fmt::Display for DisconnectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Category of a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectErrorKind {
	/// Nothing is listening at the endpoint.
	Unreachable,
	/// The handshake refused the token.
	AuthenticationRejected,
	/// Anything else (timeouts, mid-handshake drops, unexpected refusals).
	Other,
}

impl ConnectErrorKind {
	/// Unreachable endpoints and rejected tokens would fail the same way on
	/// every retry, so the manager force-disconnects instead.
	pub fn suppresses_retry(self) -> bool {
		matches!(self, ConnectErrorKind::Unreachable | ConnectErrorKind::AuthenticationRejected)
	}
}

impl fmt::Display for ConnectErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ConnectErrorKind::Unreachable => "unreachable",
			ConnectErrorKind::AuthenticationRejected => "authentication rejected",
			ConnectErrorKind::Other => "other",
		})
	}
}

/// A failed connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ConnectError {
	pub kind: ConnectErrorKind,
	pub message: String,
}

impl ConnectError {
	pub fn new(kind: ConnectErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	/// Classifies a server `connect_error` message. The server prefixes
	/// token failures with `Authentication`.
	pub fn from_refusal(message: impl Into<String>) -> Self {
		let message = message.into();
		let kind = if message.split_whitespace().next() == Some("Authentication") {
			ConnectErrorKind::AuthenticationRejected
		} else {
			ConnectErrorKind::Other
		};
		Self { kind, message }
	}

	/// Classifies a failure to open the transport at all.
	pub fn from_dial(err: TransportError) -> Self {
		let kind = match &err {
			TransportError::Unreachable(_) => ConnectErrorKind::Unreachable,
			TransportError::Rejected(401 | 403) => ConnectErrorKind::AuthenticationRejected,
			_ => ConnectErrorKind::Other,
		};
		Self::new(kind, err.to_string())
	}
}

/// Lifecycle notifications published by [`SocketClient`](super::SocketClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
	Connected,
	Disconnected { reason: DisconnectReason },
	/// A server-initiated close is being re-requested.
	ReconnectRequested,
	/// An automatic attempt will start after `delay`.
	RetryScheduled { attempt: u32, delay: Duration },
	/// The configured attempt cap was reached.
	RetriesExhausted { attempts: u32 },
	ConnectError(ConnectError),
}
