//! Frames exchanged on the live socket.
//!
//! Every frame is a JSON text message tagged by `type`:
//!
//! ```json
//! {"type": "connect", "auth": {"token": "eyJhbGciOi..."}}
//! {"type": "connected", "sid": "Zk3q"}
//! {"type": "event", "name": "tweets", "data": {"id": "1", "text": "hi"}}
//! ```
//!
//! The bearer token only ever travels inside the `connect` frame, never in
//! the socket URL.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credentials presented during the socket handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeAuth {
	pub token: Option<String>,
}

/// Frames sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
	/// First frame of every connection attempt.
	Connect { auth: HandshakeAuth },
	/// Reply to a server [`ServerFrame::Ping`].
	Pong,
	/// Client is closing the session on purpose.
	Disconnect,
}

/// Frames sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
	/// Handshake accepted.
	Connected {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		sid: Option<String>,
	},
	/// Handshake refused, e.g. `"Authentication error"`.
	ConnectError { message: String },
	/// A named push message.
	Event {
		name: String,
		#[serde(default)]
		data: Value,
	},
	/// Liveness probe; the client answers with [`ClientFrame::Pong`].
	Ping,
	/// Server is closing the session on purpose.
	Disconnect,
}
