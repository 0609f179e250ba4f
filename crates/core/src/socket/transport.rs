//! Framed transports the connection manager runs over.
//!
//! A [`Dialer`] opens a fresh connection per attempt and hands back the two
//! halves as [`TransportParts`]. The production dialer speaks JSON text frames
//! over a WebSocket; tests swap in [`FakeDialer`](super::FakeDialer).

use std::future::Future;
use std::pin::Pin;

use dwitter_protocol::{ClientFrame, ServerFrame};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	#[error("endpoint unreachable: {0}")]
	Unreachable(String),

	#[error("upgrade rejected with HTTP {0}")]
	Rejected(u16),

	#[error("transport closed")]
	Closed,

	#[error("transport protocol error: {0}")]
	Protocol(String),
}

/// Outbound half of a connection.
pub trait Transport: Send {
	fn send(&mut self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>>;

	fn close(&mut self) -> BoxFuture<'_, Result<(), TransportError>>;
}

/// Inbound half of a connection. `None` means the peer closed the stream.
pub trait TransportReceiver: Send {
	fn recv(&mut self) -> BoxFuture<'_, Option<Result<ServerFrame, TransportError>>>;
}

pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
}

/// Opens one connection per call.
pub trait Dialer: Send + Sync {
	fn dial(&self) -> BoxFuture<'_, Result<TransportParts, TransportError>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials `ws://` or `wss://` endpoints with tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WebSocketDialer {
	url: Url,
}

impl WebSocketDialer {
	pub fn new(url: Url) -> Self {
		Self { url }
	}

	pub fn url(&self) -> &Url {
		&self.url
	}
}

impl Dialer for WebSocketDialer {
	fn dial(&self) -> BoxFuture<'_, Result<TransportParts, TransportError>> {
		Box::pin(async move {
			debug!(target = "dwitter.socket", url = %self.url, "opening websocket");
			let (stream, _response) = connect_async(self.url.as_str()).await.map_err(dial_error)?;
			let (sink, stream) = stream.split();
			Ok(TransportParts {
				sender: Box::new(WebSocketSender { sink }),
				receiver: Box::new(WebSocketReceiver { stream }),
			})
		})
	}
}

fn dial_error(err: WsError) -> TransportError {
	match err {
		WsError::Io(err) => TransportError::Unreachable(err.to_string()),
		WsError::Url(err) => TransportError::Unreachable(err.to_string()),
		WsError::Http(response) => TransportError::Rejected(response.status().as_u16()),
		WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
		other => TransportError::Protocol(other.to_string()),
	}
}

struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
}

impl Transport for WebSocketSender {
	fn send(&mut self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>> {
		Box::pin(async move {
			let text = serde_json::to_string(&frame).map_err(|err| TransportError::Protocol(err.to_string()))?;
			self.sink.send(Message::Text(text.into())).await.map_err(stream_error)
		})
	}

	fn close(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
		Box::pin(async move { self.sink.close().await.map_err(stream_error) })
	}
}

struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
}

impl TransportReceiver for WebSocketReceiver {
	fn recv(&mut self) -> BoxFuture<'_, Option<Result<ServerFrame, TransportError>>> {
		Box::pin(async move {
			loop {
				let Some(message) = self.stream.next().await else {
					return None;
				};
				match message {
					Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
						Ok(frame) => return Some(Ok(frame)),
						Err(err) => {
							warn!(target = "dwitter.socket", error = %err, "dropping undecodable frame");
						}
					},
					Ok(Message::Close(_)) => return None,
					// Control frames are answered by tungstenite itself.
					Ok(_) => {}
					Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
					Err(err) => return Some(Err(stream_error(err))),
				}
			}
		})
	}
}

fn stream_error(err: WsError) -> TransportError {
	match err {
		WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
		other => TransportError::Protocol(other.to_string()),
	}
}
