//! Client configuration.
//!
//! A [`ClientConfig`] names the fixed HTTP base endpoint and carries the
//! [`SocketConfig`] for the live connection. The socket URL defaults to the
//! base URL with its scheme swapped (`http` → `ws`, `https` → `wss`).

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Path of the "who am I" probe.
pub const DEFAULT_PROBE_PATH: &str = "auth/me";

/// Default delay between automatic reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default time allowed for the handshake reply.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Default silence after which a live connection counts as timed out
/// (25s server ping interval plus 20s grace).
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Base endpoint every request path is resolved against.
	pub base_url: Url,
	/// Path whose 401 is returned to the caller instead of tearing the session down.
	pub probe_path: String,
	/// Per-request timeout; `None` leaves it to the HTTP stack.
	pub request_timeout: Option<Duration>,
	pub socket: SocketConfig,
}

impl ClientConfig {
	/// Builds a config for `base_url` with default socket settings.
	pub fn new(base_url: &str) -> Result<Self> {
		let base_url = Url::parse(base_url)?;
		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(Error::Config(format!("base URL must be http(s), got {}", base_url.scheme())));
		}
		let socket_url = socket_url_for(&base_url)?;
		Ok(Self {
			base_url,
			probe_path: DEFAULT_PROBE_PATH.to_string(),
			request_timeout: None,
			socket: SocketConfig::new(socket_url),
		})
	}

	/// Overrides the socket endpoint.
	pub fn with_socket_url(mut self, url: &str) -> Result<Self> {
		let url = Url::parse(url)?;
		if !matches!(url.scheme(), "ws" | "wss") {
			return Err(Error::Config(format!("socket URL must be ws(s), got {}", url.scheme())));
		}
		self.socket.url = url;
		Ok(self)
	}

	pub fn with_probe_path(mut self, path: impl Into<String>) -> Self {
		self.probe_path = path.into();
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);
		self
	}

	pub fn with_socket(mut self, socket: SocketConfig) -> Self {
		self.socket = socket;
		self
	}
}

/// Settings for the live connection and its built-in retry.
///
/// Retry is a fixed delay between attempts, optionally capped; there is no
/// backoff curve.
#[derive(Debug, Clone)]
pub struct SocketConfig {
	pub url: Url,
	/// Whether transport-level drops are retried automatically.
	pub reconnection: bool,
	pub reconnect_delay: Duration,
	/// Maximum consecutive automatic attempts; `None` retries forever.
	pub reconnect_attempts: Option<u32>,
	pub handshake_timeout: Duration,
	pub ping_timeout: Duration,
}

impl SocketConfig {
	pub fn new(url: Url) -> Self {
		Self {
			url,
			reconnection: true,
			reconnect_delay: DEFAULT_RECONNECT_DELAY,
			reconnect_attempts: None,
			handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
			ping_timeout: DEFAULT_PING_TIMEOUT,
		}
	}

	pub fn with_reconnection(mut self, enabled: bool) -> Self {
		self.reconnection = enabled;
		self
	}

	pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
		self.reconnect_delay = delay;
		self
	}

	pub fn with_reconnect_attempts(mut self, attempts: Option<u32>) -> Self {
		self.reconnect_attempts = attempts;
		self
	}

	pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
		self.handshake_timeout = timeout;
		self
	}

	pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
		self.ping_timeout = timeout;
		self
	}
}

/// Derives the socket endpoint from an HTTP base URL.
pub fn socket_url_for(base_url: &Url) -> Result<Url> {
	let scheme = match base_url.scheme() {
		"https" => "wss",
		"http" => "ws",
		other => return Err(Error::Config(format!("cannot derive socket URL from {other} scheme"))),
	};
	let mut url = base_url.clone();
	url.set_scheme(scheme)
		.map_err(|()| Error::Config(format!("cannot switch {base_url} to {scheme}")))?;
	Ok(url)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn socket_url_follows_base_scheme() {
		let config = ClientConfig::new("https://api.dwitter.dev:8443").unwrap();
		assert_eq!(config.socket.url.as_str(), "wss://api.dwitter.dev:8443/");

		let config = ClientConfig::new("http://localhost:8080").unwrap();
		assert_eq!(config.socket.url.as_str(), "ws://localhost:8080/");
	}

	#[test]
	fn rejects_non_http_base() {
		let err = ClientConfig::new("ftp://example.com").unwrap_err();
		assert!(matches!(err, Error::Config(_)));
	}

	#[test]
	fn socket_override_must_be_websocket() {
		let config = ClientConfig::new("http://localhost:8080").unwrap();
		assert!(config.clone().with_socket_url("http://localhost:9000").is_err());

		let config = config.with_socket_url("ws://localhost:9000/live").unwrap();
		assert_eq!(config.socket.url.as_str(), "ws://localhost:9000/live");
	}

	#[test]
	fn defaults_retry_forever_with_fixed_delay() {
		let config = ClientConfig::new("http://localhost:8080").unwrap();
		assert!(config.socket.reconnection);
		assert_eq!(config.socket.reconnect_attempts, None);
		assert_eq!(config.socket.reconnect_delay, DEFAULT_RECONNECT_DELAY);
		assert_eq!(config.probe_path, "auth/me");
	}
}
