//! Error types for the dwitter client.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced to callers of the HTTP and session APIs.
///
/// Authentication failures on ordinary routes never appear here: they are
/// routed through [`AuthErrorBus`](crate::auth_bus::AuthErrorBus) instead.
/// Connection-level failures of the live socket stay inside
/// [`SocketClient`](crate::socket::SocketClient) as
/// [`TransportError`](crate::socket::TransportError).
#[derive(Debug, Error)]
pub enum Error {
	/// Non-2xx response other than an unauthenticated one.
	#[error("{message}")]
	Request { status: StatusCode, message: String },

	/// The call needed an authenticated session and none was produced.
	#[error("Not authenticated")]
	Unauthenticated,

	/// The server replied with a payload the client cannot use.
	#[error("Invalid session payload: {0}")]
	InvalidSession(String),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Invalid header value: {0}")]
	InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

	#[error("Invalid URL: {0}")]
	InvalidUrl(#[from] url::ParseError),

	#[error("Configuration error: {0}")]
	Config(String),
}

impl Error {
	/// HTTP status for [`Error::Request`], if any.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Error::Request { status, .. } => Some(*status),
			_ => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
