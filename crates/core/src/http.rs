//! Request executor for the dwitter HTTP API.
//!
//! [`HttpClient::fetch`] resolves a path against the fixed base endpoint,
//! merges caller headers over `Content-Type: application/json`, parses the
//! body as JSON and classifies the status:
//!
//! | Status | Outcome |
//! |---|---|
//! | 2xx | [`FetchOutcome::Payload`] with the parsed body (`Null` when empty) |
//! | 401 on the probe path | [`FetchOutcome::Status`] so the caller can refresh |
//! | 401 elsewhere | [`AuthErrorBus::publish`], then [`FetchOutcome::NoValue`] |
//! | anything else | [`Error::Request`] with the body's `message` |
//!
//! A missing or malformed body is never an error; it is logged and treated
//! as an empty payload (delete confirmations answer `204` with no body).

use dwitter_protocol::ErrorBody;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth_bus::{AuthErrorBus, AuthFailure};
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Message used when an error response carries no `message` field.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// Method, extra headers and pre-serialized body of one exchange.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
	pub method: Method,
	pub headers: HeaderMap,
	pub body: Option<String>,
}

impl RequestOptions {
	pub fn new(method: Method) -> Self {
		Self {
			method,
			..Default::default()
		}
	}

	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	pub fn post() -> Self {
		Self::new(Method::POST)
	}

	pub fn put() -> Self {
		Self::new(Method::PUT)
	}

	pub fn delete() -> Self {
		Self::new(Method::DELETE)
	}

	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	/// Adds `Authorization: Bearer <token>` for the stored credential.
	pub fn bearer(self, credentials: &Credentials) -> Result<Self> {
		let value = HeaderValue::from_str(&credentials.bearer())?;
		Ok(self.header(AUTHORIZATION, value))
	}

	pub fn body(mut self, body: impl Into<String>) -> Self {
		self.body = Some(body.into());
		self
	}

	/// Serializes `body` as the JSON request body.
	pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
		Ok(self.body(serde_json::to_string(body)?))
	}
}

/// Result of a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
	/// 2xx; `Value::Null` when the body was empty.
	Payload(Value),
	/// Raw status of an unauthenticated probe.
	Status(StatusCode),
	/// The exchange was an auth failure already reported on the bus.
	NoValue,
}

impl FetchOutcome {
	pub fn into_payload(self) -> Option<Value> {
		match self {
			FetchOutcome::Payload(value) => Some(value),
			_ => None,
		}
	}

	/// Deserializes a payload; `NoValue` maps to `None`.
	pub fn decode<T: DeserializeOwned>(self) -> Result<Option<T>> {
		match self {
			FetchOutcome::Payload(value) => Ok(Some(serde_json::from_value(value)?)),
			FetchOutcome::NoValue => Ok(None),
			FetchOutcome::Status(status) => Err(Error::Request {
				status,
				message: GENERIC_ERROR_MESSAGE.to_string(),
			}),
		}
	}
}

/// HTTP request executor. Cheap to clone; clones share the connection pool
/// and the auth error bus.
#[derive(Debug, Clone)]
pub struct HttpClient {
	base_url: Url,
	probe_path: String,
	http: reqwest::Client,
	auth_errors: AuthErrorBus,
}

impl HttpClient {
	pub fn new(config: &ClientConfig, auth_errors: AuthErrorBus) -> Result<Self> {
		let mut builder = reqwest::Client::builder();
		if let Some(timeout) = config.request_timeout {
			builder = builder.timeout(timeout);
		}
		Ok(Self::with_client(config, builder.build()?, auth_errors))
	}

	/// Uses a preconfigured `reqwest` client.
	pub fn with_client(config: &ClientConfig, http: reqwest::Client, auth_errors: AuthErrorBus) -> Self {
		Self {
			base_url: config.base_url.clone(),
			probe_path: normalize_path(&config.probe_path).to_string(),
			http,
			auth_errors,
		}
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// The "who am I" route, normalized.
	pub fn probe_path(&self) -> &str {
		&self.probe_path
	}

	pub fn auth_errors(&self) -> &AuthErrorBus {
		&self.auth_errors
	}

	/// Resolves `path` (with or without a leading `/`) against the base endpoint.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		let base = self.base_url.as_str().trim_end_matches('/');
		Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
	}

	/// Performs one exchange and classifies its status.
	pub async fn fetch(&self, path: &str, options: RequestOptions) -> Result<FetchOutcome> {
		let url = self.endpoint(path)?;
		let method = options.method.clone();

		let mut headers = HeaderMap::new();
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.extend(options.headers);

		let mut request = self.http.request(method.clone(), url).headers(headers);
		if let Some(body) = options.body {
			request = request.body(body);
		}

		let response = request.send().await?;
		let status = response.status();
		let body = response.bytes().await?;
		debug!(target = "dwitter.http", %method, %path, status = status.as_u16(), bytes = body.len(), "response received");

		let payload = parse_payload(path, &body);
		self.classify(path, status, payload)
	}

	fn classify(&self, path: &str, status: StatusCode, payload: Value) -> Result<FetchOutcome> {
		if status.is_success() {
			return Ok(FetchOutcome::Payload(payload));
		}

		let message = serde_json::from_value::<ErrorBody>(payload)
			.ok()
			.map(|body| body.message)
			.filter(|m| !m.is_empty())
			.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());

		if status == StatusCode::UNAUTHORIZED {
			if self.is_probe(path) {
				return Ok(FetchOutcome::Status(status));
			}
			warn!(target = "dwitter.http", %path, %message, "request unauthenticated; notifying session");
			self.auth_errors.publish(&AuthFailure {
				path: path.to_string(),
				message,
			});
			return Ok(FetchOutcome::NoValue);
		}

		Err(Error::Request { status, message })
	}

	fn is_probe(&self, path: &str) -> bool {
		normalize_path(path) == self.probe_path
	}
}

fn parse_payload(path: &str, body: &[u8]) -> Value {
	if body.is_empty() {
		debug!(target = "dwitter.http", %path, "response has no body");
		return Value::Null;
	}
	match serde_json::from_slice(body) {
		Ok(value) => value,
		Err(err) => {
			debug!(target = "dwitter.http", %path, error = %err, "response body is not JSON; using empty payload");
			Value::Null
		}
	}
}

/// `/auth/me?x=1` and `auth/me/` both normalize to `auth/me`.
fn normalize_path(path: &str) -> &str {
	let path = path.split(['?', '#']).next().unwrap_or_default();
	path.trim_matches('/')
}
