//! Session state and the controller that sequences it.
//!
//! [`SessionController`] is the only writer of the in-memory [`Session`]. It
//! keeps three things consistent: the credential store, the live socket and
//! the session snapshot observers see through [`SessionController::watch`].

mod token_cell;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dwitter_protocol::{LoginRequest, SessionPayload, SignupRequest};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use token_cell::TokenCell;

use crate::auth_bus::AuthFailure;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Error, Result};
use crate::http::{FetchOutcome, HttpClient, RequestOptions};
use crate::socket::SocketClient;

pub const SIGNUP_PATH: &str = "auth/signup";
pub const LOGIN_PATH: &str = "auth/login";
pub const LOGOUT_PATH: &str = "auth/logout";
pub const REFRESH_PATH: &str = "auth/refresh";

/// Current sign-in state. `authenticated` implies a non-empty token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	#[serde(skip_serializing)]
	access_token: Option<String>,
	username: Option<String>,
	authenticated: bool,
}

impl Session {
	pub fn authenticated(access_token: impl Into<String>, username: impl Into<String>) -> Result<Self> {
		let access_token = access_token.into();
		if access_token.is_empty() {
			return Err(Error::InvalidSession("empty access token".into()));
		}
		Ok(Self {
			access_token: Some(access_token),
			username: Some(username.into()),
			authenticated: true,
		})
	}

	pub fn signed_out() -> Self {
		Self::default()
	}

	pub fn access_token(&self) -> Option<&str> {
		self.access_token.as_deref()
	}

	pub fn username(&self) -> Option<&str> {
		self.username.as_deref()
	}

	pub fn is_authenticated(&self) -> bool {
		self.authenticated
	}
}

/// Sequences signup, login, startup resolution and logout.
///
/// Cheap to clone. The controller subscribes to the auth error bus of the
/// [`HttpClient`] it is given; constructing a second controller over the same
/// client replaces the first one's subscription.
#[derive(Clone)]
pub struct SessionController {
	inner: Arc<Inner>,
}

struct Inner {
	http: HttpClient,
	store: Arc<dyn CredentialStore>,
	socket: SocketClient,
	session: watch::Sender<Session>,
	token: TokenCell,
	/// Logouts in flight; auth failures seen meanwhile are left to `log_out`.
	logging_out: AtomicUsize,
}

impl SessionController {
	pub fn new(http: HttpClient, store: Arc<dyn CredentialStore>, socket: SocketClient, token: TokenCell) -> Self {
		let (session, _) = watch::channel(Session::signed_out());
		token.set(None);
		let inner = Arc::new(Inner {
			http,
			store,
			socket,
			session,
			token,
			logging_out: AtomicUsize::new(0),
		});

		let weak: Weak<Inner> = Arc::downgrade(&inner);
		inner.http.auth_errors().subscribe(move |failure| {
			if let Some(inner) = weak.upgrade() {
				inner.on_auth_failure(failure);
			}
		});

		Self { inner }
	}

	pub async fn sign_up(&self, request: &SignupRequest) -> Result<Session> {
		let options = RequestOptions::post().json(request)?;
		let outcome = self.inner.http.fetch(SIGNUP_PATH, options).await?;
		let payload = session_payload(outcome)?.ok_or(Error::Unauthenticated)?;
		self.inner.establish(payload, Some(&request.username))
	}

	pub async fn log_in(&self, username: &str, password: &str) -> Result<Session> {
		let request = LoginRequest {
			username: username.to_string(),
			password: password.to_string(),
		};
		let outcome = self.inner.http.fetch(LOGIN_PATH, RequestOptions::post().json(&request)?).await?;
		let payload = session_payload(outcome)?.ok_or(Error::Unauthenticated)?;
		self.inner.establish(payload, Some(username))
	}

	/// Startup "who am I": probes with the stored token and falls back to a
	/// refresh when the probe is unauthenticated.
	pub async fn resolve_session(&self) -> Result<Session> {
		let stored = self.inner.store.load();
		if stored.token().is_none() {
			debug!(target = "dwitter.session", "no stored token; skipping probe");
			return Ok(self.inner.replace(Session::signed_out()));
		}

		let probe = self.inner.http.probe_path().to_string();
		let outcome = self.inner.http.fetch(&probe, RequestOptions::get().bearer(&stored)?).await?;
		match outcome {
			FetchOutcome::Status(status) if status == StatusCode::UNAUTHORIZED => {
				info!(target = "dwitter.session", username = stored.username.as_deref().unwrap_or("-"), "probe unauthenticated; refreshing");
				self.refresh(&stored).await
			}
			FetchOutcome::Payload(value) => {
				let mut payload = decode_payload(value)?;
				if payload.access_token.as_deref().is_none_or(str::is_empty) {
					payload.access_token = stored.access_token.clone();
				}
				self.inner.establish(payload, stored.username.as_deref())
			}
			FetchOutcome::Status(_) | FetchOutcome::NoValue => Ok(self.inner.replace(Session::signed_out())),
		}
	}

	async fn refresh(&self, stored: &Credentials) -> Result<Session> {
		let username = stored.username.as_deref().unwrap_or_default();
		let query: String = url::form_urlencoded::byte_serialize(username.as_bytes()).collect();
		let path = format!("{REFRESH_PATH}?username={query}");

		let outcome = self.inner.http.fetch(&path, RequestOptions::get().bearer(stored)?).await?;
		match session_payload(outcome)? {
			Some(payload) => self.inner.establish(payload, stored.username.as_deref()),
			None => Ok(self.inner.replace(Session::signed_out())),
		}
	}

	/// Invalidates the remote session, then clears the store, then closes the
	/// socket, then clears the in-memory session.
	///
	/// Local teardown runs even when the remote call fails; that failure is
	/// returned afterwards.
	pub async fn log_out(&self) -> Result<()> {
		let stored = self.inner.store.load();
		let remote = {
			let _guard = LogoutGuard::enter(&self.inner.logging_out);
			match RequestOptions::get().bearer(&stored) {
				Ok(options) => self.inner.http.fetch(LOGOUT_PATH, options).await,
				Err(err) => Err(err),
			}
		};
		if let Err(err) = &remote {
			warn!(target = "dwitter.session", error = %err, "remote logout failed; clearing local session anyway");
		}

		let cleared = self.inner.store.clear();
		self.inner.socket.disconnect();
		self.inner.replace(Session::signed_out());
		info!(target = "dwitter.session", username = stored.username.as_deref().unwrap_or("-"), "signed out");

		remote?;
		cleared
	}

	pub fn session(&self) -> Session {
		self.inner.session.borrow().clone()
	}

	pub fn watch(&self) -> watch::Receiver<Session> {
		self.inner.session.subscribe()
	}

	pub fn token_cell(&self) -> &TokenCell {
		&self.inner.token
	}
}

impl std::fmt::Debug for SessionController {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let session = self.inner.session.borrow();
		f.debug_struct("SessionController")
			.field("authenticated", &session.is_authenticated())
			.field("username", &session.username())
			.finish()
	}
}

impl Inner {
	fn establish(&self, payload: SessionPayload, fallback_username: Option<&str>) -> Result<Session> {
		let token = payload
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or_else(|| Error::InvalidSession("response has no access token".into()))?;
		let username = payload
			.username
			.or_else(|| fallback_username.map(str::to_string))
			.ok_or_else(|| Error::InvalidSession("response has no username".into()))?;

		self.store.save(&Credentials::new(token.clone(), username.clone()))?;
		let session = Session::authenticated(token, username)?;
		info!(target = "dwitter.session", username = session.username().unwrap_or_default(), "signed in");
		Ok(self.replace(session))
	}

	fn replace(&self, session: Session) -> Session {
		self.token.set(session.access_token.clone());
		self.session.send_replace(session.clone());
		session
	}

	/// Idempotent: a second failure finds everything already cleared.
	fn on_auth_failure(&self, failure: &AuthFailure) {
		if self.logging_out.load(Ordering::Acquire) > 0 {
			debug!(target = "dwitter.session", path = %failure.path, "authentication lost during logout");
			return;
		}
		warn!(target = "dwitter.session", path = %failure.path, message = %failure.message, "authentication lost; signing out");
		self.replace(Session::signed_out());
		self.socket.disconnect();
	}
}

/// Counts one in-flight logout until dropped.
struct LogoutGuard<'a>(&'a AtomicUsize);

impl<'a> LogoutGuard<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::AcqRel);
		Self(counter)
	}
}

impl Drop for LogoutGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::AcqRel);
	}
}

fn session_payload(outcome: FetchOutcome) -> Result<Option<SessionPayload>> {
	match outcome {
		FetchOutcome::Payload(value) => decode_payload(value).map(Some),
		FetchOutcome::NoValue => Ok(None),
		FetchOutcome::Status(status) => Err(Error::Request {
			status,
			message: crate::http::GENERIC_ERROR_MESSAGE.to_string(),
		}),
	}
}

fn decode_payload(value: Value) -> Result<SessionPayload> {
	if value.is_null() {
		return Err(Error::InvalidSession("empty session payload".into()));
	}
	Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn authenticated_session_requires_token() {
		assert!(matches!(Session::authenticated("", "nanduck"), Err(Error::InvalidSession(_))));

		let session = Session::authenticated("abc", "nanduck").unwrap();
		assert!(session.is_authenticated());
		assert_eq!(session.access_token(), Some("abc"));
	}

	#[test]
	fn signed_out_session_is_empty() {
		let session = Session::signed_out();
		assert!(!session.is_authenticated());
		assert_eq!(session.access_token(), None);
		assert_eq!(session.username(), None);
	}

	#[test]
	fn serialized_session_omits_token() {
		let session = Session::authenticated("abc", "nanduck").unwrap();
		let value = serde_json::to_value(&session).unwrap();
		assert_eq!(value, serde_json::json!({ "username": "nanduck", "authenticated": true }));
	}

	#[test]
	fn null_payload_is_invalid_session() {
		assert!(matches!(
			session_payload(FetchOutcome::Payload(Value::Null)),
			Err(Error::InvalidSession(_))
		));
		assert!(session_payload(FetchOutcome::NoValue).unwrap().is_none());
	}
}
