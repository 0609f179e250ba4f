//! Composition root.

use std::sync::Arc;

use crate::auth_bus::AuthErrorBus;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::http::HttpClient;
use crate::session::{SessionController, TokenCell};
use crate::socket::{Dialer, SocketClient, WebSocketDialer};
use crate::tweets::TweetService;

/// Every component wired together, sharing one credential store, one socket
/// and one auth error bus.
#[derive(Debug, Clone)]
pub struct Client {
	http: HttpClient,
	socket: SocketClient,
	session: SessionController,
	tweets: TweetService,
}

impl Client {
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let dialer = Arc::new(WebSocketDialer::new(config.socket.url.clone()));
		Self::with_dialer(config, store, dialer)
	}

	/// Uses `dialer` for the live connection instead of a WebSocket.
	pub fn with_dialer(config: ClientConfig, store: Arc<dyn CredentialStore>, dialer: Arc<dyn Dialer>) -> Result<Self> {
		let token_store = Arc::clone(&store);
		let socket = SocketClient::with_dialer(config.socket.clone(), dialer, move || {
			token_store.load().token().map(str::to_string)
		});

		let auth_errors = AuthErrorBus::new();
		let http = HttpClient::new(&config, auth_errors)?;
		let session = SessionController::new(http.clone(), Arc::clone(&store), socket.clone(), TokenCell::new());
		let tweets = TweetService::new(http.clone(), store, socket.clone());

		Ok(Self {
			http,
			socket,
			session,
			tweets,
		})
	}

	pub fn http(&self) -> &HttpClient {
		&self.http
	}

	pub fn socket(&self) -> &SocketClient {
		&self.socket
	}

	pub fn session(&self) -> &SessionController {
		&self.session
	}

	pub fn tweets(&self) -> &TweetService {
		&self.tweets
	}

	/// Shared copy of the current access token.
	pub fn token(&self) -> TokenCell {
		self.session.token_cell().clone()
	}
}
