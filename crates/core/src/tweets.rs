//! Tweet CRUD over the request executor and the live `tweets` feed.

use std::sync::Arc;

use dwitter_protocol::{Tweet, TweetText};
use tracing::warn;

use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::http::{FetchOutcome, GENERIC_ERROR_MESSAGE, HttpClient, RequestOptions};
use crate::socket::{SocketClient, Subscription};

pub const TWEETS_PATH: &str = "tweets";
/// Socket event carrying newly created tweets.
pub const TWEETS_EVENT: &str = "tweets";

/// Every call returns `Ok(None)` when the server answered 401; the session
/// has been torn down by then.
#[derive(Clone)]
pub struct TweetService {
	http: HttpClient,
	store: Arc<dyn CredentialStore>,
	socket: SocketClient,
}

impl TweetService {
	pub fn new(http: HttpClient, store: Arc<dyn CredentialStore>, socket: SocketClient) -> Self {
		Self { http, store, socket }
	}

	/// All tweets, or only `username`'s.
	pub async fn get_tweets(&self, username: Option<&str>) -> Result<Option<Vec<Tweet>>> {
		let path = match username {
			Some(username) => {
				let query: String = url::form_urlencoded::byte_serialize(username.as_bytes()).collect();
				format!("{TWEETS_PATH}?username={query}")
			}
			None => TWEETS_PATH.to_string(),
		};
		self.http.fetch(&path, self.authorized(RequestOptions::get())?).await?.decode()
	}

	pub async fn post_tweet(&self, text: &str) -> Result<Option<Tweet>> {
		let options = self.authorized(RequestOptions::post())?.json(&TweetText { text: text.to_string() })?;
		self.http.fetch(TWEETS_PATH, options).await?.decode()
	}

	pub async fn update_tweet(&self, id: &str, text: &str) -> Result<Option<Tweet>> {
		let options = self.authorized(RequestOptions::put())?.json(&TweetText { text: text.to_string() })?;
		self.http.fetch(&format!("{TWEETS_PATH}/{id}"), options).await?.decode()
	}

	/// `Ok(Some(()))` once the server confirmed the delete.
	pub async fn delete_tweet(&self, id: &str) -> Result<Option<()>> {
		let options = self.authorized(RequestOptions::delete())?;
		match self.http.fetch(&format!("{TWEETS_PATH}/{id}"), options).await? {
			FetchOutcome::Payload(_) => Ok(Some(())),
			FetchOutcome::NoValue => Ok(None),
			FetchOutcome::Status(status) => Err(Error::Request {
				status,
				message: GENERIC_ERROR_MESSAGE.to_string(),
			}),
		}
	}

	/// Invokes `handler` for every tweet pushed on the live feed. Connects the
	/// socket if needed.
	pub fn on_sync<F>(&self, mut handler: F) -> Subscription
	where
		F: FnMut(Tweet) + Send + 'static,
	{
		self.socket.on_event(TWEETS_EVENT, move |data| match serde_json::from_value::<Tweet>(data.clone()) {
			Ok(tweet) => handler(tweet),
			Err(err) => warn!(target = "dwitter.socket", error = %err, "skipping undecodable tweet"),
		})
	}

	fn authorized(&self, options: RequestOptions) -> Result<RequestOptions> {
		options.bearer(&self.store.load())
	}
}

impl std::fmt::Debug for TweetService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TweetService").field("base_url", &self.http.base_url().as_str()).finish()
	}
}
