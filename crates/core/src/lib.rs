// dwitter: client session and live-sync layer for the dwitter backend.
//
// The HTTP executor, the live socket and the credential store fail
// independently; `SessionController` keeps them consistent.

pub mod auth_bus;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod session;
pub mod socket;
pub mod tweets;

pub use auth_bus::{AuthErrorBus, AuthFailure};
pub use client::Client;
pub use config::{ClientConfig, SocketConfig};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use error::{Error, Result};
pub use http::{FetchOutcome, HttpClient, RequestOptions};
pub use session::{Session, SessionController, TokenCell};
pub use socket::{ConnectionEvent, ConnectionState, DisconnectReason, SocketClient, Subscription};
pub use tweets::TweetService;

pub use dwitter_protocol as protocol;
