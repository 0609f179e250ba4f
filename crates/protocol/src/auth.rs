//! Request and response bodies for the `auth/*` routes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignupRequest {
	pub username: String,
	pub password: String,
	pub name: String,
	pub email: String,
	/// Profile image URL.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
}

/// Body of `POST auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
	pub username: String,
	pub password: String,
}

/// Session payload returned by signup, login, `auth/me` and `auth/refresh`.
///
/// The server names the bearer token `accessToken` on signup/login and
/// `token` on the probe; both spellings are accepted. Fields the client
/// does not interpret are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
	#[serde(default, alias = "token", skip_serializing_if = "Option::is_none")]
	pub access_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Error body the server attaches to non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
	pub message: String,
}
