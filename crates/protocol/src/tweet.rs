//! Tweet resources served under `tweets`.

use serde::{Deserialize, Serialize};

/// A tweet as returned by the list/create/update routes and pushed on the
/// live `tweets` socket event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
	pub id: String,
	pub text: String,
	pub created_at: String,
	pub name: String,
	pub username: String,
	/// Author profile image URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
}

/// Body of `POST tweets` and `PUT tweets/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TweetText {
	pub text: String,
}
