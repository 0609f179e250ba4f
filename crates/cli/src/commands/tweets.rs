use anyhow::Result;
use dwitter::Error as ClientError;
use dwitter_protocol::Tweet;
use serde_json::json;

use crate::cli::TweetsAction;
use crate::context::CommandContext;
use crate::output::print_success;

pub(crate) fn render(tweet: &Tweet) -> String {
	format!("[{}] @{} ({}): {}", tweet.id, tweet.username, tweet.created_at, tweet.text)
}

/// A `None` result means the server rejected the stored token and the local
/// session has been cleared.
fn require<T>(value: Option<T>) -> Result<T> {
	value.ok_or_else(|| ClientError::Unauthenticated.into())
}

pub async fn run(name: &str, action: TweetsAction, ctx: &CommandContext) -> Result<()> {
	let tweets = ctx.client.tweets();
	match action {
		TweetsAction::List { username } => {
			let list = require(tweets.get_tweets(username.as_deref()).await?)?;
			print_success(ctx.format, name, &list, || {
				if list.is_empty() {
					"no tweets".to_string()
				} else {
					list.iter().map(render).collect::<Vec<_>>().join("\n")
				}
			});
		}
		TweetsAction::Post { text } => {
			let tweet = require(tweets.post_tweet(&text).await?)?;
			print_success(ctx.format, name, &tweet, || render(&tweet));
		}
		TweetsAction::Edit { id, text } => {
			let tweet = require(tweets.update_tweet(&id, &text).await?)?;
			print_success(ctx.format, name, &tweet, || render(&tweet));
		}
		TweetsAction::Delete { id } => {
			require(tweets.delete_tweet(&id).await?)?;
			print_success(ctx.format, name, &json!({ "id": id }), || format!("deleted {id}"));
		}
	}
	Ok(())
}
