mod auth;
mod tweets;
mod watch;

use anyhow::Result;

use crate::cli::Commands;
use crate::context::CommandContext;

pub async fn dispatch(command: Commands, ctx: &CommandContext) -> Result<()> {
	let name = command.name();
	match command {
		Commands::Signup(args) => auth::signup(name, args, ctx).await,
		Commands::Login { username, password } => auth::login(name, &username, &password, ctx).await,
		Commands::Logout => auth::logout(name, ctx).await,
		Commands::Whoami => auth::whoami(name, ctx).await,
		Commands::Tweets { action } => tweets::run(name, action, ctx).await,
		Commands::Watch => watch::run(name, ctx).await,
	}
}
