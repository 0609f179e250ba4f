use anyhow::Result;
use dwitter::Session;
use dwitter_protocol::SignupRequest;
use serde_json::json;
use tracing::info;

use crate::cli::SignupArgs;
use crate::context::CommandContext;
use crate::output::print_success;

fn describe(session: &Session) -> String {
	match session.username() {
		Some(username) if session.is_authenticated() => format!("signed in as {username}"),
		_ => "not signed in".to_string(),
	}
}

pub async fn signup(name: &str, args: SignupArgs, ctx: &CommandContext) -> Result<()> {
	let request = SignupRequest {
		username: args.username,
		password: args.password,
		name: args.name,
		email: args.email,
		url: args.url,
	};
	let session = ctx.client.session().sign_up(&request).await?;
	info!(target = "dwit", path = %ctx.credentials_path().display(), "credentials stored");
	print_success(ctx.format, name, &session, || describe(&session));
	Ok(())
}

pub async fn login(name: &str, username: &str, password: &str, ctx: &CommandContext) -> Result<()> {
	let session = ctx.client.session().log_in(username, password).await?;
	info!(target = "dwit", path = %ctx.credentials_path().display(), "credentials stored");
	print_success(ctx.format, name, &session, || describe(&session));
	Ok(())
}

pub async fn logout(name: &str, ctx: &CommandContext) -> Result<()> {
	ctx.client.session().log_out().await?;
	print_success(ctx.format, name, &json!({ "authenticated": false }), || "signed out".to_string());
	Ok(())
}

pub async fn whoami(name: &str, ctx: &CommandContext) -> Result<()> {
	let session = ctx.client.session().resolve_session().await?;
	print_success(ctx.format, name, &session, || describe(&session));
	Ok(())
}
