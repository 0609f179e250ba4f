use anyhow::{Result, anyhow};
use dwitter::socket::ConnectionEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::tweets::render;
use crate::context::CommandContext;
use crate::output::{OutputFormat, print_success};

/// Prints tweets from the live feed until ctrl-c or until the connection
/// gives up.
pub async fn run(name: &str, ctx: &CommandContext) -> Result<()> {
	let socket = ctx.client.socket();
	let mut events = socket.events();

	let format = ctx.format;
	let command = name.to_string();
	let subscription = ctx.client.tweets().on_sync(move |tweet| {
		print_success(format, &command, &tweet, || render(&tweet));
	});
	if format == OutputFormat::Text {
		eprintln!("watching {} (ctrl-c to stop)", socket.config().url);
	}

	let outcome = loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => break Ok(()),
			event = events.recv() => match event {
				Ok(ConnectionEvent::Connected) => info!(target = "dwit", "live feed connected"),
				Ok(ConnectionEvent::Disconnected { reason }) => warn!(target = "dwit", %reason, "live feed dropped"),
				Ok(ConnectionEvent::ConnectError(err)) if err.kind.suppresses_retry() => {
					break Err(anyhow!("live feed refused: {}", err.message));
				}
				Ok(ConnectionEvent::RetriesExhausted { attempts }) => {
					break Err(anyhow!("live feed unavailable after {attempts} retries"));
				}
				Ok(_) => {}
				Err(RecvError::Lagged(skipped)) => warn!(target = "dwit", skipped, "missed connection events"),
				Err(RecvError::Closed) => break Err(anyhow!("connection manager stopped")),
			},
		}
	};

	subscription.unsubscribe();
	socket.disconnect();
	outcome
}
