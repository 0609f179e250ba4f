use clap::Parser;
use dwitter_cli::{cli::Cli, commands, context::CommandContext, logging, output};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let command = cli.command.name();
	let format = cli.format;
	let result = match CommandContext::new(&cli) {
		Ok(ctx) => commands::dispatch(cli.command, &ctx).await,
		Err(err) => Err(err),
	};

	if let Err(err) = result {
		output::print_failure(format, command, &err);
		error!(target = "dwit", error = %err, "command failed");
		std::process::exit(1);
	}
}
