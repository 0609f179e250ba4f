use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Parser, Debug)]
#[command(name = "dwit")]
#[command(about = "dwitter from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	/// Backend base URL
	#[arg(long, global = true, env = "DWITTER_BASE_URL", default_value = DEFAULT_BASE_URL)]
	pub base_url: String,

	/// Live socket URL (defaults to the base URL with a ws scheme)
	#[arg(long, global = true, env = "DWITTER_SOCKET_URL")]
	pub socket_url: Option<String>,

	/// Credentials file
	#[arg(long, global = true, env = "DWITTER_CREDENTIALS", value_name = "FILE")]
	pub credentials: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Create an account and sign in
	Signup(SignupArgs),

	/// Sign in with username and password
	Login {
		username: String,
		#[arg(long, env = "DWITTER_PASSWORD")]
		password: String,
	},

	/// Sign out and forget the stored credentials
	Logout,

	/// Show who the stored credentials belong to, refreshing them if expired
	Whoami,

	/// List, post, edit and delete tweets
	Tweets {
		#[command(subcommand)]
		action: TweetsAction,
	},

	/// Stream new tweets until interrupted
	Watch,
}

#[derive(Args, Debug)]
pub struct SignupArgs {
	pub username: String,
	#[arg(long, env = "DWITTER_PASSWORD")]
	pub password: String,
	#[arg(long)]
	pub name: String,
	#[arg(long)]
	pub email: String,
	/// Profile image URL
	#[arg(long)]
	pub url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TweetsAction {
	/// List tweets, optionally by one author
	#[command(alias = "ls")]
	List {
		#[arg(short, long)]
		username: Option<String>,
	},
	Post { text: String },
	Edit { id: String, text: String },
	#[command(alias = "rm")]
	Delete { id: String },
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Signup(_) => "signup",
			Commands::Login { .. } => "login",
			Commands::Logout => "logout",
			Commands::Whoami => "whoami",
			Commands::Tweets { action } => match action {
				TweetsAction::List { .. } => "tweets list",
				TweetsAction::Post { .. } => "tweets post",
				TweetsAction::Edit { .. } => "tweets edit",
				TweetsAction::Delete { .. } => "tweets delete",
			},
			Commands::Watch => "watch",
		}
	}
}
