use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use dwitter::{Client, ClientConfig, FileCredentialStore};
use tracing::debug;

use crate::cli::Cli;
use crate::output::OutputFormat;

/// Where credentials live when `--credentials` is not given.
pub fn default_credentials_path() -> PathBuf {
	dirs::config_dir()
		.unwrap_or_else(|| PathBuf::from("."))
		.join("dwitter")
		.join("credentials.json")
}

/// Everything a command needs, built once from the global flags.
pub struct CommandContext {
	pub client: Client,
	pub format: OutputFormat,
	credentials_path: PathBuf,
}

impl CommandContext {
	pub fn new(cli: &Cli) -> Result<Self> {
		let mut config = ClientConfig::new(&cli.base_url)?;
		if let Some(socket_url) = &cli.socket_url {
			config = config.with_socket_url(socket_url)?;
		}

		let credentials_path = cli.credentials.clone().unwrap_or_else(default_credentials_path);
		debug!(
			target = "dwit",
			base_url = %config.base_url,
			socket_url = %config.socket.url,
			credentials = %credentials_path.display(),
			"building client"
		);

		let store = Arc::new(FileCredentialStore::new(&credentials_path));
		let client = Client::new(config, store)?;
		Ok(Self {
			client,
			format: cli.format,
			credentials_path,
		})
	}

	pub fn credentials_path(&self) -> &Path {
		&self.credentials_path
	}
}
