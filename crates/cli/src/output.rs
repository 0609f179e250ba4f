use clap::ValueEnum;
use dwitter::Error as ClientError;
use serde::Serialize;

/// Output format for command results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON envelope, one per command (one per line for `watch`)
	Json,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"text" => Ok(OutputFormat::Text),
			"json" => Ok(OutputFormat::Json),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// The result envelope printed by every command in JSON mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	AuthError,
	RequestFailed,
	NetworkError,
	InvalidInput,
	IoError,
	InternalError,
}

impl ErrorCode {
	pub fn for_error(err: &anyhow::Error) -> Self {
		match err.downcast_ref::<ClientError>() {
			Some(ClientError::Unauthenticated | ClientError::InvalidSession(_)) => ErrorCode::AuthError,
			Some(ClientError::Request { .. }) => ErrorCode::RequestFailed,
			Some(ClientError::Http(_)) => ErrorCode::NetworkError,
			Some(ClientError::InvalidUrl(_) | ClientError::Config(_) | ClientError::InvalidHeader(_)) => ErrorCode::InvalidInput,
			Some(ClientError::Io(_)) => ErrorCode::IoError,
			Some(ClientError::Json(_)) | None => ErrorCode::InternalError,
		}
	}
}

impl<T: Serialize> CommandResult<T> {
	pub fn success(command: &str, data: T) -> Self {
		Self {
			ok: true,
			command: command.to_string(),
			data: Some(data),
			error: None,
		}
	}
}

impl CommandResult<()> {
	pub fn failure(command: &str, err: &anyhow::Error) -> Self {
		Self {
			ok: false,
			command: command.to_string(),
			data: None,
			error: Some(CommandError {
				code: ErrorCode::for_error(err),
				message: err.to_string(),
			}),
		}
	}
}

/// Prints `data` as an envelope in JSON mode, `text` otherwise.
pub fn print_success<T: Serialize>(format: OutputFormat, command: &str, data: &T, text: impl FnOnce() -> String) {
	match format {
		OutputFormat::Json => print_json(&CommandResult::success(command, data)),
		OutputFormat::Text => println!("{}", text()),
	}
}

/// JSON mode reports failures on stdout too; text mode leaves them to the log.
pub fn print_failure(format: OutputFormat, command: &str, err: &anyhow::Error) {
	if format == OutputFormat::Json {
		print_json(&CommandResult::failure(command, err));
	}
}

fn print_json<T: Serialize>(value: &T) {
	match serde_json::to_string(value) {
		Ok(line) => println!("{line}"),
		Err(err) => eprintln!("failed to serialize output: {err}"),
	}
}
