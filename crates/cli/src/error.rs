use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Core(#[from] wick::Error),

	#[error(transparent)]
	Runtime(#[from] wick_runtime::Error),

	#[error("failed to read {}: {source}", path.display())]
	Config {
		path: PathBuf,
		#[source]
		source: config::ConfigError,
	},

	#[error("{0}")]
	Profile(String),
}

impl CliError {
	/// Whether the error was detected before any connection attempt.
	pub fn is_configuration(&self) -> bool {
		match self {
			Self::Core(err) => err.is_configuration(),
			Self::Runtime(wick_runtime::Error::UnknownSerializer(_)) | Self::Config { .. } | Self::Profile(_) => true,
			Self::Runtime(_) => false,
		}
	}
}

pub type Result<T> = std::result::Result<T, CliError>;
