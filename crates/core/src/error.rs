use thiserror::Error;

/// Error type for wick core operations.
#[derive(Debug, Error)]
pub enum Error {
	#[error("ambiguous credentials: {0} supplied, at most one of private key, ticket or secret is allowed")]
	AmbiguousCredentials(String),

	#[error("invalid private key hex: {0}")]
	InvalidPrivateKeyHex(#[from] hex::FromHexError),

	#[error("invalid private key length: expected 32 or 64 bytes, got {0}")]
	InvalidPrivateKeyLength(usize),

	#[error("failed to connect to {address}: {source}")]
	Connect {
		address: String,
		#[source]
		source: wick_runtime::Error,
	},

	#[error("subscribe to '{topic}' failed: {source}")]
	Subscribe {
		topic: String,
		#[source]
		source: wick_runtime::Error,
	},

	#[error("register '{procedure}' failed: {source}")]
	Register {
		procedure: String,
		#[source]
		source: wick_runtime::Error,
	},

	#[error("publish to '{topic}' failed: {source}")]
	Publish {
		topic: String,
		#[source]
		source: wick_runtime::Error,
	},

	#[error("failed to write output: {0}")]
	Output(#[from] std::io::Error),
}

impl Error {
	/// Configuration errors are detected before any network activity.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			Self::AmbiguousCredentials(_) | Self::InvalidPrivateKeyHex(_) | Self::InvalidPrivateKeyLength(_)
		)
	}
}

pub type Result<T> = std::result::Result<T, Error>;
