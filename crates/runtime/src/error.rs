use thiserror::Error;
use wick_protocol::{Dict, List, MessageError};

/// Errors raised by the session client and its transports.
#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid router url '{0}'")]
	InvalidUrl(String),

	#[error("unsupported transport scheme '{0}' (expected ws, wss or tcp)")]
	UnsupportedTransport(String),

	#[error("unknown serializer '{0}' (expected json, msgpack or cbor)")]
	UnknownSerializer(String),

	#[error("serialization failed: {0}")]
	Serialization(String),

	#[error("WebSocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("rawsocket handshake failed: {0}")]
	RawSocketHandshake(String),

	#[error("malformed message: {0}")]
	Message(#[from] MessageError),

	#[error("protocol violation: {0}")]
	Protocol(String),

	#[error("router aborted session: {reason}{}", message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default())]
	Aborted { reason: String, message: Option<String> },

	#[error("authentication failed: {0}")]
	Auth(String),

	#[error("handshake timed out")]
	HandshakeTimeout,

	#[error("router returned error {uri}")]
	Rejected { uri: String, args: List, kwargs: Dict },

	#[error("not subscribed to '{0}'")]
	NotSubscribed(String),

	#[error("procedure '{0}' is not registered")]
	NotRegistered(String),

	#[error("session closed")]
	SessionClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
