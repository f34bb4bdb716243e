//! Transport layer between the session client and a router.
//!
//! A transport is split in two halves the way the session uses it:
//!
//! * [`Transport`]: the send half, owned by the session behind a lock
//! * [`TransportReceiver`]: the read loop, spawned once, forwarding decoded
//!   messages into an unbounded channel
//!
//! [`connect`] picks the implementation from the URL scheme.

#[cfg(test)]
pub(crate) mod fake;
pub mod rawsocket;
pub mod websocket;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use url::Url;
use wick_protocol::Message;

use crate::error::{Error, Result};
use crate::serializer::Serialization;

/// Send half of a connected transport.
pub trait Transport: Send {
	fn send(&mut self, message: Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

	/// Closes the underlying connection. Further sends fail.
	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Read loop of a connected transport.
///
/// `run` returns when the peer closes the connection or a read fails.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves of a transport plus the channel the receiver feeds.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Message>,
}

/// Opens a transport for `address` using `serialization`.
///
/// `ws://` and `wss://` use WebSocket, `tcp://` uses RawSocket. Secure
/// RawSocket (`tcps://`) and unix sockets are not supported.
pub async fn connect(address: &str, serialization: Serialization) -> Result<TransportParts> {
	let url = Url::parse(address).map_err(|_| Error::InvalidUrl(address.to_string()))?;
	match url.scheme() {
		"ws" | "wss" => websocket::connect(&url, serialization).await,
		"tcp" => rawsocket::connect(&url, serialization).await,
		other => Err(Error::UnsupportedTransport(other.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn rejects_unsupported_schemes() {
		let err = connect("tcps://localhost:8080", Serialization::Json).await.err();
		assert!(matches!(err, Some(Error::UnsupportedTransport(scheme)) if scheme == "tcps"));

		let err = connect("unix:///tmp/router.sock", Serialization::Json).await.err();
		assert!(matches!(err, Some(Error::UnsupportedTransport(scheme)) if scheme == "unix"));
	}

	#[tokio::test]
	async fn rejects_unparseable_urls() {
		let err = connect("not a url", Serialization::Json).await.err();
		assert!(matches!(err, Some(Error::InvalidUrl(_))));
	}
}
