//! WebSocket transport, negotiating the `wamp.2.*` subprotocol.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;
use wick_protocol::Message;

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};
use crate::serializer::Serialization;

const SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to `url` and offers the subprotocol matching `serialization`.
///
/// The router must accept exactly that subprotocol.
pub async fn connect(url: &Url, serialization: Serialization) -> Result<TransportParts> {
	let mut request = url.as_str().into_client_request()?;
	request
		.headers_mut()
		.insert(SUBPROTOCOL_HEADER, HeaderValue::from_static(serialization.subprotocol()));

	let (stream, response) = connect_async(request).await?;
	let accepted = response.headers().get(SUBPROTOCOL_HEADER).and_then(|value| value.to_str().ok());
	if accepted != Some(serialization.subprotocol()) {
		return Err(Error::Protocol(format!(
			"router accepted subprotocol {:?}, expected {}",
			accepted,
			serialization.subprotocol()
		)));
	}
	debug!(target = "wick.runtime", url = %url, subprotocol = serialization.subprotocol(), "websocket connected");

	let (sink, stream) = stream.split();
	let (message_tx, message_rx) = mpsc::unbounded_channel();

	Ok(TransportParts {
		sender: Box::new(WebSocketSender { sink, serialization }),
		receiver: Box::new(WebSocketReceiver {
			stream,
			serialization,
			message_tx,
		}),
		message_rx,
	})
}

struct WebSocketSender {
	sink: SplitSink<WsStream, WsMessage>,
	serialization: Serialization,
}

impl Transport for WebSocketSender {
	fn send(&mut self, message: Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let bytes = self.serialization.encode(&message)?;
			let frame = if self.serialization.is_binary() {
				WsMessage::Binary(bytes)
			} else {
				WsMessage::Text(String::from_utf8(bytes).map_err(|e| Error::Serialization(e.to_string()))?)
			};
			self.sink.send(frame).await?;
			Ok(())
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.sink.close().await?;
			Ok(())
		})
	}
}

struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
	serialization: Serialization,
	message_tx: mpsc::UnboundedSender<Message>,
}

impl TransportReceiver for WebSocketReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(frame) = self.stream.next().await {
				let decoded = match frame? {
					WsMessage::Text(text) => self.serialization.decode(text.as_bytes()),
					WsMessage::Binary(bytes) => self.serialization.decode(&bytes),
					WsMessage::Close(_) => break,
					_ => continue,
				};
				match decoded {
					Ok(message) => {
						if self.message_tx.send(message).is_err() {
							break;
						}
					}
					Err(err) => warn!(target = "wick.runtime", error = %err, "dropping undecodable frame"),
				}
			}
			debug!(target = "wick.runtime", "websocket receive loop ended");
			Ok(())
		})
	}
}
