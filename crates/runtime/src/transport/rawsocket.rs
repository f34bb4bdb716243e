//! RawSocket transport over plain TCP.
//!
//! After a 4-byte handshake every message is framed with a 4-byte header:
//! the frame type in the low three bits of the first byte and a 24-bit
//! big-endian payload length.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use url::Url;
use wick_protocol::Message;

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};
use crate::serializer::Serialization;

const MAGIC: u8 = 0x7F;
/// Largest message we accept: 2^(9 + 15) bytes.
const MAX_LENGTH_EXPONENT: u8 = 0x0F;
const MAX_FRAME_LEN: usize = 0x00FF_FFFF;

const FRAME_MESSAGE: u8 = 0;
const FRAME_PING: u8 = 1;
const FRAME_PONG: u8 = 2;

pub async fn connect(url: &Url, serialization: Serialization) -> Result<TransportParts> {
	let host = url.host_str().ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
	let port = url.port().ok_or_else(|| Error::InvalidUrl(format!("{url} (rawsocket needs an explicit port)")))?;

	let mut stream = TcpStream::connect((host, port)).await?;
	stream.write_all(&handshake_request(serialization)).await?;
	let mut reply = [0u8; 4];
	stream.read_exact(&mut reply).await?;
	let max_len = parse_handshake_reply(reply, serialization)?;
	debug!(target = "wick.runtime", %host, port, max_len, "rawsocket connected");

	let (reader, writer) = stream.into_split();
	let writer = Arc::new(Mutex::new(writer));
	let (message_tx, message_rx) = mpsc::unbounded_channel();

	Ok(TransportParts {
		sender: Box::new(RawSocketSender {
			writer: Arc::clone(&writer),
			serialization,
			max_len,
		}),
		receiver: Box::new(RawSocketReceiver {
			reader,
			writer,
			serialization,
			message_tx,
		}),
		message_rx,
	})
}

pub(crate) fn handshake_request(serialization: Serialization) -> [u8; 4] {
	[MAGIC, (MAX_LENGTH_EXPONENT << 4) | serialization.rawsocket_id(), 0, 0]
}

/// Validates the router's handshake reply and returns its maximum message length.
pub(crate) fn parse_handshake_reply(reply: [u8; 4], serialization: Serialization) -> Result<usize> {
	if reply[0] != MAGIC {
		return Err(Error::RawSocketHandshake(format!("unexpected magic byte {:#04x}", reply[0])));
	}
	let high = reply[1] >> 4;
	let low = reply[1] & 0x0F;
	if low == 0 {
		let reason = match high {
			1 => "serializer unsupported",
			2 => "maximum message length unacceptable",
			3 => "use of reserved bits",
			4 => "maximum connection count reached",
			_ => "unknown error",
		};
		return Err(Error::RawSocketHandshake(format!("router refused connection: {reason}")));
	}
	if low != serialization.rawsocket_id() {
		return Err(Error::RawSocketHandshake(format!(
			"router selected serializer {low}, requested {}",
			serialization.rawsocket_id()
		)));
	}
	Ok(1usize << (9 + high as usize))
}

pub(crate) fn frame_header(kind: u8, len: usize) -> Result<[u8; 4]> {
	if len > MAX_FRAME_LEN {
		return Err(Error::Protocol(format!("frame of {len} bytes exceeds rawsocket limit")));
	}
	Ok([kind, (len >> 16) as u8, (len >> 8) as u8, len as u8])
}

pub(crate) fn parse_frame_header(header: [u8; 4]) -> (u8, usize) {
	let len = ((header[1] as usize) << 16) | ((header[2] as usize) << 8) | header[3] as usize;
	(header[0] & 0x07, len)
}

async fn write_frame(writer: &Mutex<OwnedWriteHalf>, kind: u8, payload: &[u8]) -> Result<()> {
	let header = frame_header(kind, payload.len())?;
	let mut writer = writer.lock().await;
	writer.write_all(&header).await?;
	writer.write_all(payload).await?;
	Ok(())
}

struct RawSocketSender {
	writer: Arc<Mutex<OwnedWriteHalf>>,
	serialization: Serialization,
	max_len: usize,
}

impl Transport for RawSocketSender {
	fn send(&mut self, message: Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let bytes = self.serialization.encode(&message)?;
			if bytes.len() > self.max_len {
				return Err(Error::Protocol(format!(
					"message of {} bytes exceeds router limit of {}",
					bytes.len(),
					self.max_len
				)));
			}
			write_frame(&self.writer, FRAME_MESSAGE, &bytes).await
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.writer.lock().await.shutdown().await?;
			Ok(())
		})
	}
}

struct RawSocketReceiver {
	reader: OwnedReadHalf,
	writer: Arc<Mutex<OwnedWriteHalf>>,
	serialization: Serialization,
	message_tx: mpsc::UnboundedSender<Message>,
}

impl TransportReceiver for RawSocketReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			loop {
				let mut header = [0u8; 4];
				match self.reader.read_exact(&mut header).await {
					Ok(_) => {}
					Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
					Err(err) => return Err(err.into()),
				}
				let (kind, len) = parse_frame_header(header);
				let mut payload = vec![0u8; len];
				self.reader.read_exact(&mut payload).await?;

				match kind {
					FRAME_MESSAGE => match self.serialization.decode(&payload) {
						Ok(message) => {
							if self.message_tx.send(message).is_err() {
								break;
							}
						}
						Err(err) => warn!(target = "wick.runtime", error = %err, "dropping undecodable frame"),
					},
					FRAME_PING => write_frame(&self.writer, FRAME_PONG, &payload).await?,
					FRAME_PONG => {}
					other => return Err(Error::Protocol(format!("unknown rawsocket frame type {other}"))),
				}
			}
			debug!(target = "wick.runtime", "rawsocket receive loop ended");
			Ok(())
		})
	}
}
