//! Message serializers negotiated with the router.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use wick_protocol::Message;

use crate::error::{Error, Result};

/// Serialization format for WAMP messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Serialization {
	#[default]
	Json,
	MsgPack,
	Cbor,
}

impl Serialization {
	pub fn name(self) -> &'static str {
		match self {
			Self::Json => "json",
			Self::MsgPack => "msgpack",
			Self::Cbor => "cbor",
		}
	}

	/// WebSocket subprotocol announcing this serializer.
	pub fn subprotocol(self) -> &'static str {
		match self {
			Self::Json => "wamp.2.json",
			Self::MsgPack => "wamp.2.msgpack",
			Self::Cbor => "wamp.2.cbor",
		}
	}

	/// Serializer id used in the RawSocket handshake.
	pub fn rawsocket_id(self) -> u8 {
		match self {
			Self::Json => 1,
			Self::MsgPack => 2,
			Self::Cbor => 3,
		}
	}

	/// JSON travels in text frames, the binary formats in binary frames.
	pub fn is_binary(self) -> bool {
		!matches!(self, Self::Json)
	}

	pub fn encode(self, message: &Message) -> Result<Vec<u8>> {
		let value = message.to_value();
		match self {
			Self::Json => serde_json::to_vec(&value).map_err(|e| Error::Serialization(e.to_string())),
			Self::MsgPack => rmp_serde::to_vec(&value).map_err(|e| Error::Serialization(e.to_string())),
			Self::Cbor => {
				let mut buf = Vec::new();
				ciborium::into_writer(&value, &mut buf).map_err(|e| Error::Serialization(e.to_string()))?;
				Ok(buf)
			}
		}
	}

	pub fn decode(self, bytes: &[u8]) -> Result<Message> {
		let value: Value = match self {
			Self::Json => serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?,
			Self::MsgPack => rmp_serde::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?,
			Self::Cbor => ciborium::from_reader(bytes).map_err(|e| Error::Serialization(e.to_string()))?,
		};
		Ok(Message::from_value(value)?)
	}
}

impl fmt::Display for Serialization {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Serialization {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"json" => Ok(Self::Json),
			"msgpack" => Ok(Self::MsgPack),
			"cbor" => Ok(Self::Cbor),
			other => Err(Error::UnknownSerializer(other.to_string())),
		}
	}
}
