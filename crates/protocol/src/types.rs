//! Payload types handed between the session client and its handlers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Session-scoped or global identifier (request ids, subscription ids, ...).
pub type Id = u64;

/// Keyword arguments, option and detail dictionaries.
pub type Dict = Map<String, Value>;

/// Positional arguments.
pub type List = Vec<Value>;

/// Authentication challenge sent by the router during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
	/// Authentication method the router selected (`ticket`, `wampcra`, `cryptosign`).
	pub method: String,
	#[serde(default)]
	pub extra: Dict,
}

impl Challenge {
	pub fn new(method: impl Into<String>, extra: Dict) -> Self {
		Self { method: method.into(), extra }
	}

	/// String value of `key` in the challenge extras.
	pub fn extra_str(&self, key: &str) -> Option<&str> {
		self.extra.get(key).and_then(Value::as_str)
	}

	/// Integer value of `key` in the challenge extras.
	///
	/// Routers serialize counts as either integers or integral floats,
	/// both are accepted.
	pub fn extra_u64(&self, key: &str) -> Option<u64> {
		let value = self.extra.get(key)?;
		value.as_u64().or_else(|| value.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
	}
}

/// Answer to a [`Challenge`], sent back as AUTHENTICATE.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
	pub signature: String,
	#[serde(default)]
	pub extra: Dict,
}

impl AuthResponse {
	pub fn new(signature: impl Into<String>) -> Self {
		Self {
			signature: signature.into(),
			extra: Dict::new(),
		}
	}
}

/// A published event delivered to a subscriber.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
	pub subscription: Id,
	pub publication: Id,
	pub details: Dict,
	pub args: List,
	pub kwargs: Dict,
}

/// A call routed to a registered procedure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
	pub request: Id,
	pub registration: Id,
	pub details: Dict,
	pub args: List,
	pub kwargs: Dict,
}

/// Outcome of a successful CALL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallResult {
	pub details: Dict,
	pub args: List,
	pub kwargs: Dict,
}

/// What a callee hands back for an [`Invocation`]; sent as YIELD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeResult {
	pub args: List,
	pub kwargs: Dict,
}

impl InvokeResult {
	/// Result carrying a single positional value.
	pub fn single(value: impl Into<Value>) -> Self {
		Self {
			args: vec![value.into()],
			kwargs: Dict::new(),
		}
	}
}
