//! WAMP message enum and its positional list encoding.
//!
//! On the wire every message is `[code, field, field, ...]`. Arguments and
//! keyword arguments are trailing and optional: an empty kwargs dictionary
//! is omitted, and args are omitted too when both are empty.

use serde_json::Value;
use thiserror::Error;

use crate::types::{Dict, Id, List};

pub const HELLO: u64 = 1;
pub const WELCOME: u64 = 2;
pub const ABORT: u64 = 3;
pub const CHALLENGE: u64 = 4;
pub const AUTHENTICATE: u64 = 5;
pub const GOODBYE: u64 = 6;
pub const ERROR: u64 = 8;
pub const PUBLISH: u64 = 16;
pub const PUBLISHED: u64 = 17;
pub const SUBSCRIBE: u64 = 32;
pub const SUBSCRIBED: u64 = 33;
pub const UNSUBSCRIBE: u64 = 34;
pub const UNSUBSCRIBED: u64 = 35;
pub const EVENT: u64 = 36;
pub const CALL: u64 = 48;
pub const RESULT: u64 = 50;
pub const REGISTER: u64 = 64;
pub const REGISTERED: u64 = 65;
pub const UNREGISTER: u64 = 66;
pub const UNREGISTERED: u64 = 67;
pub const INVOCATION: u64 = 68;
pub const YIELD: u64 = 70;

/// Failure to interpret a decoded value as a WAMP message.
#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
	#[error("message is not a list")]
	NotAList,
	#[error("message is empty")]
	Empty,
	#[error("unknown message type {0}")]
	UnknownType(u64),
	#[error("message type {code}: field {index} missing or not {expected}")]
	Field { code: u64, index: usize, expected: &'static str },
}

/// Client-side WAMP v2 messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	Hello { realm: String, details: Dict },
	Welcome { session: Id, details: Dict },
	Abort { details: Dict, reason: String },
	Challenge { method: String, extra: Dict },
	Authenticate { signature: String, extra: Dict },
	Goodbye { details: Dict, reason: String },
	Error { request_type: u64, request: Id, details: Dict, error: String, args: List, kwargs: Dict },
	Publish { request: Id, options: Dict, topic: String, args: List, kwargs: Dict },
	Published { request: Id, publication: Id },
	Subscribe { request: Id, options: Dict, topic: String },
	Subscribed { request: Id, subscription: Id },
	Unsubscribe { request: Id, subscription: Id },
	Unsubscribed { request: Id },
	Event { subscription: Id, publication: Id, details: Dict, args: List, kwargs: Dict },
	Call { request: Id, options: Dict, procedure: String, args: List, kwargs: Dict },
	Result { request: Id, details: Dict, args: List, kwargs: Dict },
	Register { request: Id, options: Dict, procedure: String },
	Registered { request: Id, registration: Id },
	Unregister { request: Id, registration: Id },
	Unregistered { request: Id },
	Invocation { request: Id, registration: Id, details: Dict, args: List, kwargs: Dict },
	Yield { request: Id, options: Dict, args: List, kwargs: Dict },
}

impl Message {
	/// Numeric type code of this message.
	pub fn code(&self) -> u64 {
		match self {
			Self::Hello { .. } => HELLO,
			Self::Welcome { .. } => WELCOME,
			Self::Abort { .. } => ABORT,
			Self::Challenge { .. } => CHALLENGE,
			Self::Authenticate { .. } => AUTHENTICATE,
			Self::Goodbye { .. } => GOODBYE,
			Self::Error { .. } => ERROR,
			Self::Publish { .. } => PUBLISH,
			Self::Published { .. } => PUBLISHED,
			Self::Subscribe { .. } => SUBSCRIBE,
			Self::Subscribed { .. } => SUBSCRIBED,
			Self::Unsubscribe { .. } => UNSUBSCRIBE,
			Self::Unsubscribed { .. } => UNSUBSCRIBED,
			Self::Event { .. } => EVENT,
			Self::Call { .. } => CALL,
			Self::Result { .. } => RESULT,
			Self::Register { .. } => REGISTER,
			Self::Registered { .. } => REGISTERED,
			Self::Unregister { .. } => UNREGISTER,
			Self::Unregistered { .. } => UNREGISTERED,
			Self::Invocation { .. } => INVOCATION,
			Self::Yield { .. } => YIELD,
		}
	}

	/// Request id a router reply correlates to, if this message is a reply.
	pub fn reply_to(&self) -> Option<Id> {
		match self {
			Self::Error { request, .. }
			| Self::Published { request, .. }
			| Self::Subscribed { request, .. }
			| Self::Unsubscribed { request }
			| Self::Result { request, .. }
			| Self::Registered { request, .. }
			| Self::Unregistered { request } => Some(*request),
			_ => None,
		}
	}

	/// Encodes the message into its positional list form.
	pub fn to_value(&self) -> Value {
		let code = Value::from(self.code());
		let items: Vec<Value> = match self {
			Self::Hello { realm, details } => vec![code, realm.as_str().into(), details.clone().into()],
			Self::Welcome { session, details } => vec![code, (*session).into(), details.clone().into()],
			Self::Abort { details, reason } | Self::Goodbye { details, reason } => vec![code, details.clone().into(), reason.as_str().into()],
			Self::Challenge { method, extra } => vec![code, method.as_str().into(), extra.clone().into()],
			Self::Authenticate { signature, extra } => vec![code, signature.as_str().into(), extra.clone().into()],
			Self::Error {
				request_type,
				request,
				details,
				error,
				args,
				kwargs,
			} => with_payload(
				vec![code, (*request_type).into(), (*request).into(), details.clone().into(), error.as_str().into()],
				args,
				kwargs,
			),
			Self::Publish {
				request,
				options,
				topic,
				args,
				kwargs,
			} => with_payload(vec![code, (*request).into(), options.clone().into(), topic.as_str().into()], args, kwargs),
			Self::Published { request, publication } => vec![code, (*request).into(), (*publication).into()],
			Self::Subscribe { request, options, topic } => vec![code, (*request).into(), options.clone().into(), topic.as_str().into()],
			Self::Subscribed { request, subscription } | Self::Unsubscribe { request, subscription } => {
				vec![code, (*request).into(), (*subscription).into()]
			}
			Self::Unsubscribed { request } | Self::Unregistered { request } => vec![code, (*request).into()],
			Self::Event {
				subscription,
				publication,
				details,
				args,
				kwargs,
			} => with_payload(vec![code, (*subscription).into(), (*publication).into(), details.clone().into()], args, kwargs),
			Self::Call {
				request,
				options,
				procedure,
				args,
				kwargs,
			} => with_payload(vec![code, (*request).into(), options.clone().into(), procedure.as_str().into()], args, kwargs),
			Self::Result { request, details, args, kwargs } => with_payload(vec![code, (*request).into(), details.clone().into()], args, kwargs),
			Self::Register { request, options, procedure } => vec![code, (*request).into(), options.clone().into(), procedure.as_str().into()],
			Self::Registered { request, registration } | Self::Unregister { request, registration } => {
				vec![code, (*request).into(), (*registration).into()]
			}
			Self::Invocation {
				request,
				registration,
				details,
				args,
				kwargs,
			} => with_payload(vec![code, (*request).into(), (*registration).into(), details.clone().into()], args, kwargs),
			Self::Yield { request, options, args, kwargs } => with_payload(vec![code, (*request).into(), options.clone().into()], args, kwargs),
		};
		Value::Array(items)
	}

	/// Decodes a positional list into a message.
	pub fn from_value(value: Value) -> Result<Self, MessageError> {
		let Value::Array(items) = value else {
			return Err(MessageError::NotAList);
		};
		let code = items.first().ok_or(MessageError::Empty)?.as_u64().ok_or(MessageError::Field {
			code: 0,
			index: 0,
			expected: "an integer type code",
		})?;
		let f = Fields { code, items: &items };

		let message = match code {
			HELLO => Self::Hello {
				realm: f.string(1)?,
				details: f.dict(2)?,
			},
			WELCOME => Self::Welcome {
				session: f.id(1)?,
				details: f.dict(2)?,
			},
			ABORT => Self::Abort {
				details: f.dict(1)?,
				reason: f.string(2)?,
			},
			CHALLENGE => Self::Challenge {
				method: f.string(1)?,
				extra: f.dict(2)?,
			},
			AUTHENTICATE => Self::Authenticate {
				signature: f.string(1)?,
				extra: f.dict(2)?,
			},
			GOODBYE => Self::Goodbye {
				details: f.dict(1)?,
				reason: f.string(2)?,
			},
			ERROR => Self::Error {
				request_type: f.id(1)?,
				request: f.id(2)?,
				details: f.dict(3)?,
				error: f.string(4)?,
				args: f.args(5)?,
				kwargs: f.kwargs(6)?,
			},
			PUBLISH => Self::Publish {
				request: f.id(1)?,
				options: f.dict(2)?,
				topic: f.string(3)?,
				args: f.args(4)?,
				kwargs: f.kwargs(5)?,
			},
			PUBLISHED => Self::Published {
				request: f.id(1)?,
				publication: f.id(2)?,
			},
			SUBSCRIBE => Self::Subscribe {
				request: f.id(1)?,
				options: f.dict(2)?,
				topic: f.string(3)?,
			},
			SUBSCRIBED => Self::Subscribed {
				request: f.id(1)?,
				subscription: f.id(2)?,
			},
			UNSUBSCRIBE => Self::Unsubscribe {
				request: f.id(1)?,
				subscription: f.id(2)?,
			},
			UNSUBSCRIBED => Self::Unsubscribed { request: f.id(1)? },
			EVENT => Self::Event {
				subscription: f.id(1)?,
				publication: f.id(2)?,
				details: f.dict(3)?,
				args: f.args(4)?,
				kwargs: f.kwargs(5)?,
			},
			CALL => Self::Call {
				request: f.id(1)?,
				options: f.dict(2)?,
				procedure: f.string(3)?,
				args: f.args(4)?,
				kwargs: f.kwargs(5)?,
			},
			RESULT => Self::Result {
				request: f.id(1)?,
				details: f.dict(2)?,
				args: f.args(3)?,
				kwargs: f.kwargs(4)?,
			},
			REGISTER => Self::Register {
				request: f.id(1)?,
				options: f.dict(2)?,
				procedure: f.string(3)?,
			},
			REGISTERED => Self::Registered {
				request: f.id(1)?,
				registration: f.id(2)?,
			},
			UNREGISTER => Self::Unregister {
				request: f.id(1)?,
				registration: f.id(2)?,
			},
			UNREGISTERED => Self::Unregistered { request: f.id(1)? },
			INVOCATION => Self::Invocation {
				request: f.id(1)?,
				registration: f.id(2)?,
				details: f.dict(3)?,
				args: f.args(4)?,
				kwargs: f.kwargs(5)?,
			},
			YIELD => Self::Yield {
				request: f.id(1)?,
				options: f.dict(2)?,
				args: f.args(3)?,
				kwargs: f.kwargs(4)?,
			},
			other => return Err(MessageError::UnknownType(other)),
		};
		Ok(message)
	}
}

fn with_payload(mut items: Vec<Value>, args: &List, kwargs: &Dict) -> Vec<Value> {
	if !args.is_empty() || !kwargs.is_empty() {
		items.push(Value::Array(args.clone()));
	}
	if !kwargs.is_empty() {
		items.push(Value::Object(kwargs.clone()));
	}
	items
}

struct Fields<'a> {
	code: u64,
	items: &'a [Value],
}

impl Fields<'_> {
	fn missing(&self, index: usize, expected: &'static str) -> MessageError {
		MessageError::Field {
			code: self.code,
			index,
			expected,
		}
	}

	fn id(&self, index: usize) -> Result<Id, MessageError> {
		self.items.get(index).and_then(Value::as_u64).ok_or_else(|| self.missing(index, "an id"))
	}

	fn string(&self, index: usize) -> Result<String, MessageError> {
		self.items
			.get(index)
			.and_then(Value::as_str)
			.map(str::to_string)
			.ok_or_else(|| self.missing(index, "a string"))
	}

	fn dict(&self, index: usize) -> Result<Dict, MessageError> {
		self.items
			.get(index)
			.and_then(Value::as_object)
			.cloned()
			.ok_or_else(|| self.missing(index, "a dictionary"))
	}

	fn args(&self, index: usize) -> Result<List, MessageError> {
		match self.items.get(index) {
			None => Ok(List::new()),
			Some(Value::Array(list)) => Ok(list.clone()),
			Some(_) => Err(self.missing(index, "a list")),
		}
	}

	fn kwargs(&self, index: usize) -> Result<Dict, MessageError> {
		match self.items.get(index) {
			None => Ok(Dict::new()),
			Some(Value::Object(dict)) => Ok(dict.clone()),
			Some(_) => Err(self.missing(index, "a dictionary")),
		}
	}
}
