//! The seam between wick's core and a WAMP session implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use wick_protocol::{AuthResponse, CallResult, Challenge, Dict, Event, Invocation, InvokeResult, List};

use crate::error::Result;
use crate::serializer::Serialization;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Answers an authentication challenge for one method.
pub type AuthHandler = Arc<dyn Fn(&Challenge) -> std::result::Result<AuthResponse, BoxError> + Send + Sync>;

/// Receives events for a subscription. Called on the session's dispatch task.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Answers invocations of a registered procedure. Each call runs on its own task.
pub type InvocationHandler = Arc<dyn Fn(Invocation) -> BoxFuture<'static, InvokeResult> + Send + Sync>;

/// Everything needed to open one session.
#[derive(Clone, Default)]
pub struct ClientConfig {
	pub realm: String,
	pub serialization: Serialization,
	/// Extra HELLO details (`authid`, `authrole`, `authextra`).
	pub hello_details: Dict,
	/// Challenge handlers keyed by auth method name; their keys become HELLO `authmethods`.
	pub auth_handlers: BTreeMap<String, AuthHandler>,
}

impl ClientConfig {
	pub fn new(realm: impl Into<String>, serialization: Serialization) -> Self {
		Self {
			realm: realm.into(),
			serialization,
			..Self::default()
		}
	}

	pub fn auth_methods(&self) -> Vec<String> {
		self.auth_handlers.keys().cloned().collect()
	}
}

impl fmt::Debug for ClientConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientConfig")
			.field("realm", &self.realm)
			.field("serialization", &self.serialization)
			.field("hello_details", &self.hello_details)
			.field("auth_methods", &self.auth_methods())
			.finish()
	}
}

/// An open WAMP session.
#[async_trait]
pub trait Session: Send + Sync {
	async fn subscribe(&self, topic: &str, options: Dict, handler: EventHandler) -> Result<()>;

	async fn unsubscribe(&self, topic: &str) -> Result<()>;

	/// Publishes one event. Waits for PUBLISHED when `options` asks for an acknowledgement.
	async fn publish(&self, topic: &str, options: Dict, args: List, kwargs: Dict) -> Result<()>;

	async fn register(&self, procedure: &str, options: Dict, handler: InvocationHandler) -> Result<()>;

	async fn unregister(&self, procedure: &str) -> Result<()>;

	async fn call(&self, procedure: &str, options: Dict, args: List, kwargs: Dict) -> Result<CallResult>;

	/// Resolves once the session is gone, whether the router or the transport ended it.
	fn done(&self) -> BoxFuture<'static, ()>;

	/// Waits until every invocation handed to a handler has been answered.
	async fn drain(&self);

	/// Leaves the realm and releases the transport. A no-op on a session that is already done.
	async fn close(&self) -> Result<()>;
}

/// Opens sessions.
#[async_trait]
pub trait Connector: Send + Sync {
	type Session: Session + 'static;

	async fn connect(&self, url: &str, config: ClientConfig) -> Result<Self::Session>;
}
