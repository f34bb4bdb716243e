//! Client-side WAMP v2 session.
//!
//! [`Client`] owns one transport. After the HELLO/WELCOME handshake a
//! dispatch task reads router messages and:
//!
//! - Correlates replies with pending requests through oneshot channels
//! - Hands events to subscription handlers inline
//! - Spawns one task per invocation and sends its YIELD
//! - Answers a router GOODBYE and marks the session done
//!
//! Request ids are sequential per session, starting at 1.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wick_protocol::{
	CLOSE_REALM, CallResult, Challenge, Dict, ERROR_CANNOT_AUTHENTICATE, ERROR_NO_SUCH_REGISTRATION, Event, GOODBYE_AND_OUT, INVOCATION, Id, Invocation, List,
	Message, client_roles, wants_acknowledge,
};

use crate::error::{Error, Result};
use crate::session::{ClientConfig, Connector, EventHandler, InvocationHandler, Session};
use crate::transport::{self, Transport, TransportParts};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const GOODBYE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens [`Client`] sessions over the transport named by the URL scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct WampConnector;

#[async_trait]
impl Connector for WampConnector {
	type Session = Client;

	async fn connect(&self, url: &str, config: ClientConfig) -> Result<Client> {
		let parts = transport::connect(url, config.serialization).await?;
		Client::establish(parts, config).await
	}
}

enum Pending {
	Reply(oneshot::Sender<Message>),
	Subscribe {
		topic: String,
		handler: EventHandler,
		reply: oneshot::Sender<Message>,
	},
	Register {
		procedure: String,
		handler: InvocationHandler,
		reply: oneshot::Sender<Message>,
	},
}

#[derive(Default)]
struct Routes {
	subscriptions: HashMap<Id, EventHandler>,
	topics: HashMap<String, Id>,
	registrations: HashMap<Id, InvocationHandler>,
	procedures: HashMap<String, Id>,
}

struct Shared {
	sender: tokio::sync::Mutex<Box<dyn Transport>>,
	last_id: AtomicU64,
	pending: Mutex<HashMap<Id, Pending>>,
	routes: Mutex<Routes>,
	inflight: AtomicUsize,
	idle: Notify,
	closing: AtomicBool,
	done_tx: watch::Sender<bool>,
}

/// An established WAMP session.
pub struct Client {
	session_id: Id,
	shared: Arc<Shared>,
	done_rx: watch::Receiver<bool>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
	/// Runs the opening handshake on `parts` and starts the dispatch task.
	pub async fn establish(parts: TransportParts, config: ClientConfig) -> Result<Self> {
		let TransportParts {
			mut sender,
			receiver,
			mut message_rx,
		} = parts;

		let reader = tokio::spawn(async move {
			if let Err(err) = receiver.run().await {
				warn!(target = "wick.runtime", error = %err, "transport read failed");
			}
		});

		let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(sender.as_mut(), &mut message_rx, &config)).await;
		let session_id = match handshake {
			Ok(Ok(session_id)) => session_id,
			Ok(Err(err)) => {
				reader.abort();
				let _ = sender.close().await;
				return Err(err);
			}
			Err(_) => {
				reader.abort();
				let _ = sender.close().await;
				return Err(Error::HandshakeTimeout);
			}
		};
		debug!(target = "wick.runtime", session = session_id, realm = %config.realm, "session established");

		let (done_tx, done_rx) = watch::channel(false);
		let shared = Arc::new(Shared {
			sender: tokio::sync::Mutex::new(sender),
			last_id: AtomicU64::new(0),
			pending: Mutex::new(HashMap::new()),
			routes: Mutex::new(Routes::default()),
			inflight: AtomicUsize::new(0),
			idle: Notify::new(),
			closing: AtomicBool::new(false),
			done_tx,
		});
		let dispatcher = tokio::spawn(dispatch_loop(Arc::clone(&shared), message_rx));

		Ok(Self {
			session_id,
			shared,
			done_rx,
			tasks: Mutex::new(vec![reader, dispatcher]),
		})
	}

	/// Session id assigned by the router in WELCOME.
	pub fn session_id(&self) -> Id {
		self.session_id
	}

	pub fn is_done(&self) -> bool {
		*self.done_rx.borrow()
	}

	fn next_id(&self) -> Id {
		self.shared.last_id.fetch_add(1, Ordering::SeqCst) + 1
	}

	/// Sends a request and waits for the router's reply. ERROR replies become [`Error::Rejected`].
	async fn request(
		&self,
		message_for: impl FnOnce(Id) -> Message + Send,
		pending_for: impl FnOnce(oneshot::Sender<Message>) -> Pending + Send,
	) -> Result<Message> {
		let id = self.next_id();
		let (tx, rx) = oneshot::channel();
		{
			// `end` clears this map under the same lock, so nothing is left waiting after it.
			let mut pending = self.shared.pending.lock();
			if *self.shared.done_tx.borrow() {
				return Err(Error::SessionClosed);
			}
			pending.insert(id, pending_for(tx));
		}

		if let Err(err) = self.shared.send(message_for(id)).await {
			self.shared.pending.lock().remove(&id);
			return Err(err);
		}

		match rx.await.map_err(|_| Error::SessionClosed)? {
			Message::Error { error, args, kwargs, .. } => Err(Error::Rejected { uri: error, args, kwargs }),
			reply => Ok(reply),
		}
	}
}

impl Drop for Client {
	fn drop(&mut self) {
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
	}
}

#[async_trait]
impl Session for Client {
	async fn subscribe(&self, topic: &str, options: Dict, handler: EventHandler) -> Result<()> {
		let reply = self
			.request(
				|request| Message::Subscribe {
					request,
					options,
					topic: topic.to_string(),
				},
				|reply| Pending::Subscribe {
					topic: topic.to_string(),
					handler,
					reply,
				},
			)
			.await?;
		match reply {
			Message::Subscribed { .. } => Ok(()),
			other => Err(unexpected(&other)),
		}
	}

	async fn unsubscribe(&self, topic: &str) -> Result<()> {
		let subscription = self
			.shared
			.routes
			.lock()
			.topics
			.get(topic)
			.copied()
			.ok_or_else(|| Error::NotSubscribed(topic.to_string()))?;

		match self.request(|request| Message::Unsubscribe { request, subscription }, Pending::Reply).await? {
			Message::Unsubscribed { .. } => {
				let mut routes = self.shared.routes.lock();
				routes.topics.remove(topic);
				routes.subscriptions.remove(&subscription);
				Ok(())
			}
			other => Err(unexpected(&other)),
		}
	}

	async fn publish(&self, topic: &str, options: Dict, args: List, kwargs: Dict) -> Result<()> {
		if !wants_acknowledge(&options) {
			if self.is_done() {
				return Err(Error::SessionClosed);
			}
			let request = self.next_id();
			return self
				.shared
				.send(Message::Publish {
					request,
					options,
					topic: topic.to_string(),
					args,
					kwargs,
				})
				.await;
		}

		let reply = self
			.request(
				|request| Message::Publish {
					request,
					options,
					topic: topic.to_string(),
					args,
					kwargs,
				},
				Pending::Reply,
			)
			.await?;
		match reply {
			Message::Published { .. } => Ok(()),
			other => Err(unexpected(&other)),
		}
	}

	async fn register(&self, procedure: &str, options: Dict, handler: InvocationHandler) -> Result<()> {
		let reply = self
			.request(
				|request| Message::Register {
					request,
					options,
					procedure: procedure.to_string(),
				},
				|reply| Pending::Register {
					procedure: procedure.to_string(),
					handler,
					reply,
				},
			)
			.await?;
		match reply {
			Message::Registered { .. } => Ok(()),
			other => Err(unexpected(&other)),
		}
	}

	async fn unregister(&self, procedure: &str) -> Result<()> {
		let registration = self
			.shared
			.routes
			.lock()
			.procedures
			.get(procedure)
			.copied()
			.ok_or_else(|| Error::NotRegistered(procedure.to_string()))?;

		match self.request(|request| Message::Unregister { request, registration }, Pending::Reply).await? {
			Message::Unregistered { .. } => {
				let mut routes = self.shared.routes.lock();
				routes.procedures.remove(procedure);
				routes.registrations.remove(&registration);
				Ok(())
			}
			other => Err(unexpected(&other)),
		}
	}

	async fn call(&self, procedure: &str, options: Dict, args: List, kwargs: Dict) -> Result<CallResult> {
		let reply = self
			.request(
				|request| Message::Call {
					request,
					options,
					procedure: procedure.to_string(),
					args,
					kwargs,
				},
				Pending::Reply,
			)
			.await?;
		match reply {
			Message::Result { details, args, kwargs, .. } => Ok(CallResult { details, args, kwargs }),
			other => Err(unexpected(&other)),
		}
	}

	fn done(&self) -> BoxFuture<'static, ()> {
		let mut done_rx = self.done_rx.clone();
		Box::pin(async move {
			let _ = done_rx.wait_for(|done| *done).await;
		})
	}

	async fn drain(&self) {
		loop {
			let notified = self.shared.idle.notified();
			if self.shared.inflight.load(Ordering::SeqCst) == 0 {
				return;
			}
			notified.await;
		}
	}

	async fn close(&self) -> Result<()> {
		if self.shared.closing.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		if !self.is_done() {
			let goodbye = Message::Goodbye {
				details: Dict::new(),
				reason: CLOSE_REALM.to_string(),
			};
			match self.shared.send(goodbye).await {
				Ok(()) => {
					if tokio::time::timeout(GOODBYE_TIMEOUT, self.done()).await.is_err() {
						warn!(target = "wick.runtime", "router did not answer GOODBYE");
					}
				}
				Err(err) => debug!(target = "wick.runtime", error = %err, "could not send GOODBYE"),
			}
		}

		if let Err(err) = self.shared.sender.lock().await.close().await {
			debug!(target = "wick.runtime", error = %err, "transport close failed");
		}
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
		self.shared.end();
		debug!(target = "wick.runtime", session = self.session_id, "session closed");
		Ok(())
	}
}

impl Shared {
	/// Marks the session done and fails every request still waiting for a reply.
	fn end(&self) {
		let mut pending = self.pending.lock();
		pending.clear();
		self.done_tx.send_replace(true);
	}

	async fn send(&self, message: Message) -> Result<()> {
		self.sender.lock().await.send(message).await
	}

	fn resolve(&self, reply: Message) {
		let Some(request) = reply.reply_to() else {
			return;
		};
		let Some(pending) = self.pending.lock().remove(&request) else {
			warn!(target = "wick.runtime", request, code = reply.code(), "reply for unknown request");
			return;
		};

		match pending {
			Pending::Reply(tx) => {
				let _ = tx.send(reply);
			}
			Pending::Subscribe { topic, handler, reply: tx } => {
				if let Message::Subscribed { subscription, .. } = &reply {
					let mut routes = self.routes.lock();
					routes.subscriptions.insert(*subscription, handler);
					routes.topics.insert(topic, *subscription);
				}
				let _ = tx.send(reply);
			}
			Pending::Register { procedure, handler, reply: tx } => {
				if let Message::Registered { registration, .. } = &reply {
					let mut routes = self.routes.lock();
					routes.registrations.insert(*registration, handler);
					routes.procedures.insert(procedure, *registration);
				}
				let _ = tx.send(reply);
			}
		}
	}

	fn deliver(&self, event: Event) {
		let handler = self.routes.lock().subscriptions.get(&event.subscription).cloned();
		match handler {
			Some(handler) => handler(event),
			None => debug!(target = "wick.runtime", subscription = event.subscription, "event for unknown subscription"),
		}
	}

	async fn invoke(self: &Arc<Self>, invocation: Invocation) {
		let handler = self.routes.lock().registrations.get(&invocation.registration).cloned();
		let Some(handler) = handler else {
			let reply = Message::Error {
				request_type: INVOCATION,
				request: invocation.request,
				details: Dict::new(),
				error: ERROR_NO_SUCH_REGISTRATION.to_string(),
				args: List::new(),
				kwargs: Dict::new(),
			};
			if let Err(err) = self.send(reply).await {
				warn!(target = "wick.runtime", error = %err, "failed to reject invocation");
			}
			return;
		};

		self.inflight.fetch_add(1, Ordering::SeqCst);
		let shared = Arc::clone(self);
		tokio::spawn(async move {
			let request = invocation.request;
			let result = handler(invocation).await;
			let reply = Message::Yield {
				request,
				options: Dict::new(),
				args: result.args,
				kwargs: result.kwargs,
			};
			if let Err(err) = shared.send(reply).await {
				warn!(target = "wick.runtime", request, error = %err, "failed to send YIELD");
			}
			if shared.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
				shared.idle.notify_waiters();
			}
		});
	}
}

async fn handshake(sender: &mut dyn Transport, message_rx: &mut mpsc::UnboundedReceiver<Message>, config: &ClientConfig) -> Result<Id> {
	let mut details = config.hello_details.clone();
	details.insert("roles".to_string(), Value::Object(client_roles()));
	if !config.auth_handlers.is_empty() {
		details.insert("authmethods".to_string(), json!(config.auth_methods()));
	}
	sender
		.send(Message::Hello {
			realm: config.realm.clone(),
			details,
		})
		.await?;

	while let Some(message) = message_rx.recv().await {
		match message {
			Message::Welcome { session, .. } => return Ok(session),
			Message::Abort { details, reason } => {
				let message = details.get("message").and_then(Value::as_str).map(str::to_string);
				return Err(Error::Aborted { reason, message });
			}
			Message::Challenge { method, extra } => {
				let challenge = Challenge::new(method, extra);
				debug!(target = "wick.runtime", method = %challenge.method, "received challenge");
				let Some(handler) = config.auth_handlers.get(&challenge.method) else {
					abort(sender, ERROR_CANNOT_AUTHENTICATE).await;
					return Err(Error::Auth(format!("router requested unsupported auth method '{}'", challenge.method)));
				};
				let response = match handler(&challenge) {
					Ok(response) => response,
					Err(err) => {
						let reason = err.to_string();
						abort(sender, ERROR_CANNOT_AUTHENTICATE).await;
						return Err(Error::Auth(reason));
					}
				};
				sender
					.send(Message::Authenticate {
						signature: response.signature,
						extra: response.extra,
					})
					.await?;
			}
			other => return Err(Error::Protocol(format!("unexpected message type {} during handshake", other.code()))),
		}
	}
	Err(Error::SessionClosed)
}

async fn abort(sender: &mut dyn Transport, reason: &str) {
	let abort = Message::Abort {
		details: Dict::new(),
		reason: reason.to_string(),
	};
	if let Err(err) = sender.send(abort).await {
		debug!(target = "wick.runtime", error = %err, "could not send ABORT");
	}
}

async fn dispatch_loop(shared: Arc<Shared>, mut message_rx: mpsc::UnboundedReceiver<Message>) {
	while let Some(message) = message_rx.recv().await {
		match message {
			Message::Event {
				subscription,
				publication,
				details,
				args,
				kwargs,
			} => shared.deliver(Event {
				subscription,
				publication,
				details,
				args,
				kwargs,
			}),
			Message::Invocation {
				request,
				registration,
				details,
				args,
				kwargs,
			} => {
				shared
					.invoke(Invocation {
						request,
						registration,
						details,
						args,
						kwargs,
					})
					.await
			}
			Message::Goodbye { reason, .. } => {
				if !shared.closing.load(Ordering::SeqCst) {
					debug!(target = "wick.runtime", %reason, "router closed the session");
					let reply = Message::Goodbye {
						details: Dict::new(),
						reason: GOODBYE_AND_OUT.to_string(),
					};
					if let Err(err) = shared.send(reply).await {
						debug!(target = "wick.runtime", error = %err, "could not answer GOODBYE");
					}
				}
				break;
			}
			Message::Abort { reason, .. } => {
				warn!(target = "wick.runtime", %reason, "router aborted the session");
				break;
			}
			reply if reply.reply_to().is_some() => shared.resolve(reply),
			other => warn!(target = "wick.runtime", code = other.code(), "ignoring unexpected message"),
		}
	}

	shared.end();
	debug!(target = "wick.runtime", "dispatch loop ended");
}

fn unexpected(message: &Message) -> Error {
	Error::Protocol(format!("unexpected reply type {}", message.code()))
}
