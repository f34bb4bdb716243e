//! In-memory session used by the core tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot, watch};
use wick_protocol::{CallResult, Dict, Event, Invocation, InvokeResult, List};
use wick_runtime::{ClientConfig, Connector, Error, EventHandler, InvocationHandler, Result, Session};

use crate::lifecycle::Interrupt;

/// One call made against a [`FakeSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
	Subscribe { topic: String, options: Dict },
	Unsubscribe(String),
	Publish { topic: String, options: Dict, args: List, kwargs: Dict },
	Register { procedure: String, options: Dict },
	Unregister(String),
	Call { procedure: String, args: List, kwargs: Dict },
	Drain,
	Close,
}

struct State {
	calls: Mutex<Vec<Recorded>>,
	failing: Mutex<HashSet<&'static str>>,
	call_result: Mutex<Option<CallResult>>,
	event_handler: Mutex<Option<EventHandler>>,
	invocation_handler: Mutex<Option<InvocationHandler>>,
	handler_set: Notify,
	stalled_drain: AtomicBool,
	done_tx: watch::Sender<bool>,
}

/// Records every operation and lets tests play the router.
#[derive(Clone)]
pub struct FakeSession {
	state: Arc<State>,
}

impl FakeSession {
	pub fn new() -> Self {
		let (done_tx, _) = watch::channel(false);
		Self {
			state: Arc::new(State {
				calls: Mutex::new(Vec::new()),
				failing: Mutex::new(HashSet::new()),
				call_result: Mutex::new(None),
				event_handler: Mutex::new(None),
				invocation_handler: Mutex::new(None),
				handler_set: Notify::new(),
				stalled_drain: AtomicBool::new(false),
				done_tx,
			}),
		}
	}

	/// Makes `operation` (`"subscribe"`, `"unsubscribe"`, `"publish"`, ...) fail.
	pub fn fail(self, operation: &'static str) -> Self {
		self.state.failing.lock().insert(operation);
		self
	}

	/// What `call` returns. Without one, calls fail.
	pub fn with_call_result(self, result: CallResult) -> Self {
		*self.state.call_result.lock() = Some(result);
		self
	}

	/// `drain` never finishes, as with an invocation whose command hangs.
	pub fn with_stalled_drain(self) -> Self {
		self.state.stalled_drain.store(true, Ordering::SeqCst);
		self
	}

	/// The router ends the session.
	pub fn end(&self) {
		self.state.done_tx.send_replace(true);
	}

	pub fn calls(&self) -> Vec<Recorded> {
		self.state.calls.lock().clone()
	}

	pub fn count(&self, matches: impl Fn(&Recorded) -> bool) -> usize {
		self.state.calls.lock().iter().filter(|call| matches(call)).count()
	}

	/// Waits until a subscribe or register installs a handler.
	pub async fn handler_installed(&self) {
		let installed = || self.state.event_handler.lock().is_some() || self.state.invocation_handler.lock().is_some();
		let notified = self.state.handler_set.notified();
		if installed() {
			return;
		}
		tokio::time::timeout(Duration::from_secs(5), notified).await.expect("handler installed");
	}

	pub fn emit(&self, event: Event) {
		let handler = self.state.event_handler.lock().clone().expect("subscribed");
		handler(event);
	}

	pub async fn invoke(&self, invocation: Invocation) -> InvokeResult {
		let handler = self.state.invocation_handler.lock().clone().expect("registered");
		handler(invocation).await
	}

	fn record(&self, call: Recorded) {
		self.state.calls.lock().push(call);
	}

	fn check(&self, operation: &'static str) -> Result<()> {
		if self.state.failing.lock().contains(operation) {
			return Err(Error::Rejected {
				uri: format!("wamp.error.{operation}_failed"),
				args: List::new(),
				kwargs: Dict::new(),
			});
		}
		Ok(())
	}
}

#[async_trait]
impl Session for FakeSession {
	async fn subscribe(&self, topic: &str, options: Dict, handler: EventHandler) -> Result<()> {
		self.record(Recorded::Subscribe {
			topic: topic.to_string(),
			options,
		});
		self.check("subscribe")?;
		*self.state.event_handler.lock() = Some(handler);
		self.state.handler_set.notify_waiters();
		Ok(())
	}

	async fn unsubscribe(&self, topic: &str) -> Result<()> {
		self.record(Recorded::Unsubscribe(topic.to_string()));
		self.check("unsubscribe")
	}

	async fn publish(&self, topic: &str, options: Dict, args: List, kwargs: Dict) -> Result<()> {
		self.record(Recorded::Publish {
			topic: topic.to_string(),
			options,
			args,
			kwargs,
		});
		self.check("publish")
	}

	async fn register(&self, procedure: &str, options: Dict, handler: InvocationHandler) -> Result<()> {
		self.record(Recorded::Register {
			procedure: procedure.to_string(),
			options,
		});
		self.check("register")?;
		*self.state.invocation_handler.lock() = Some(handler);
		self.state.handler_set.notify_waiters();
		Ok(())
	}

	async fn unregister(&self, procedure: &str) -> Result<()> {
		self.record(Recorded::Unregister(procedure.to_string()));
		self.check("unregister")
	}

	async fn call(&self, procedure: &str, _options: Dict, args: List, kwargs: Dict) -> Result<CallResult> {
		self.record(Recorded::Call {
			procedure: procedure.to_string(),
			args,
			kwargs,
		});
		self.check("call")?;
		let result = self.state.call_result.lock().clone();
		result.ok_or_else(|| Error::Rejected {
			uri: "wamp.error.no_such_procedure".to_string(),
			args: List::new(),
			kwargs: Dict::new(),
		})
	}

	fn done(&self) -> BoxFuture<'static, ()> {
		let mut done_rx = self.state.done_tx.subscribe();
		Box::pin(async move {
			let _ = done_rx.wait_for(|done| *done).await;
		})
	}

	async fn drain(&self) {
		self.record(Recorded::Drain);
		if self.state.stalled_drain.load(Ordering::SeqCst) {
			futures_util::future::pending::<()>().await;
		}
	}

	async fn close(&self) -> Result<()> {
		self.record(Recorded::Close);
		self.state.done_tx.send_replace(true);
		Ok(())
	}
}

/// Hands out one [`FakeSession`] and remembers what it was asked to connect to.
pub struct FakeConnector {
	session: FakeSession,
	refuse: bool,
	seen: Mutex<Vec<(String, ClientConfig)>>,
}

impl FakeConnector {
	pub fn new(session: FakeSession) -> Self {
		Self {
			session,
			refuse: false,
			seen: Mutex::new(Vec::new()),
		}
	}

	pub fn refusing() -> Self {
		Self {
			refuse: true,
			..Self::new(FakeSession::new())
		}
	}

	pub fn addresses(&self) -> Vec<String> {
		self.seen.lock().iter().map(|(address, _)| address.clone()).collect()
	}

	pub fn configs(&self) -> Vec<ClientConfig> {
		self.seen.lock().iter().map(|(_, config)| config.clone()).collect()
	}
}

#[async_trait]
impl Connector for FakeConnector {
	type Session = FakeSession;

	async fn connect(&self, url: &str, config: ClientConfig) -> Result<FakeSession> {
		self.seen.lock().push((url.to_string(), config));
		if self.refuse {
			return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused")));
		}
		Ok(self.session.clone())
	}
}

/// An interrupt the test fires by sending on (or dropping) the returned sender.
pub fn manual_interrupt() -> (oneshot::Sender<()>, Interrupt) {
	let (tx, rx) = oneshot::channel();
	(
		tx,
		Box::pin(async move {
			let _ = rx.await;
		}),
	)
}
