//! One session, one action, one teardown.
//!
//! A [`SessionController`] moves through [`Phase`]s:
//!
//! ```text
//! Idle -> Connecting -> Active -> Draining -> Closed
//! ```
//!
//! Connecting either yields an active controller or a fatal
//! [`Error::Connect`]. Each action method consumes the controller and
//! closes the session before returning, so the handle is released exactly
//! once on every path.
//!
//! The waiting actions (`subscribe`, `register`) end on whichever comes
//! first: the operator interrupt, the router closing the session, or (for
//! `register`) the invocation limit. See [`Shutdown`]. After the limit,
//! replies still in flight get [`DRAIN_TIMEOUT`] to go out.

mod address;
pub mod interrupt;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use serde_json::Value;
use tracing::{Instrument, Span, debug, info, warn};
use wick_protocol::{Dict, Event, List, MatchPolicy, acknowledged};
use wick_runtime::{ClientConfig, Connector, EventHandler, Session};

pub use address::normalize_address;
pub use interrupt::Interrupt;

use crate::coerce;
use crate::dispatcher::InvocationDispatcher;
use crate::error::{Error, Result};
use crate::output::Output;

/// How long the invocation limit waits for replies still in flight before closing anyway.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Connecting,
	Active,
	Draining,
	Closed,
}

/// Why a waiting action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
	/// The operator interrupted. The subscription or registration was withdrawn.
	Interrupted,
	/// The router ended the session. No further protocol traffic was attempted.
	RouterClosed,
	/// The registration answered its last allowed invocation.
	InvocationLimit,
}

/// What a single call produced. Neither variant is an error for the process.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
	/// The first positional result, if the callee returned any.
	Returned(Option<Value>),
	Failed(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
	pub match_policy: MatchPolicy,
	/// Print event details above each event.
	pub details: bool,
}

pub struct SessionController<S: Session> {
	session: S,
	phase: Phase,
	span: Span,
	output: Output,
}

impl<S: Session + 'static> SessionController<S> {
	/// Normalizes `address` and opens a session through `connector`.
	pub async fn connect<C>(connector: &C, address: &str, config: ClientConfig, span: Span, output: Output) -> Result<Self>
	where
		C: Connector<Session = S>,
	{
		let address = normalize_address(address);
		let mut phase = Phase::Idle;
		log_transition(&span, &mut phase, Phase::Connecting);
		debug!(parent: &span, target = "wick.session", %address, realm = %config.realm, "connecting");

		let session = connector
			.connect(&address, config)
			.instrument(span.clone())
			.await
			.map_err(|source| Error::Connect {
				address: address.clone(),
				source,
			})?;
		info!(parent: &span, target = "wick.session", %address, "connected");

		let mut controller = Self {
			session,
			phase,
			span,
			output,
		};
		controller.transition(Phase::Active);
		Ok(controller)
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	/// Prints every event on `topic` until the action ends.
	pub async fn subscribe(mut self, topic: &str, options: SubscribeOptions, mut interrupt: Interrupt) -> Result<Shutdown> {
		let handler = event_printer(self.output.clone(), self.span.clone(), options.details);
		let subscribed = self
			.session
			.subscribe(topic, options.match_policy.subscribe_options(), handler)
			.instrument(self.span.clone())
			.await;
		if let Err(source) = subscribed {
			self.finish().await;
			return Err(Error::Subscribe {
				topic: topic.to_string(),
				source,
			});
		}
		info!(parent: &self.span, target = "wick.session", topic, policy = %options.match_policy, "subscribed");

		let shutdown = self.wait(&mut interrupt, None).await;
		if shutdown == Shutdown::Interrupted {
			if let Err(err) = self.session.unsubscribe(topic).instrument(self.span.clone()).await {
				warn!(parent: &self.span, target = "wick.session", topic, error = %err, "failed to unsubscribe");
			}
		}
		self.finish().await;
		Ok(shutdown)
	}

	/// Publishes one acknowledged event. A rejected publish is fatal.
	pub async fn publish(mut self, topic: &str, args: List, kwargs: Dict) -> Result<()> {
		let published = self
			.session
			.publish(topic, acknowledged(), args, kwargs)
			.instrument(self.span.clone())
			.await;
		self.finish().await;

		published.map_err(|source| Error::Publish {
			topic: topic.to_string(),
			source,
		})?;
		info!(parent: &self.span, target = "wick.session", topic, "published");
		Ok(())
	}

	/// Registers `procedure` with the dispatcher's handler and serves calls until the action ends.
	///
	/// The dispatcher's delay is waited first; an interrupt or router close
	/// during that wait ends the action without registering.
	pub async fn register(mut self, procedure: &str, dispatcher: InvocationDispatcher, mut interrupt: Interrupt) -> Result<Shutdown> {
		if let Some(delay) = dispatcher.delay() {
			info!(parent: &self.span, target = "wick.session", delay_secs = delay.as_secs_f64(), "waiting before registering");
			let early = tokio::select! {
				() = tokio::time::sleep(delay) => None,
				() = &mut interrupt => Some(Shutdown::Interrupted),
				() = self.session.done() => Some(Shutdown::RouterClosed),
			};
			if let Some(shutdown) = early {
				self.finish().await;
				return Ok(shutdown);
			}
		}

		let registered = self
			.session
			.register(procedure, Dict::new(), dispatcher.handler())
			.instrument(self.span.clone())
			.await;
		if let Err(source) = registered {
			self.finish().await;
			return Err(Error::Register {
				procedure: procedure.to_string(),
				source,
			});
		}
		info!(parent: &self.span, target = "wick.session", procedure, "registered");

		let shutdown = self.wait(&mut interrupt, Some(dispatcher.limit_reached())).await;
		match shutdown {
			Shutdown::Interrupted => {
				if let Err(err) = self.session.unregister(procedure).instrument(self.span.clone()).await {
					warn!(parent: &self.span, target = "wick.session", procedure, error = %err, "failed to unregister");
				}
			}
			Shutdown::InvocationLimit => self.drain(&mut interrupt).await,
			Shutdown::RouterClosed => {}
		}
		self.finish().await;
		Ok(shutdown)
	}

	/// Calls `procedure` once and prints its first positional result.
	///
	/// A failed call is logged and reported as [`CallOutcome::Failed`].
	pub async fn call(mut self, procedure: &str, args: List, kwargs: Dict) -> Result<CallOutcome> {
		let called = self
			.session
			.call(procedure, Dict::new(), args, kwargs)
			.instrument(self.span.clone())
			.await;

		let mut written = Ok(());
		let outcome = match called {
			Ok(result) => match result.args.into_iter().next() {
				Some(first) => {
					written = self.output.write(&format!("{}\n", coerce::render_value(&first)));
					CallOutcome::Returned(Some(first))
				}
				None => {
					info!(parent: &self.span, target = "wick.session", procedure, "call returned no result");
					CallOutcome::Returned(None)
				}
			},
			Err(err) => {
				warn!(parent: &self.span, target = "wick.session", procedure, error = %err, "call failed");
				CallOutcome::Failed(err.to_string())
			}
		};
		self.finish().await;

		written?;
		Ok(outcome)
	}

	async fn wait(&self, interrupt: &mut Interrupt, limit: Option<BoxFuture<'static, ()>>) -> Shutdown {
		let limit = limit.unwrap_or_else(|| Box::pin(future::pending()));
		let shutdown = tokio::select! {
			() = interrupt => Shutdown::Interrupted,
			() = self.session.done() => Shutdown::RouterClosed,
			() = limit => Shutdown::InvocationLimit,
		};
		info!(parent: &self.span, target = "wick.session", ?shutdown, "action ending");
		shutdown
	}

	/// Lets replies already in flight go out, for at most [`DRAIN_TIMEOUT`].
	///
	/// An interrupt or the router closing the session cuts the wait short.
	async fn drain(&mut self, interrupt: &mut Interrupt) {
		self.transition(Phase::Draining);
		tokio::select! {
			() = self.session.drain().instrument(self.span.clone()) => {}
			() = tokio::time::sleep(DRAIN_TIMEOUT) => {
				warn!(parent: &self.span, target = "wick.session", timeout_secs = DRAIN_TIMEOUT.as_secs(), "invocations still running, closing anyway");
			}
			() = interrupt => debug!(parent: &self.span, target = "wick.session", "drain interrupted"),
			() = self.session.done() => {}
		}
	}

	async fn finish(&mut self) {
		self.transition(Phase::Draining);
		if let Err(err) = self.session.close().instrument(self.span.clone()).await {
			warn!(parent: &self.span, target = "wick.session", error = %err, "failed to close session");
		}
		self.transition(Phase::Closed);
	}

	fn transition(&mut self, next: Phase) {
		if self.phase == next {
			return;
		}
		log_transition(&self.span, &mut self.phase, next);
	}
}

fn log_transition(span: &Span, phase: &mut Phase, next: Phase) {
	debug!(parent: span, target = "wick.session", from = ?*phase, to = ?next, "phase");
	*phase = next;
}

fn event_printer(output: Output, span: Span, details: bool) -> EventHandler {
	Arc::new(move |event: Event| {
		let _entered = span.enter();
		debug!(target = "wick.session", publication = event.publication, "event received");
		let mut text = String::new();
		if details {
			text.push_str("details:\n");
			text.push_str(&coerce::render_value(&event.details));
			text.push('\n');
		}
		text.push_str(&coerce::render(&event.args, &event.kwargs));
		if let Err(err) = output.write(&text) {
			warn!(target = "wick.session", error = %err, "failed to write event");
		}
	})
}

#[cfg(test)]
mod tests;
