//! Callee side of `register`: turns invocations into command runs.
//!
//! Every invocation is rendered to the output, counted against the
//! optional limit, then answered with the stdout of the configured
//! command. Execution problems are logged and never reach the caller;
//! the router always gets a result.
//!
//! Commands are passed to the shell verbatim. Whoever writes the
//! command template controls what runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Notify;
use tracing::{Instrument, Span, debug, info, warn};
use wick_protocol::{Invocation, InvokeResult};
use wick_runtime::InvocationHandler;
use wick_runtime::process::{self, CommandLine};

use crate::coerce;
use crate::output::Output;

pub const DEFAULT_SHELL: &str = "sh";

/// What an invocation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecPolicy {
	/// Joined with `"; "` and run through `shell`.
	Commands { shell: String, commands: Vec<String> },
	/// Run directly, without a shell.
	Program(String),
	/// Answer every invocation with an empty string.
	Nothing,
}

impl ExecPolicy {
	/// The child process for one invocation, or `None` when nothing runs.
	///
	/// A joined line ending in `.sh` or `.py` is handed to the shell as a
	/// script path instead of through `-c`.
	pub fn command_line(&self) -> Option<CommandLine> {
		match self {
			Self::Commands { shell, commands } if !commands.is_empty() => {
				let line = commands.join("; ");
				let command = CommandLine::new(shell.clone());
				if line.ends_with(".sh") || line.ends_with(".py") {
					Some(command.arg(line))
				} else {
					Some(command.arg("-c").arg(line))
				}
			}
			Self::Program(path) if !path.is_empty() => Some(CommandLine::new(path.clone())),
			_ => None,
		}
	}
}

/// How the callee answers and when it stops.
#[derive(Debug, Clone)]
pub struct InvocationPolicy {
	/// Stop after this many invocations. `Some(0)` and `None` both mean no limit.
	pub limit: Option<u64>,
	/// Wait this long before registering.
	pub delay: Option<Duration>,
	pub exec: ExecPolicy,
}

/// Outcome of taking one slot from an [`InvocationBudget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
	Unlimited,
	Granted,
	/// This invocation used the final slot.
	Last,
	/// The limit was already reached.
	Exhausted,
}

/// Remaining-invocation counter, shared by concurrent invocations.
#[derive(Debug)]
pub struct InvocationBudget {
	remaining: Option<AtomicU64>,
}

impl InvocationBudget {
	pub fn new(limit: Option<u64>) -> Self {
		Self {
			remaining: limit.filter(|n| *n > 0).map(AtomicU64::new),
		}
	}

	/// Takes one slot. The counter never goes below zero and exactly one
	/// caller ever sees [`Grant::Last`].
	pub fn acquire(&self) -> Grant {
		let Some(remaining) = &self.remaining else {
			return Grant::Unlimited;
		};
		match remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)) {
			Ok(1) => Grant::Last,
			Ok(_) => Grant::Granted,
			Err(_) => Grant::Exhausted,
		}
	}

	pub fn remaining(&self) -> Option<u64> {
		self.remaining.as_ref().map(|n| n.load(Ordering::Acquire))
	}
}

struct Inner {
	exec: ExecPolicy,
	budget: InvocationBudget,
	limit_reached: Notify,
	span: Span,
	output: Output,
}

/// Builds the invocation handler for a registration and reports when its limit is hit.
#[derive(Clone)]
pub struct InvocationDispatcher {
	inner: Arc<Inner>,
	delay: Option<Duration>,
}

impl InvocationDispatcher {
	pub fn new(policy: InvocationPolicy, span: Span, output: Output) -> Self {
		Self {
			inner: Arc::new(Inner {
				exec: policy.exec,
				budget: InvocationBudget::new(policy.limit),
				limit_reached: Notify::new(),
				span,
				output,
			}),
			delay: policy.delay.filter(|d| !d.is_zero()),
		}
	}

	pub fn delay(&self) -> Option<Duration> {
		self.delay
	}

	pub fn budget(&self) -> &InvocationBudget {
		&self.inner.budget
	}

	/// Resolves once the final allowed invocation has run its command.
	/// Never resolves without a limit.
	pub fn limit_reached(&self) -> BoxFuture<'static, ()> {
		let inner = Arc::clone(&self.inner);
		Box::pin(async move { inner.limit_reached.notified().await })
	}

	pub fn handler(&self) -> InvocationHandler {
		let inner = Arc::clone(&self.inner);
		Arc::new(move |invocation: Invocation| -> BoxFuture<'static, InvokeResult> {
			let inner = Arc::clone(&inner);
			let span = inner.span.clone();
			Box::pin(dispatch(inner, invocation).instrument(span))
		})
	}

	/// Answers one invocation.
	pub async fn dispatch(&self, invocation: Invocation) -> InvokeResult {
		let span = self.inner.span.clone();
		dispatch(Arc::clone(&self.inner), invocation).instrument(span).await
	}
}

async fn dispatch(inner: Arc<Inner>, invocation: Invocation) -> InvokeResult {
	debug!(target = "wick.callee", request = invocation.request, "invocation received");
	if let Err(err) = inner.output.write(&coerce::render(&invocation.args, &invocation.kwargs)) {
		warn!(target = "wick.callee", error = %err, "failed to write invocation arguments");
	}

	let grant = inner.budget.acquire();
	if grant == Grant::Exhausted {
		warn!(target = "wick.callee", request = invocation.request, "invocation limit already reached, not executing");
		return InvokeResult::single("");
	}

	let stdout = execute(&inner.exec).await;

	if grant == Grant::Last {
		info!(target = "wick.callee", "invocation limit reached");
		// notify_one keeps a permit if nobody is waiting yet
		inner.limit_reached.notify_one();
	}
	InvokeResult::single(stdout)
}

async fn execute(exec: &ExecPolicy) -> String {
	let Some(command) = exec.command_line() else {
		return String::new();
	};
	debug!(target = "wick.callee", program = %command.program, args = ?command.args, "running command");

	match process::run(&command).await {
		Ok(output) => {
			if !output.stderr.is_empty() {
				warn!(target = "wick.callee", stderr = %output.stderr.trim_end(), "command wrote to stderr");
			}
			if !output.success() {
				warn!(target = "wick.callee", status = %output.status, "command exited unsuccessfully");
			}
			trim_newline(output.stdout)
		}
		Err(err) => {
			warn!(target = "wick.callee", program = %command.program, error = %err, "failed to run command");
			String::new()
		}
	}
}

fn trim_newline(mut text: String) -> String {
	if text.ends_with('\n') {
		text.pop();
		if text.ends_with('\r') {
			text.pop();
		}
	}
	text
}
