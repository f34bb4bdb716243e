//! Operator interrupt sources.

use futures_util::future::{self, BoxFuture};
use tracing::warn;

/// Resolves when the operator asks the running action to stop.
pub type Interrupt = BoxFuture<'static, ()>;

/// Ctrl-C. If the signal handler cannot be installed the future never resolves.
pub fn ctrl_c() -> Interrupt {
	Box::pin(async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			warn!(target = "wick.session", error = %err, "cannot listen for interrupt signal");
			future::pending::<()>().await;
		}
	})
}

/// An interrupt that never fires.
pub fn never() -> Interrupt {
	Box::pin(future::pending())
}
