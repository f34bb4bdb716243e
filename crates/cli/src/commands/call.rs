use tracing::debug;
use wick::coerce::{encode_args, encode_kwargs};
use wick::lifecycle::{CallOutcome, SessionController};
use wick_runtime::Session;

use crate::cli::CallArgs;
use crate::error::Result;

/// A failed call has already been logged and does not fail the process.
pub async fn run<S: Session + 'static>(controller: SessionController<S>, args: CallArgs) -> Result<()> {
	let positional = encode_args(&args.payload.args);
	let keyword = encode_kwargs(args.payload.kwargs);
	match controller.call(&args.procedure, positional, keyword).await? {
		CallOutcome::Returned(result) => debug!(target = "wick", returned = result.is_some(), "call finished"),
		CallOutcome::Failed(reason) => debug!(target = "wick", %reason, "call finished without result"),
	}
	Ok(())
}
