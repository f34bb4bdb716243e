use tracing::info;
use wick::lifecycle::{SessionController, SubscribeOptions, interrupt};
use wick_runtime::Session;

use crate::cli::SubscribeArgs;
use crate::error::Result;

pub async fn run<S: Session + 'static>(controller: SessionController<S>, args: SubscribeArgs) -> Result<()> {
	let options = SubscribeOptions {
		match_policy: args.match_policy,
		details: args.details,
	};
	let shutdown = controller.subscribe(&args.topic, options, interrupt::ctrl_c()).await?;
	info!(target = "wick", topic = %args.topic, ?shutdown, "subscription ended");
	Ok(())
}
