use wick::coerce::{encode_args, encode_kwargs};
use wick::lifecycle::SessionController;
use wick_runtime::Session;

use crate::cli::PublishArgs;
use crate::error::Result;

pub async fn run<S: Session + 'static>(controller: SessionController<S>, args: PublishArgs) -> Result<()> {
	let positional = encode_args(&args.payload.args);
	let keyword = encode_kwargs(args.payload.kwargs);
	controller.publish(&args.topic, positional, keyword).await?;
	Ok(())
}
