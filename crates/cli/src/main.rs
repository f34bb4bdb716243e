use clap::Parser;
use tracing::error;
use wick_cli::{cli::Cli, commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		if err.is_configuration() {
			error!(target = "wick", error = %err, "invalid configuration");
		} else {
			error!(target = "wick", error = %err, "command failed");
		}
		std::process::exit(1);
	}
}
