use clap::{Args, Parser, Subcommand};
use wick::coerce::parse_key_value;
use wick_protocol::MatchPolicy;
use wick_runtime::Serialization;

use crate::profile::{DEFAULT_REALM, DEFAULT_URL};

#[derive(Parser, Debug)]
#[command(name = "wick")]
#[command(about = "WAMP client: subscribe, publish, register and call from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(flatten)]
	pub connection: ConnectionArgs,

	#[command(subcommand)]
	pub command: Commands,
}

/// Router address, realm and credentials shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
	/// Router URL (ws, wss, tcp, rs)
	#[arg(long, global = true, env = "WICK_URL", default_value = DEFAULT_URL)]
	pub url: String,

	#[arg(long, global = true, env = "WICK_REALM", default_value = DEFAULT_REALM)]
	pub realm: String,

	#[arg(long, global = true, env = "WICK_AUTHID")]
	pub authid: Option<String>,

	#[arg(long, global = true, env = "WICK_AUTHROLE")]
	pub authrole: Option<String>,

	/// WAMP-CRA secret
	#[arg(long, global = true, env = "WICK_SECRET", hide_env_values = true)]
	pub secret: Option<String>,

	/// Ticket for ticket authentication
	#[arg(long, global = true, env = "WICK_TICKET", hide_env_values = true)]
	pub ticket: Option<String>,

	/// Hex-encoded Ed25519 private key for cryptosign (32 or 64 bytes)
	#[arg(long, global = true, env = "WICK_PRIVATE_KEY", hide_env_values = true)]
	pub private_key: Option<String>,

	/// Message serializer: json, msgpack or cbor
	#[arg(long, global = true, env = "WICK_SERIALIZER", default_value = "json")]
	pub serializer: Serialization,

	/// Read connection settings from this section of ~/.wick/config
	#[arg(long, global = true, env = "WICK_PROFILE")]
	pub profile: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Subscribe to a topic and print every event
	#[command(alias = "sub")]
	Subscribe(SubscribeArgs),

	/// Publish one event to a topic
	#[command(alias = "pub")]
	Publish(PublishArgs),

	/// Register a procedure answered by shell commands
	#[command(alias = "reg")]
	Register(RegisterArgs),

	/// Call a procedure once and print its result
	Call(CallArgs),
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Subscribe(_) => "subscribe",
			Self::Publish(_) => "publish",
			Self::Register(_) => "register",
			Self::Call(_) => "call",
		}
	}
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
	pub topic: String,

	/// Topic matching policy: exact, prefix or wildcard
	#[arg(long = "match", value_name = "POLICY", default_value = "exact")]
	pub match_policy: MatchPolicy,

	/// Print event details above each event
	#[arg(long)]
	pub details: bool,
}

/// Positional and keyword arguments, typed before sending.
#[derive(Args, Debug, Clone, Default)]
pub struct PayloadArgs {
	/// Positional arguments
	#[arg(allow_negative_numbers = true)]
	pub args: Vec<String>,

	/// Keyword argument, repeatable
	#[arg(short = 'k', long = "kwarg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
	pub kwargs: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
	pub topic: String,

	#[command(flatten)]
	pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
	pub procedure: String,

	/// Command to run per invocation, repeatable; joined with "; "
	#[arg(short = 'c', long = "command", value_name = "CMD")]
	pub commands: Vec<String>,

	/// Shell that runs the commands
	#[arg(long, default_value = wick::dispatcher::DEFAULT_SHELL)]
	pub shell: String,

	/// Program to run per invocation, without a shell
	#[arg(long, value_name = "PATH", conflicts_with = "commands")]
	pub script: Option<String>,

	/// Seconds to wait before registering
	#[arg(long, value_name = "SECS")]
	pub delay: Option<u64>,

	/// Exit after this many invocations (0 means no limit)
	#[arg(long, value_name = "N")]
	pub invoke_count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
	pub procedure: String,

	#[command(flatten)]
	pub payload: PayloadArgs,
}
