mod call;
mod publish;
mod register;
mod subscribe;

use tracing::{Span, debug, info_span};
use wick::auth::{self, CredentialSet, SessionParams};
use wick::lifecycle::SessionController;
use wick::output::Output;
use wick_runtime::{Connector, WampConnector};

use crate::cli::{Cli, Commands, ConnectionArgs};
use crate::error::{CliError, Result};
use crate::profile::{self, Profile};

/// Runs the parsed command line against the bundled WAMP client.
pub async fn dispatch(cli: Cli) -> Result<()> {
	run_with(&WampConnector, cli).await
}

/// Runs the parsed command line against `connector`.
///
/// Credentials are resolved before connecting, so configuration errors
/// never touch the network.
pub async fn run_with<C: Connector>(connector: &C, cli: Cli) -> Result<()> {
	let settings = Settings::from_args(&cli.connection)?;
	let strategy = auth::resolve(&settings.credentials)?;
	debug!(target = "wick", ?strategy, url = %settings.url, realm = %settings.params.realm, "resolved settings");

	let span = info_span!("wick", action = cli.command.name());
	let ctx = CommandContext {
		span: span.clone(),
		output: Output::stdout(),
	};
	let config = strategy.session_config(&settings.params, &span);
	let controller = SessionController::connect(connector, &settings.url, config, span, ctx.output.clone()).await?;

	match cli.command {
		Commands::Subscribe(args) => subscribe::run(controller, args).await,
		Commands::Publish(args) => publish::run(controller, args).await,
		Commands::Register(args) => register::run(controller, args, &ctx).await,
		Commands::Call(args) => call::run(controller, args).await,
	}
}

/// Per-invocation logging span and output sink.
pub struct CommandContext {
	pub span: Span,
	pub output: Output,
}

/// Connection settings after merging flags, environment and profile.
#[derive(Debug)]
pub struct Settings {
	pub url: String,
	pub params: SessionParams,
	pub credentials: CredentialSet,
}

impl Settings {
	pub fn from_args(args: &ConnectionArgs) -> Result<Self> {
		let mut settings = Self {
			url: args.url.clone(),
			params: SessionParams {
				realm: args.realm.clone(),
				serialization: args.serializer,
				authid: args.authid.clone(),
				authrole: args.authrole.clone(),
			},
			credentials: CredentialSet::new(args.private_key.clone(), args.ticket.clone(), args.secret.clone()),
		};

		if let Some(name) = &args.profile {
			let base = profile::config_base().ok_or_else(|| CliError::Profile("cannot locate the home directory".to_string()))?;
			settings.apply(profile::load(&base, name)?)?;
		}
		Ok(settings)
	}

	/// Profile values replace flag values. Credentials are replaced as a set.
	pub fn apply(&mut self, profile: Profile) -> Result<()> {
		if let Some(serializer) = profile.serializer.as_deref() {
			self.params.serialization = serializer.parse()?;
		}
		self.credentials = profile.credentials();
		self.url = profile.url;
		self.params.realm = profile.realm;
		self.params.authid = profile.authid;
		self.params.authrole = profile.authrole;
		Ok(())
	}
}
