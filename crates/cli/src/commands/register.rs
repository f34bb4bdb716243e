use std::time::Duration;

use tracing::info;
use wick::dispatcher::{ExecPolicy, InvocationDispatcher, InvocationPolicy};
use wick::lifecycle::{SessionController, interrupt};
use wick_runtime::Session;

use super::CommandContext;
use crate::cli::RegisterArgs;
use crate::error::Result;

pub async fn run<S: Session + 'static>(controller: SessionController<S>, args: RegisterArgs, ctx: &CommandContext) -> Result<()> {
	let procedure = args.procedure.clone();
	let dispatcher = InvocationDispatcher::new(policy(args), ctx.span.clone(), ctx.output.clone());
	let shutdown = controller.register(&procedure, dispatcher, interrupt::ctrl_c()).await?;
	info!(target = "wick", %procedure, ?shutdown, "registration ended");
	Ok(())
}

fn policy(args: RegisterArgs) -> InvocationPolicy {
	let exec = match (args.commands.is_empty(), args.script) {
		(false, _) => ExecPolicy::Commands {
			shell: args.shell,
			commands: args.commands,
		},
		(true, Some(script)) => ExecPolicy::Program(script),
		(true, None) => ExecPolicy::Nothing,
	};
	InvocationPolicy {
		limit: args.invoke_count,
		delay: args.delay.map(Duration::from_secs),
		exec,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(commands: &[&str], script: Option<&str>) -> RegisterArgs {
		RegisterArgs {
			procedure: "p".into(),
			commands: commands.iter().map(|c| c.to_string()).collect(),
			shell: "bash".into(),
			script: script.map(str::to_string),
			delay: Some(3),
			invoke_count: Some(0),
		}
	}

	#[test]
	fn commands_take_precedence() {
		let policy = policy(args(&["date"], None));
		assert_eq!(
			policy.exec,
			ExecPolicy::Commands {
				shell: "bash".into(),
				commands: vec!["date".into()]
			}
		);
		assert_eq!(policy.delay, Some(Duration::from_secs(3)));
		assert_eq!(policy.limit, Some(0));
	}

	#[test]
	fn script_runs_as_program() {
		assert_eq!(policy(args(&[], Some("/opt/job"))).exec, ExecPolicy::Program("/opt/job".into()));
	}

	#[test]
	fn nothing_configured() {
		assert_eq!(policy(args(&[], None)).exec, ExecPolicy::Nothing);
	}
}
