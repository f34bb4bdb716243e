//! Child process execution for callee handlers.

use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

/// What to run: a program path plus its arguments. No shell is involved
/// unless `program` is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
	pub program: String,
	pub args: Vec<String>,
}

impl CommandLine {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}
}

/// Captured result of a finished child.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
	pub status: ExitStatus,
	pub stdout: String,
	pub stderr: String,
}

impl ProcessOutput {
	pub fn success(&self) -> bool {
		self.status.success()
	}
}

/// Runs `command` to completion, capturing stdout and stderr.
///
/// Stdin is closed. Output that is not valid UTF-8 is converted lossily.
pub async fn run(command: &CommandLine) -> std::io::Result<ProcessOutput> {
	let output = Command::new(&command.program)
		.args(&command.args)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true)
		.output()
		.await?;

	Ok(ProcessOutput {
		status: output.status,
		stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
		stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
	})
}
