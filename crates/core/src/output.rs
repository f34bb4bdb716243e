//! Destination for rendered payloads and results.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Where rendered payloads go. Stdout unless a test captures it.
///
/// Each [`write`](Output::write) lands as one block, so output from
/// concurrent handlers never interleaves mid-payload.
#[derive(Clone, Default)]
pub struct Output {
	capture: Option<Arc<Mutex<Vec<u8>>>>,
}

impl Output {
	pub fn stdout() -> Self {
		Self::default()
	}

	/// An in-memory sink, read back with [`captured`](Output::captured).
	pub fn capture() -> Self {
		Self {
			capture: Some(Arc::new(Mutex::new(Vec::new()))),
		}
	}

	pub fn write(&self, text: &str) -> io::Result<()> {
		match &self.capture {
			Some(buf) => {
				buf.lock().extend_from_slice(text.as_bytes());
				Ok(())
			}
			None => {
				let mut stdout = io::stdout().lock();
				stdout.write_all(text.as_bytes())?;
				stdout.flush()
			}
		}
	}

	/// Everything written so far. Empty for stdout.
	pub fn captured(&self) -> String {
		self.capture
			.as_ref()
			.map(|buf| String::from_utf8_lossy(&buf.lock()).into_owned())
			.unwrap_or_default()
	}
}

impl std::fmt::Debug for Output {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(if self.capture.is_some() { "Output(capture)" } else { "Output(stdout)" })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clones_share_one_capture_buffer() {
		let output = Output::capture();
		let clone = output.clone();
		output.write("a\n").unwrap();
		clone.write("b\n").unwrap();
		assert_eq!(output.captured(), "a\nb\n");
	}

	#[test]
	fn stdout_sink_captures_nothing() {
		assert_eq!(Output::stdout().captured(), "");
	}
}
