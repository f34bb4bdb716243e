//! In-memory transport for exercising the session client without a router.
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! controller.inject(Message::Welcome { session: 1, details: Dict::new() });
//! let client = Client::establish(parts, config).await?;
//! let sent = controller.take_sent();
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use wick_protocol::Message;

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

pub(crate) struct FakeTransportBuilder;

impl FakeTransportBuilder {
	pub(crate) fn new() -> Self {
		Self
	}

	/// Returns the transport halves and a controller driving the "router" side.
	pub(crate) fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));
		let sent_signal = Arc::new(Notify::new());

		let parts = TransportParts {
			sender: Box::new(FakeTransportSender {
				sent: Arc::clone(&sent),
				sent_signal: Arc::clone(&sent_signal),
				closed: false,
			}),
			receiver: Box::new(FakeTransportReceiver { inbound_rx, message_tx }),
			message_rx,
		};
		let controller = FakeTransportController {
			inbound_tx: Mutex::new(Some(inbound_tx)),
			sent,
			sent_signal,
		};
		(parts, controller)
	}
}

pub(crate) struct FakeTransportController {
	inbound_tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
	sent: Arc<Mutex<Vec<Message>>>,
	sent_signal: Arc<Notify>,
}

impl FakeTransportController {
	/// Delivers `message` to the client as if the router sent it.
	pub(crate) fn inject(&self, message: Message) {
		if let Some(tx) = self.inbound_tx.lock().as_ref() {
			let _ = tx.send(message);
		}
	}

	/// Simulates the router dropping the connection.
	pub(crate) fn disconnect(&self) {
		self.inbound_tx.lock().take();
	}

	/// Takes every message the client sent so far.
	pub(crate) fn take_sent(&self) -> Vec<Message> {
		std::mem::take(&mut *self.sent.lock())
	}

	/// Waits until the client has sent at least `count` messages (not yet taken).
	pub(crate) async fn wait_sent(&self, count: usize) -> Vec<Message> {
		let wait = async {
			loop {
				let notified = self.sent_signal.notified();
				if self.sent.lock().len() >= count {
					return;
				}
				notified.await;
			}
		};
		tokio::time::timeout(Duration::from_secs(5), wait)
			.await
			.unwrap_or_else(|_| panic!("client did not send {count} messages in time"));
		self.take_sent()
	}
}

struct FakeTransportSender {
	sent: Arc<Mutex<Vec<Message>>>,
	sent_signal: Arc<Notify>,
	closed: bool,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, message: Message) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			if self.closed {
				return Err(Error::SessionClosed);
			}
			self.sent.lock().push(message);
			self.sent_signal.notify_waiters();
			Ok(())
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.closed = true;
			Ok(())
		})
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Message>,
	message_tx: mpsc::UnboundedSender<Message>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(message) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
