//! Broadcast sinks: where envelopes go after local subscribers ran.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::{_prelude::*, bus::Envelope};

/// Receives every envelope published on the bus.
pub trait BroadcastSink
where
	Self: Send + Sync,
{
	/// Forwards `envelope` to all open connections. Must not block.
	fn broadcast(&self, envelope: &Envelope);
}

/// Connection identifier handed out by [`SocketHub::connect`].
pub type ConnectionId = u64;

/// Fan-out hub for realtime connections.
///
/// Each connection owns an unbounded channel of pre-serialized JSON frames; the socket task
/// drains it. Channels whose receiver is gone are pruned on the next broadcast.
#[derive(Debug, Default)]
pub struct SocketHub {
	connections: Mutex<Vec<(ConnectionId, UnboundedSender<String>)>>,
	next_id: AtomicU64,
}
impl SocketHub {
	/// Creates an empty hub.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new connection and returns the frame receiver for it.
	pub fn connect(&self) -> (ConnectionId, UnboundedReceiver<String>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);

		self.connections.lock().push((id, tx));

		tracing::debug!(connection = id, "realtime connection registered");

		(id, rx)
	}

	/// Drops the connection's sender.
	pub fn disconnect(&self, id: ConnectionId) {
		self.connections.lock().retain(|(conn, _)| *conn != id);

		tracing::debug!(connection = id, "realtime connection removed");
	}

	/// Number of registered connections.
	pub fn len(&self) -> usize {
		self.connections.lock().len()
	}

	/// Returns `true` when nobody is connected.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl BroadcastSink for SocketHub {
	fn broadcast(&self, envelope: &Envelope) {
		let frame = match serde_json::to_string(envelope) {
			Ok(frame) => frame,
			Err(e) => {
				tracing::error!(key = %envelope.key, error = %e, "failed to serialize envelope");

				return;
			},
		};
		let mut connections = self.connections.lock();
		let before = connections.len();

		connections.retain(|(_, tx)| tx.send(frame.clone()).is_ok());

		let pruned = before - connections.len();

		if pruned > 0 {
			tracing::debug!(pruned, "skipped closed realtime connections");
		}
	}
}
