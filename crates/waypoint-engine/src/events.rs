//! Event sinks for observability.
//!
//! The engine calls [`EventSink::emit`] once per event. Sinks are
//! fire-and-forget: nothing in the engine depends on what they do.

use tokio::sync::mpsc;

pub use waypoint_store::{EngineEvent, NodeErrorInfo};

/// Receives engine events.
pub trait EventSink: Send + Sync {
  fn emit(&self, event: EngineEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
  fn emit(&self, _event: EngineEvent) {}
}

/// A sink that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
  sender: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
  pub fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
    Self { sender }
  }

  /// Create a sink together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl EventSink for ChannelSink {
  fn emit(&self, event: EngineEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

impl<F> EventSink for F
where
  F: Fn(EngineEvent) + Send + Sync,
{
  fn emit(&self, event: EngineEvent) {
    self(event)
  }
}
