use tokio::sync::mpsc;

use crate::message::Message;

/// One observable change to the room, emitted after the mutation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    MessageAppended(Message),
    /// Carries the full message state after the update.
    MessageUpdated(Message),
    RespondingChanged(bool),
}

/// Sending half of the room event channel.
///
/// Emission never fails: a dropped receiver just means nobody is watching.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<RoomEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink with no observer.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: RoomEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
