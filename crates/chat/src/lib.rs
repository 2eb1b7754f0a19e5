#![deny(unsafe_code)]

//! Single-room chat state: the message store, the session and the streaming
//! reply pipeline.

mod aggregator;
mod error;
mod events;
mod export;
mod message;
mod room;
mod session;
mod store;

pub use aggregator::{RESPONSE_FAILURE_TEXT, ResponseAggregator};
pub use error::{ChatError, ChatResult};
pub use events::{EventSink, RoomEvent};
pub use export::{ChatExport, EXPORT_ROOM_NAME};
pub use message::{
    ACCENT_PALETTE, BOT_ACCENT_COLOR, BOT_DISPLAY_NAME, BOT_SENDER_ID, Message, MessageId,
    MessageKind, MessagePatch, Participant, SYSTEM_DISPLAY_NAME, SYSTEM_SENDER_ID,
};
pub use room::{ChatRoom, SubmitOutcome};
pub use session::Session;
pub use store::{MessageStore, StoreError, StoreResult};
