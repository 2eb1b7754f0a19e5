use anonroom_llm::HistoryTurn;

use crate::events::{EventSink, RoomEvent};
use crate::message::{Message, MessageKind, Participant};
use crate::store::MessageStore;

/// In-memory state for one login: the local participant and the room history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    participant: Participant,
    store: MessageStore,
    responding: bool,
}

impl Session {
    /// Opens a session and posts the room welcome notice.
    pub fn start(participant: Participant) -> Self {
        let mut store = MessageStore::new();
        let welcome = Message::system(format!(
            "Welcome to the anonymous room, {}. Chat history is saved locally in this session.",
            participant.display_name
        ));
        if let Err(error) = store.append(welcome) {
            tracing::error!(error = %error, "failed to post welcome notice");
        }

        tracing::info!(participant_id = %participant.id, "chat session started");

        Self {
            participant,
            store,
            responding: false,
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut MessageStore {
        &mut self.store
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn is_responding(&self) -> bool {
        self.responding
    }

    pub(crate) fn set_responding(&mut self, responding: bool, events: &EventSink) {
        if self.responding == responding {
            return;
        }
        self.responding = responding;
        events.emit(RoomEvent::RespondingChanged(responding));
    }

    /// Finalized text turns, as context for a freshly opened model session.
    pub fn history_turns(&self) -> Vec<HistoryTurn> {
        self.store
            .messages()
            .iter()
            .filter(|message| !message.is_pending)
            .filter(|message| matches!(message.kind, MessageKind::Text))
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| {
                if message.is_from_bot() {
                    HistoryTurn::assistant(message.content.clone())
                } else {
                    HistoryTurn::user(message.content.clone())
                }
            })
            .collect()
    }

    /// Discards the session, handing back who was logged in.
    pub fn end(self) -> Participant {
        tracing::info!(
            participant_id = %self.participant.id,
            message_count = self.store.len(),
            "chat session ended"
        );
        self.participant
    }
}

#[cfg(test)]
mod tests {
    use anonroom_llm::{ImagePayload, Role};

    use super::*;
    use crate::message::MessagePatch;

    #[test]
    fn starts_with_a_welcome_notice() {
        let session = Session::start(Participant::login("ghost").unwrap());

        assert_eq!(session.messages().len(), 1);
        let welcome = &session.messages()[0];
        assert!(welcome.is_system());
        assert!(welcome.content.contains("ghost"));
        assert!(!session.is_responding());
    }

    #[test]
    fn history_keeps_only_finalized_text_turns() {
        let participant = Participant::login("ghost").unwrap();
        let mut session = Session::start(participant.clone());
        let image = ImagePayload::from_bytes(vec![0xFF, 0xD8, 0xFF]).unwrap();

        let store = session.store_mut();
        store.append(Message::image_from(&participant, &image)).unwrap();
        store.append(Message::text_from(&participant, "hello")).unwrap();
        let reply = store.append(Message::bot_placeholder()).unwrap();
        store.update(reply, MessagePatch::finalize_with("yo")).unwrap();
        store.append(Message::bot_placeholder()).unwrap();

        let turns = session.history_turns();
        let roles = turns.iter().map(|turn| turn.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(turns[0].content, "hello");
        assert_eq!(turns[1].content, "yo");
    }

    #[test]
    fn responding_changes_are_emitted_once() {
        let (events, mut rx) = EventSink::channel();
        let mut session = Session::start(Participant::login("ghost").unwrap());

        session.set_responding(true, &events);
        session.set_responding(true, &events);
        session.set_responding(false, &events);

        assert_eq!(rx.try_recv().ok(), Some(RoomEvent::RespondingChanged(true)));
        assert_eq!(rx.try_recv().ok(), Some(RoomEvent::RespondingChanged(false)));
        assert!(rx.try_recv().is_err());
    }
}
