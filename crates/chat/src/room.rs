use snafu::ResultExt;

use anonroom_llm::{ChatTransport, ImagePayload, StreamingAdapter};

use crate::aggregator::ResponseAggregator;
use crate::error::{ChatResult, StoreSnafu};
use crate::events::{EventSink, RoomEvent};
use crate::export::ChatExport;
use crate::message::{Message, MessageId, Participant};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to send: blank text and no image.
    Ignored,
    /// A reply is still streaming; the submission was dropped.
    Busy,
    /// The AI reply was written into the message with this id.
    Replied(MessageId),
}

/// One logged-in room: the session, the model adapter and the event feed.
pub struct ChatRoom<T: ChatTransport> {
    session: Session,
    adapter: StreamingAdapter<T>,
    events: EventSink,
}

impl<T: ChatTransport> ChatRoom<T> {
    pub fn join(participant: Participant, adapter: StreamingAdapter<T>, events: EventSink) -> Self {
        let session = Session::start(participant);
        for message in session.messages() {
            events.emit(RoomEvent::MessageAppended(message.clone()));
        }

        Self {
            session,
            adapter,
            events,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn participant(&self) -> &Participant {
        self.session.participant()
    }

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn is_responding(&self) -> bool {
        self.session.is_responding()
    }

    /// Posts the user's text and/or image, then streams the AI reply into the room.
    pub async fn submit(
        &mut self,
        text: &str,
        image: Option<ImagePayload>,
    ) -> ChatResult<SubmitOutcome> {
        if text.trim().is_empty() && image.is_none() {
            return Ok(SubmitOutcome::Ignored);
        }

        if self.session.is_responding() {
            tracing::debug!("ignoring submit while a reply is streaming");
            return Ok(SubmitOutcome::Busy);
        }

        let history = self.session.history_turns();
        self.session.set_responding(true, &self.events);

        if let Err(error) = self.post_user_messages(text, image.as_ref()) {
            self.session.set_responding(false, &self.events);
            return Err(error);
        }

        let aggregator = ResponseAggregator::begin(&mut self.session, &self.events);
        let fragments = self
            .adapter
            .send_message_stream(&history, text, image)
            .await;
        let message_id = aggregator.consume(fragments).await;

        Ok(SubmitOutcome::Replied(message_id))
    }

    fn post_user_messages(&mut self, text: &str, image: Option<&ImagePayload>) -> ChatResult<()> {
        let participant = self.session.participant().clone();

        if let Some(image) = image {
            self.post(Message::image_from(&participant, image))?;
        }
        if !text.trim().is_empty() {
            self.post(Message::text_from(&participant, text))?;
        }

        Ok(())
    }

    fn post(&mut self, message: Message) -> ChatResult<()> {
        self.session
            .store_mut()
            .append(message.clone())
            .context(StoreSnafu {
                stage: "post-user-message",
            })?;
        self.events.emit(RoomEvent::MessageAppended(message));
        Ok(())
    }

    pub fn export(&self) -> ChatExport {
        ChatExport::capture(self.session.messages())
    }

    /// Logs out, discarding the history.
    pub fn leave(self) -> Participant {
        self.session.end()
    }
}
