use futures::StreamExt;

use anonroom_llm::FragmentStream;

use crate::events::{EventSink, RoomEvent};
use crate::message::{Message, MessageId, MessagePatch};
use crate::session::Session;

/// Content shown when a reply stream breaks mid-way.
pub const RESPONSE_FAILURE_TEXT: &str = "Error processing response.";

/// Materializes one AI reply into the session, one fragment at a time.
///
/// The placeholder is appended by [`ResponseAggregator::begin`], before any
/// fragment exists. Every exit path, including dropping the aggregator while a
/// fragment is still awaited, finalizes the placeholder and clears the
/// session's responding flag.
pub struct ResponseAggregator<'a> {
    session: &'a mut Session,
    events: &'a EventSink,
    message_id: MessageId,
    accumulated: String,
    finished: bool,
}

impl<'a> ResponseAggregator<'a> {
    pub fn begin(session: &'a mut Session, events: &'a EventSink) -> Self {
        let placeholder = Message::bot_placeholder();
        let message_id = placeholder.id;

        match session.store_mut().append(placeholder.clone()) {
            Ok(_) => events.emit(RoomEvent::MessageAppended(placeholder)),
            Err(error) => {
                tracing::error!(message_id = %message_id, error = %error, "failed to append reply placeholder");
            }
        }

        Self {
            session,
            events,
            message_id,
            accumulated: String::new(),
            finished: false,
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Drains `fragments` into the placeholder and returns its id once finalized.
    pub async fn consume(mut self, mut fragments: FragmentStream) -> MessageId {
        let mut fragment_count = 0_usize;

        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    fragment_count += 1;
                    self.accumulated.push_str(&fragment);
                    self.apply(MessagePatch::content(self.accumulated.clone()));
                }
                Err(error) => {
                    tracing::warn!(
                        message_id = %self.message_id,
                        fragment_count,
                        error = %error,
                        "reply stream failed while consuming fragments"
                    );
                    self.finish(MessagePatch::finalize_with(RESPONSE_FAILURE_TEXT));
                    return self.message_id;
                }
            }
        }

        tracing::debug!(
            message_id = %self.message_id,
            fragment_count,
            reply_len = self.accumulated.len(),
            "reply stream finished"
        );
        self.finish(MessagePatch::finalize());
        self.message_id
    }

    fn apply(&mut self, patch: MessagePatch) {
        match self.session.store_mut().update(self.message_id, patch) {
            Ok(message) => self.events.emit(RoomEvent::MessageUpdated(message)),
            Err(error) => {
                tracing::error!(message_id = %self.message_id, error = %error, "failed to update reply");
            }
        }
    }

    fn finish(&mut self, patch: MessagePatch) {
        self.finished = true;
        self.apply(patch);
        self.session.set_responding(false, self.events);
    }
}

impl Drop for ResponseAggregator<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        tracing::warn!(
            message_id = %self.message_id,
            "reply aggregation abandoned before the stream ended"
        );
        self.finish(MessagePatch::finalize_with(RESPONSE_FAILURE_TEXT));
    }
}

#[cfg(test)]
mod tests {
    use anonroom_llm::{ProviderError, ProviderResult};
    use futures::FutureExt;
    use tokio::sync::mpsc;

    use super::*;
    use crate::message::Participant;

    fn responding_session(events: &EventSink) -> Session {
        let mut session = Session::start(Participant::login("ghost").unwrap());
        session.set_responding(true, events);
        session
    }

    fn fragments(items: &[&str]) -> FragmentStream {
        let items = items
            .iter()
            .map(|item| Ok(item.to_string()))
            .collect::<Vec<ProviderResult<String>>>();
        futures::stream::iter(items).boxed()
    }

    fn failing_after(items: &[&str]) -> FragmentStream {
        let mut items = items
            .iter()
            .map(|item| Ok(item.to_string()))
            .collect::<Vec<ProviderResult<String>>>();
        items.push(Err(ProviderError::Transport {
            stage: "test-stream",
            message: "connection reset".to_string(),
        }));
        futures::stream::iter(items).boxed()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn final_content_is_the_concatenation_of_fragments() {
        let cases: [&[&str]; 4] = [
            &[],
            &["hello"],
            &["he", "llo", " ", "world"],
            &["lol", " nice ", "pic", " 🎉"],
        ];

        for case in cases {
            let events = EventSink::detached();
            let mut session = responding_session(&events);

            let id = ResponseAggregator::begin(&mut session, &events)
                .consume(fragments(case))
                .await;

            let message = session.store().get(id).unwrap();
            assert_eq!(message.content, case.concat());
            assert!(!message.is_pending);
            assert!(!session.is_responding());
        }
    }

    #[tokio::test]
    async fn placeholder_is_observable_before_the_first_fragment() {
        let (events, mut rx) = EventSink::channel();
        let mut session = responding_session(&events);
        drain(&mut rx);

        let aggregator = ResponseAggregator::begin(&mut session, &events);
        let id = aggregator.message_id();

        let before = drain(&mut rx);
        assert!(matches!(
            before.as_slice(),
            [RoomEvent::MessageAppended(message)]
                if message.id == id && message.is_pending && message.content.is_empty()
        ));

        aggregator.consume(fragments(&["a", "b", "c"])).await;

        let updates = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                RoomEvent::MessageUpdated(message) => Some((message.content, message.is_pending)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            updates,
            vec![
                ("a".to_string(), true),
                ("ab".to_string(), true),
                ("abc".to_string(), true),
                ("abc".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn failure_replaces_partial_content_with_failure_text() {
        for prefix in [&[][..], &["par"][..], &["par", "tial"][..]] {
            let (events, mut rx) = EventSink::channel();
            let mut session = responding_session(&events);

            let id = ResponseAggregator::begin(&mut session, &events)
                .consume(failing_after(prefix))
                .await;

            let message = session.store().get(id).unwrap();
            assert_eq!(message.content, RESPONSE_FAILURE_TEXT);
            assert!(!message.is_pending);
            assert!(!session.is_responding());
            assert_eq!(
                drain(&mut rx).last(),
                Some(&RoomEvent::RespondingChanged(false))
            );
        }
    }

    #[tokio::test]
    async fn dropping_mid_stream_finalizes_the_placeholder() {
        let events = EventSink::detached();
        let mut session = responding_session(&events);

        let stalled: FragmentStream = futures::stream::iter(vec![Ok("typing".to_string())])
            .chain(futures::stream::pending())
            .boxed();
        let id = {
            let aggregator = ResponseAggregator::begin(&mut session, &events);
            let id = aggregator.message_id();
            let mut consume = Box::pin(aggregator.consume(stalled));
            assert!((&mut consume).now_or_never().is_none());
            id
        };

        let message = session.store().get(id).unwrap();
        assert_eq!(message.content, RESPONSE_FAILURE_TEXT);
        assert!(!message.is_pending);
        assert!(!session.is_responding());
    }
}
