use futures::StreamExt;

use super::media::ImagePayload;
use super::provider::{
    ChatSession, ChatTransport, FragmentStream, HistoryTurn, ProviderResult, TurnRequest,
};

/// Reply used when no API key was configured.
pub const MISSING_CREDENTIAL_REPLY: &str = "Error: API Key missing.";

/// Reply used when a send could not be started.
pub const TRANSPORT_FALLBACK_REPLY: &str = "Sorry, I lagged out for a sec. What was that?";

/// Behavioral prompt for the AI participant.
pub const SYSTEM_INSTRUCTION: &str = "\
You are \"GeminiBot\", a participant in a casual, anonymous online chat room.
Your role is to be a friendly, witty, and engaging chat member.
DO NOT act like a customer support agent or a formal AI assistant.
Adopt a casual internet chat style. Use slang occasionally if appropriate (like 'lol', 'nice', 'cool').
Keep responses relatively short and punchy, like real chat messages.
If a user shares an image, you MUST react to it enthusiastically or ask a question about it.
You can see the chat history. Respond to the context of the conversation.";

/// Turns chat submissions into reply fragment streams.
///
/// Owns at most one transport session at a time. A failed send replaces the
/// session wholesale; callers only ever see fragments, never transport errors.
pub struct StreamingAdapter<T: ChatTransport> {
    transport: Option<T>,
    system_instruction: String,
    session: Option<T::Session>,
}

impl<T: ChatTransport> StreamingAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Some(transport),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            session: None,
        }
    }

    /// An adapter without credentials; every send answers with [`MISSING_CREDENTIAL_REPLY`].
    pub fn unconfigured() -> Self {
        Self {
            transport: None,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            session: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Starts a reply for `text` (and `image`, if any).
    ///
    /// `history` seeds a session only when one has to be opened; a live session
    /// already remembers the conversation.
    pub async fn send_message_stream(
        &mut self,
        history: &[HistoryTurn],
        text: &str,
        image: Option<ImagePayload>,
    ) -> FragmentStream {
        let Some(transport) = self.transport.as_ref() else {
            tracing::warn!("no API key configured, answering with the static fallback");
            return single_fragment(MISSING_CREDENTIAL_REPLY);
        };

        let request = TurnRequest::new(text, image);
        let has_image = request.image.is_some();

        let result = match Self::open_or_reuse(
            transport,
            &mut self.session,
            &self.system_instruction,
            history,
        ) {
            Ok(session) => session.send_message_stream(request).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(fragments) => {
                tracing::debug!(
                    transport = transport.id(),
                    has_image,
                    "reply stream started"
                );
                fragments
            }
            Err(error) => {
                tracing::error!(
                    transport = transport.id(),
                    error = %error,
                    "failed to start reply stream, re-initializing chat session"
                );
                self.session =
                    match transport.open_session(&self.system_instruction, history.to_vec()) {
                        Ok(session) => Some(session),
                        Err(error) => {
                            tracing::warn!(
                                error = %error,
                                "chat session re-initialization failed, will retry on next send"
                            );
                            None
                        }
                    };
                single_fragment(TRANSPORT_FALLBACK_REPLY)
            }
        }
    }

    fn open_or_reuse<'s>(
        transport: &T,
        slot: &'s mut Option<T::Session>,
        system_instruction: &str,
        history: &[HistoryTurn],
    ) -> ProviderResult<&'s mut T::Session> {
        let session = match slot.take() {
            Some(session) => session,
            None => transport.open_session(system_instruction, history.to_vec())?,
        };
        Ok(slot.insert(session))
    }
}

fn single_fragment(text: &str) -> FragmentStream {
    futures::stream::once(futures::future::ready(Ok(text.to_string()))).boxed()
}
