use snafu::{OptionExt, Snafu, ensure};

use crate::message::{Message, MessageId, MessagePatch};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("message '{id}' already exists"))]
    DuplicateId { stage: &'static str, id: MessageId },
    #[snafu(display("system message '{id}' cannot be streamed"))]
    PendingSystemMessage { stage: &'static str, id: MessageId },
    #[snafu(display("message '{id}' was not found"))]
    NotFound { stage: &'static str, id: MessageId },
    #[snafu(display("message '{id}' is finalized and cannot change"))]
    Finalized { stage: &'static str, id: MessageId },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only, creation-ordered message log for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) -> StoreResult<MessageId> {
        let id = message.id;
        ensure!(
            !(message.is_system() && message.is_pending),
            PendingSystemMessageSnafu {
                stage: "append-message",
                id,
            }
        );
        ensure!(
            self.get(id).is_none(),
            DuplicateIdSnafu {
                stage: "append-message",
                id,
            }
        );

        self.messages.push(message);
        Ok(id)
    }

    /// Applies `patch` to a message that is still pending and returns the new state.
    pub fn update(&mut self, id: MessageId, patch: MessagePatch) -> StoreResult<Message> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id == id)
            .context(NotFoundSnafu {
                stage: "update-message",
                id,
            })?;
        ensure!(
            message.is_pending,
            FinalizedSnafu {
                stage: "update-message",
                id,
            }
        );

        if let Some(content) = patch.content {
            message.content = content;
        }
        if let Some(is_pending) = patch.is_pending {
            message.is_pending = is_pending;
        }

        Ok(message.clone())
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
