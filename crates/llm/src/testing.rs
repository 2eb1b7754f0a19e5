//! Scripted in-memory transport for exercising the chat pipeline without network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;

use super::provider::{
    BoxFuture, ChatSession, ChatTransport, FragmentStream, HistoryTurn, ProviderError,
    ProviderResult, TurnRequest,
};

/// What the transport does for one send, consumed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Streams every fragment, then ends cleanly.
    Fragments(Vec<String>),
    /// Streams every fragment, then yields an error item.
    FailAfter(Vec<String>),
    /// Refuses to start the stream.
    RejectSend,
}

impl ScriptedReply {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(fragments.into_iter().map(Into::into).collect())
    }

    pub fn fail_after<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FailAfter(fragments.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    replies: VecDeque<ScriptedReply>,
    failing_opens: usize,
    sessions_opened: usize,
    seeds: Vec<Vec<HistoryTurn>>,
    system_instructions: Vec<String>,
    requests: Vec<TurnRequest>,
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                replies: replies.into_iter().collect(),
                ..ScriptState::default()
            })),
        }
    }

    /// Read side of the script, usable after the transport moved into an adapter.
    pub fn probe(&self) -> ScriptProbe {
        ScriptProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl ChatTransport for ScriptedTransport {
    type Session = ScriptedSession;

    fn id(&self) -> &str {
        "scripted"
    }

    fn open_session(
        &self,
        system_instruction: &str,
        history: Vec<HistoryTurn>,
    ) -> ProviderResult<ScriptedSession> {
        let mut state = lock(&self.state);
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(ProviderError::Transport {
                stage: "scripted-open",
                message: "scripted open failure".to_string(),
            });
        }

        state.sessions_opened += 1;
        state.seeds.push(history);
        state.system_instructions.push(system_instruction.to_string());

        Ok(ScriptedSession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct ScriptedSession {
    state: Arc<Mutex<ScriptState>>,
}

impl ChatSession for ScriptedSession {
    fn send_message_stream(
        &mut self,
        request: TurnRequest,
    ) -> BoxFuture<'_, ProviderResult<FragmentStream>> {
        Box::pin(async move {
            let reply = {
                let mut state = lock(&self.state);
                state.requests.push(request);
                state.replies.pop_front()
            };

            match reply {
                Some(ScriptedReply::Fragments(fragments)) => {
                    Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
                }
                Some(ScriptedReply::FailAfter(fragments)) => {
                    let failure = ProviderError::Transport {
                        stage: "scripted-stream",
                        message: "scripted stream failure".to_string(),
                    };
                    let items = fragments
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(failure)));
                    Ok(futures::stream::iter(items).boxed())
                }
                Some(ScriptedReply::RejectSend) => Err(ProviderError::Transport {
                    stage: "scripted-send",
                    message: "scripted send rejection".to_string(),
                }),
                None => Err(ProviderError::Transport {
                    stage: "scripted-send",
                    message: "script exhausted".to_string(),
                }),
            }
        })
    }
}

#[derive(Clone)]
pub struct ScriptProbe {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptProbe {
    /// Makes the next `count` session opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        lock(&self.state).failing_opens = count;
    }

    pub fn sessions_opened(&self) -> usize {
        lock(&self.state).sessions_opened
    }

    pub fn seeds(&self) -> Vec<Vec<HistoryTurn>> {
        lock(&self.state).seeds.clone()
    }

    pub fn system_instructions(&self) -> Vec<String> {
        lock(&self.state).system_instructions.clone()
    }

    pub fn requests(&self) -> Vec<TurnRequest> {
        lock(&self.state).requests.clone()
    }
}
