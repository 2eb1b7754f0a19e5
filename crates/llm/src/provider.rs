use std::future::Future;
use std::pin::Pin;

use futures::stream::BoxStream;
use snafu::Snafu;

use crate::media::ImagePayload;

/// Default Gemini model used when settings leave the model blank.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Caption sent alongside an image when the user typed nothing.
pub const DEFAULT_IMAGE_PROMPT: &str = "Look at this image!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model_id: String,
}

impl ProviderConfig {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        let model_id = model_id.into().trim().to_string();
        Self {
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            model_id: if model_id.is_empty() {
                DEFAULT_GEMINI_MODEL.to_string()
            } else {
                model_id
            },
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Speaker of one prior turn handed to a freshly opened session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

impl HistoryTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One outgoing user turn: text, plus an inlined image when attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub text: String,
    pub image: Option<ImagePayload>,
}

impl TurnRequest {
    /// Builds a request, substituting [`DEFAULT_IMAGE_PROMPT`] for a blank caption
    /// when an image is attached.
    pub fn new(text: impl Into<String>, image: Option<ImagePayload>) -> Self {
        let text = text.into();
        let text = if image.is_some() && text.trim().is_empty() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            text
        };

        Self { text, image }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Forward-only sequence of reply fragments. An `Err` item ends the reply early.
pub type FragmentStream = BoxStream<'static, ProviderResult<String>>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for the chat transport"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("transport failed on `{stage}`: {message}"))]
    Transport {
        stage: &'static str,
        message: String,
    },
}

/// Factory for long-lived conversational sessions with a hosted model.
pub trait ChatTransport: Send + Sync {
    type Session: ChatSession;

    fn id(&self) -> &str;

    /// Opens a session primed with the behavioral prompt and prior turns.
    fn open_session(
        &self,
        system_instruction: &str,
        history: Vec<HistoryTurn>,
    ) -> ProviderResult<Self::Session>;
}

/// A conversation that remembers its own turns between sends.
pub trait ChatSession: Send {
    fn send_message_stream(
        &mut self,
        request: TurnRequest,
    ) -> BoxFuture<'_, ProviderResult<FragmentStream>>;
}
