use std::sync::Arc;

use futures::{Stream, StreamExt};
use rig::OneOrMany;
use rig::completion::message::{ImageMediaType as RigImageMediaType, UserContent};
use rig::completion::{CompletionError, CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use tokio::sync::{Mutex, mpsc};

use super::media::{ImageMediaType, ImagePayload};
use super::provider::{
    BoxFuture, ChatSession, ChatTransport, CompletionsFailedSnafu, FragmentStream, HistoryTurn,
    HttpClientSnafu, MissingApiKeySnafu, ProviderConfig, ProviderError, ProviderResult, Role,
    TurnRequest,
};

pub const RIG_GEMINI_TRANSPORT_ID: &str = "gemini";

/// Gemini chat transport backed by rig's provider client.
pub struct RigGeminiTransport {
    config: ProviderConfig,
}

impl RigGeminiTransport {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            config.has_credential(),
            MissingApiKeySnafu {
                stage: "rig-gemini-new",
            }
        );

        Ok(Self { config })
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<gemini::Client> {
        let mut builder = gemini::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_rig_message(turn: &HistoryTurn) -> RigMessage {
        match turn.role {
            Role::User => RigMessage::user(turn.content.clone()),
            Role::Assistant => RigMessage::assistant(turn.content.clone()),
        }
    }
}

impl ChatTransport for RigGeminiTransport {
    type Session = RigChatSession;

    fn id(&self) -> &str {
        RIG_GEMINI_TRANSPORT_ID
    }

    fn open_session(
        &self,
        system_instruction: &str,
        history: Vec<HistoryTurn>,
    ) -> ProviderResult<RigChatSession> {
        let client = Self::build_client(&self.config)?;
        let memory = history.iter().map(Self::to_rig_message).collect::<Vec<_>>();

        tracing::debug!(
            model_id = %self.config.model_id,
            seeded_turns = memory.len(),
            "opened gemini chat session"
        );

        Ok(RigChatSession {
            client,
            model_id: self.config.model_id.clone(),
            preamble: system_instruction.to_string(),
            memory: Arc::new(Mutex::new(memory)),
        })
    }
}

/// One Gemini conversation. Rig requests are stateless, so the session carries
/// its own turn memory and replays it on every send.
pub struct RigChatSession {
    client: gemini::Client,
    model_id: String,
    preamble: String,
    memory: Arc<Mutex<Vec<RigMessage>>>,
}

impl RigChatSession {
    fn to_rig_media_type(media_type: ImageMediaType) -> RigImageMediaType {
        match media_type {
            ImageMediaType::Jpeg => RigImageMediaType::JPEG,
            ImageMediaType::Png => RigImageMediaType::PNG,
            ImageMediaType::Gif => RigImageMediaType::GIF,
            ImageMediaType::Webp => RigImageMediaType::WEBP,
        }
    }

    fn to_rig_prompt(text: &str, image: Option<&ImagePayload>) -> RigMessage {
        let Some(image) = image else {
            return RigMessage::user(text.to_string());
        };

        let mut content = OneOrMany::one(UserContent::text(text.to_string()));
        content.push(UserContent::image_base64(
            image.to_base64(),
            Some(Self::to_rig_media_type(image.media_type())),
            None,
        ));
        RigMessage::User { content }
    }
}

impl ChatSession for RigChatSession {
    fn send_message_stream(
        &mut self,
        request: TurnRequest,
    ) -> BoxFuture<'_, ProviderResult<FragmentStream>> {
        Box::pin(async move {
            let prompt = Self::to_rig_prompt(&request.text, request.image.as_ref());
            let prior_turns = self.memory.lock().await.clone();

            let model = self.client.completion_model(self.model_id.clone());
            let stream = model
                .completion_request(prompt.clone())
                .messages(prior_turns)
                .preamble(self.preamble.clone())
                .stream()
                .await
                .context(CompletionsFailedSnafu {
                    stage: "open-stream",
                })?;

            let (fragment_tx, fragment_rx) = mpsc::unbounded_channel::<ProviderResult<String>>();
            tokio::spawn(pump_fragments(
                stream,
                prompt,
                fragment_tx,
                Arc::clone(&self.memory),
            ));

            let fragments = futures::stream::unfold(fragment_rx, |mut fragment_rx| async move {
                fragment_rx.recv().await.map(|item| (item, fragment_rx))
            });

            Ok(fragments.boxed())
        })
    }
}

/// Forwards non-empty text deltas to `fragment_tx`.
///
/// The prompt and the full reply enter `memory` together, and only when the
/// stream ends cleanly, so turns keep alternating after a failed or abandoned
/// reply.
async fn pump_fragments<S, R>(
    mut stream: S,
    prompt: RigMessage,
    fragment_tx: mpsc::UnboundedSender<ProviderResult<String>>,
    memory: Arc<Mutex<Vec<RigMessage>>>,
) where
    S: Stream<Item = Result<StreamedAssistantContent<R>, CompletionError>> + Unpin,
    R: Clone + Unpin,
{
    let mut reply = String::new();

    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamedAssistantContent::Text(text)) => {
                if text.text.is_empty() {
                    continue;
                }
                reply.push_str(&text.text);
                if fragment_tx.send(Ok(text.text)).is_err() {
                    tracing::debug!("fragment receiver dropped, abandoning stream");
                    return;
                }
            }
            // Reasoning, tool calls and usage summaries never reach the chat.
            Ok(_) => {}
            Err(source) => {
                tracing::warn!(error = %source, "gemini stream emitted an error chunk");
                let _ = fragment_tx.send(Err(ProviderError::CompletionsFailed {
                    stage: "stream-chunk",
                    source,
                }));
                return;
            }
        }
    }

    let mut memory = memory.lock().await;
    memory.push(prompt);
    memory.push(RigMessage::assistant(reply));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_requires_an_api_key() {
        let config = ProviderConfig::new("  ", "", "");
        assert!(matches!(
            RigGeminiTransport::new(config),
            Err(ProviderError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn blank_model_falls_back_to_default() {
        let transport = RigGeminiTransport::new(ProviderConfig::new("key", "", " ")).unwrap();
        assert_eq!(transport.model_id(), crate::DEFAULT_GEMINI_MODEL);
        assert_eq!(transport.id(), RIG_GEMINI_TRANSPORT_ID);
    }

    #[test]
    fn image_prompt_carries_text_and_image_parts() {
        let image = ImagePayload::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let text_only = RigChatSession::to_rig_prompt("hi", None);
        assert!(matches!(text_only, RigMessage::User { ref content } if content.len() == 1));

        let with_image = RigChatSession::to_rig_prompt("hi", Some(&image));
        assert!(matches!(with_image, RigMessage::User { ref content } if content.len() == 2));
    }

    fn collect_forwarded(
        mut fragment_rx: mpsc::UnboundedReceiver<ProviderResult<String>>,
    ) -> Vec<ProviderResult<String>> {
        let mut forwarded = Vec::new();
        while let Ok(item) = fragment_rx.try_recv() {
            forwarded.push(item);
        }
        forwarded
    }

    #[tokio::test]
    async fn pump_forwards_text_only_and_records_the_exchange() {
        let items: Vec<Result<StreamedAssistantContent<()>, CompletionError>> = vec![
            Ok(StreamedAssistantContent::text("")),
            Ok(StreamedAssistantContent::text("hi")),
            Ok(StreamedAssistantContent::ReasoningDelta {
                id: None,
                reasoning: "pondering".to_string(),
            }),
            Ok(StreamedAssistantContent::text(" there")),
            Ok(StreamedAssistantContent::final_response(())),
        ];
        let (fragment_tx, fragment_rx) = mpsc::unbounded_channel();
        let memory = Arc::new(Mutex::new(vec![RigMessage::user("earlier")]));

        pump_fragments(
            futures::stream::iter(items),
            RigMessage::user("hello"),
            fragment_tx,
            Arc::clone(&memory),
        )
        .await;

        let forwarded = collect_forwarded(fragment_rx)
            .into_iter()
            .map(Result::unwrap)
            .collect::<Vec<_>>();
        assert_eq!(forwarded, vec!["hi", " there"]);
        assert_eq!(
            *memory.lock().await,
            vec![
                RigMessage::user("earlier"),
                RigMessage::user("hello"),
                RigMessage::assistant("hi there"),
            ]
        );
    }

    #[tokio::test]
    async fn pump_stops_at_an_error_chunk_without_recording() {
        let items: Vec<Result<StreamedAssistantContent<()>, CompletionError>> = vec![
            Ok(StreamedAssistantContent::text("par")),
            Err(CompletionError::ResponseError("connection reset".to_string())),
            Ok(StreamedAssistantContent::text("never")),
        ];
        let (fragment_tx, fragment_rx) = mpsc::unbounded_channel();
        let memory = Arc::new(Mutex::new(Vec::new()));

        pump_fragments(
            futures::stream::iter(items),
            RigMessage::user("hello"),
            fragment_tx,
            Arc::clone(&memory),
        )
        .await;

        let forwarded = collect_forwarded(fragment_rx);
        assert_eq!(forwarded.len(), 2);
        assert!(matches!(forwarded[0].as_deref(), Ok("par")));
        assert!(matches!(
            forwarded[1],
            Err(ProviderError::CompletionsFailed {
                stage: "stream-chunk",
                ..
            })
        ));
        assert!(memory.lock().await.is_empty());
    }

    #[tokio::test]
    async fn pump_abandoned_by_its_reader_leaves_memory_untouched() {
        let items: Vec<Result<StreamedAssistantContent<()>, CompletionError>> = vec![
            Ok(StreamedAssistantContent::text("a")),
            Ok(StreamedAssistantContent::text("b")),
        ];
        let (fragment_tx, fragment_rx) = mpsc::unbounded_channel();
        drop(fragment_rx);
        let memory = Arc::new(Mutex::new(Vec::new()));

        pump_fragments(
            futures::stream::iter(items),
            RigMessage::user("hello"),
            fragment_tx,
            Arc::clone(&memory),
        )
        .await;

        assert!(memory.lock().await.is_empty());
    }
}
