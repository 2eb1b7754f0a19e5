use std::io::Write;

use anonroom_chat::{ChatRoom, EventSink, Participant, SubmitOutcome};
use anonroom_llm::{ChatTransport, ImagePayload};
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use crate::error::{AppResult, ReadInputSnafu, RendererSnafu, SettingsSnafu, WriteOutputSnafu};
use crate::settings::RoomSettings;
use crate::terminal::{Command, HELP_TEXT, Renderer, drain_output};

type InputLines = Lines<BufReader<Stdin>>;

/// Queues notices behind the room events already sent to the renderer.
struct Console {
    notices: mpsc::UnboundedSender<String>,
}

impl Console {
    fn notice(&self, text: impl Into<String>) {
        let _ = self.notices.send(text.into());
    }
}

/// Runs one login: pick a name, chat until `/quit` or end of input.
pub async fn run() -> AppResult<()> {
    let settings = RoomSettings::load().context(SettingsSnafu {
        stage: "load-room-settings",
    })?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let Some(participant) = prompt_login(&mut lines).await? else {
        return Ok(());
    };

    let adapter = anonroom_llm::gemini_adapter(settings.to_provider_config());
    if !adapter.is_configured() {
        notice("no API key configured, set GEMINI_API_KEY to wake the bot up")?;
    }

    let (events, event_rx) = EventSink::channel();
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(async move {
        let mut renderer = Renderer::new(std::io::stdout());
        drain_output(&mut renderer, event_rx, notice_rx)
            .await
            .context(WriteOutputSnafu {
                stage: "render-room-output",
            })
    });
    let console = Console { notices: notice_tx };
    let mut room = ChatRoom::join(participant, adapter, events);

    while let Some(line) = lines.next_line().await.context(ReadInputSnafu {
        stage: "read-chat-line",
    })? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };

        match command {
            Command::Say(text) => submit(&mut room, &console, &text, None).await,
            Command::Image { path, caption } => match ImagePayload::from_file(&path) {
                Ok(image) => submit(&mut room, &console, &caption, Some(image)).await,
                Err(error) => {
                    console.notice(format!("could not attach {}: {error}", path.display()))
                }
            },
            Command::Save(directory) => {
                let directory = directory.unwrap_or_else(|| settings.export_directory());
                match room.export().write_to_dir(&directory) {
                    Ok(path) => console.notice(format!("history saved to {}", path.display())),
                    Err(error) => {
                        tracing::error!(error = %error, "chat export failed");
                        console.notice(format!("could not save history: {error}"));
                    }
                }
            }
            Command::Help => console.notice(HELP_TEXT),
            Command::Invalid(hint) => console.notice(hint),
            Command::Quit => break,
        }
    }

    // Dropping both senders lets the renderer drain and exit.
    let participant = room.leave();
    drop(console);
    tracing::info!(participant_id = %participant.id, "left the room");

    renderer.await.context(RendererSnafu {
        stage: "join-transcript-renderer",
    })?
}

async fn prompt_login(lines: &mut InputLines) -> AppResult<Option<Participant>> {
    loop {
        prompt("Pick a display name: ")?;
        let Some(line) = lines.next_line().await.context(ReadInputSnafu {
            stage: "read-display-name",
        })?
        else {
            return Ok(None);
        };

        if let Some(participant) = Participant::login(&line) {
            return Ok(Some(participant));
        }
        notice("a display name needs at least one visible character")?;
    }
}

async fn submit<T: ChatTransport>(
    room: &mut ChatRoom<T>,
    console: &Console,
    text: &str,
    image: Option<ImagePayload>,
) {
    match room.submit(text, image).await {
        Ok(SubmitOutcome::Busy) => console.notice("still answering the last one, hang on"),
        Ok(SubmitOutcome::Ignored | SubmitOutcome::Replied(_)) => {}
        Err(error) => {
            tracing::error!(error = %error, "failed to post message");
            console.notice(format!("message not sent: {error}"));
        }
    }
}

/// Writes straight to stdout; only used before the renderer starts.
fn notice(text: &str) -> AppResult<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "-- {text}").context(WriteOutputSnafu {
        stage: "write-notice",
    })
}

fn prompt(text: &str) -> AppResult<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "{text}")
        .and_then(|()| out.flush())
        .context(WriteOutputSnafu {
            stage: "write-prompt",
        })
}
