use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anonroom_chat::{Message, MessageId, MessageKind, RoomEvent};
use chrono::Local;
use tokio::sync::mpsc;

pub const HELP_TEXT: &str = "\
Commands:
  /image <path> [caption]  share an image, optionally with a caption
  /save [dir]              export the chat history as JSON
  /help                    show this list
  /quit                    leave the room
Anything else is sent as a chat message.";

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Image { path: PathBuf, caption: String },
    Save(Option<PathBuf>),
    Help,
    Quit,
    /// A slash command that could not be understood; carries a hint.
    Invalid(String),
}

impl Command {
    /// Parses a line, or returns `None` when there is nothing to do.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let Some(command) = trimmed.strip_prefix('/') else {
            return Some(Self::Say(line.trim_end_matches(['\r', '\n']).to_string()));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        let parsed = match name {
            "image" | "img" => {
                if rest.is_empty() {
                    Self::Invalid("usage: /image <path> [caption]".to_string())
                } else {
                    let (path, caption) = rest
                        .split_once(char::is_whitespace)
                        .map(|(path, caption)| (path, caption.trim()))
                        .unwrap_or((rest, ""));
                    Self::Image {
                        path: PathBuf::from(path),
                        caption: caption.to_string(),
                    }
                }
            }
            "save" | "export" => Self::Save((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "help" | "?" => Self::Help,
            "quit" | "exit" | "logout" => Self::Quit,
            other => Self::Invalid(format!("unknown command `/{other}`, try /help")),
        };

        Some(parsed)
    }
}

/// Prints room events as a running transcript.
///
/// Streaming replies are written incrementally: each update prints only the
/// text added since the previous one.
pub struct Renderer<W: Write> {
    out: W,
    streaming: HashMap<MessageId, String>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            streaming: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, event: &RoomEvent) -> io::Result<()> {
        match event {
            RoomEvent::MessageAppended(message) => self.appended(message)?,
            RoomEvent::MessageUpdated(message) => self.updated(message)?,
            RoomEvent::RespondingChanged(_) => {}
        }
        self.out.flush()
    }

    /// Prints a front-end notice, such as a save confirmation.
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "-- {text}")?;
        self.out.flush()
    }

    fn appended(&mut self, message: &Message) -> io::Result<()> {
        if message.is_system() {
            return writeln!(self.out, "*** {} ***", message.content);
        }

        write!(self.out, "{}", header(message))?;
        if message.is_pending {
            self.streaming.insert(message.id, message.content.clone());
            return write!(self.out, "{}", message.content);
        }

        writeln!(self.out, "{}", body(message))
    }

    fn updated(&mut self, message: &Message) -> io::Result<()> {
        let Some(printed) = self.streaming.get_mut(&message.id) else {
            return writeln!(self.out, "{}{}", header(message), body(message));
        };

        match message.content.strip_prefix(printed.as_str()) {
            Some(suffix) => write!(self.out, "{suffix}")?,
            // Content was replaced, e.g. by the failure notice.
            None => write!(self.out, "\n{}{}", header(message), message.content)?,
        }
        printed.clone_from(&message.content);

        if !message.is_pending {
            self.streaming.remove(&message.id);
            writeln!(self.out)?;
        }
        Ok(())
    }
}

/// Writes room events and notices until both channels close.
///
/// Pending room events always win over notices, so a notice sent after
/// `submit` returns lands after the reply it follows.
pub async fn drain_output<W: Write>(
    renderer: &mut Renderer<W>,
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    mut notices: mpsc::UnboundedReceiver<String>,
) -> io::Result<()> {
    loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => renderer.render(&event)?,
            Some(text) = notices.recv() => renderer.notice(&text)?,
            else => return Ok(()),
        }
    }
}

fn header(message: &Message) -> String {
    format!(
        "[{}] {}: ",
        message.created_at.with_timezone(&Local).format("%H:%M"),
        message.display_name
    )
}

fn body(message: &Message) -> String {
    match message.kind {
        MessageKind::Image => describe_image(&message.content),
        MessageKind::Text | MessageKind::System => message.content.clone(),
    }
}

/// Summarizes an inline data URL instead of dumping its base64 payload.
fn describe_image(content: &str) -> String {
    let media_type = content
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(';'))
        .map(|(media_type, _)| media_type)
        .unwrap_or("image");
    format!("<shared an image: {media_type}>")
}

#[cfg(test)]
mod tests {
    use anonroom_chat::Participant;
    use anonroom_llm::ImagePayload;

    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(
            Command::parse("hello there\n"),
            Some(Command::Say("hello there".to_string()))
        );
        assert_eq!(
            Command::parse("/image cat.png look at him"),
            Some(Command::Image {
                path: PathBuf::from("cat.png"),
                caption: "look at him".to_string(),
            })
        );
        assert_eq!(
            Command::parse("/image cat.png"),
            Some(Command::Image {
                path: PathBuf::from("cat.png"),
                caption: String::new(),
            })
        );
        assert_eq!(Command::parse("/save"), Some(Command::Save(None)));
        assert_eq!(
            Command::parse("/save  out/dir "),
            Some(Command::Save(Some(PathBuf::from("out/dir"))))
        );
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/quit"), Some(Command::Quit));
    }

    #[test]
    fn rejects_incomplete_or_unknown_commands() {
        assert!(matches!(Command::parse("/image"), Some(Command::Invalid(_))));
        assert!(matches!(Command::parse("/dance"), Some(Command::Invalid(hint)) if hint.contains("/dance")));
    }

    fn render_all(events: &[RoomEvent]) -> String {
        let mut renderer = Renderer::new(Vec::new());
        for event in events {
            renderer.render(event).unwrap();
        }
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn patched(message: &Message, content: &str, is_pending: bool) -> Message {
        let mut message = message.clone();
        message.content = content.to_string();
        message.is_pending = is_pending;
        message
    }

    #[test]
    fn streams_only_the_new_suffix() {
        let placeholder = Message::bot_placeholder();
        let output = render_all(&[
            RoomEvent::MessageAppended(placeholder.clone()),
            RoomEvent::MessageUpdated(patched(&placeholder, "he", true)),
            RoomEvent::MessageUpdated(patched(&placeholder, "hey", true)),
            RoomEvent::MessageUpdated(patched(&placeholder, "hey there", false)),
        ]);

        assert!(output.ends_with("GeminiBot: hey there\n"));
        assert_eq!(output.matches("hey").count(), 1);
    }

    #[test]
    fn replaced_content_is_printed_on_a_new_line() {
        let placeholder = Message::bot_placeholder();
        let output = render_all(&[
            RoomEvent::MessageAppended(placeholder.clone()),
            RoomEvent::MessageUpdated(patched(&placeholder, "hal", true)),
            RoomEvent::MessageUpdated(patched(&placeholder, "Error processing response.", false)),
        ]);

        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("GeminiBot: hal"));
        assert!(lines[1].ends_with("GeminiBot: Error processing response."));
    }

    #[test]
    fn system_and_image_messages_are_summarized() {
        let participant = Participant::login("ghost").unwrap();
        let image =
            ImagePayload::from_bytes(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();

        let output = render_all(&[
            RoomEvent::MessageAppended(Message::system("welcome")),
            RoomEvent::MessageAppended(Message::image_from(&participant, &image)),
            RoomEvent::RespondingChanged(true),
        ]);

        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "*** welcome ***");
        assert!(lines[1].ends_with("ghost: <shared an image: image/png>"));
        assert!(!output.contains("base64"));
    }

    #[tokio::test]
    async fn notices_follow_the_reply_they_were_sent_after() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let placeholder = Message::bot_placeholder();

        for event in [
            RoomEvent::MessageAppended(placeholder.clone()),
            RoomEvent::MessageUpdated(patched(&placeholder, "hey", true)),
            RoomEvent::MessageUpdated(patched(&placeholder, "hey there", false)),
        ] {
            event_tx.send(event).unwrap();
        }
        notice_tx.send("history saved".to_string()).unwrap();
        drop(event_tx);
        drop(notice_tx);

        let mut renderer = Renderer::new(Vec::new());
        drain_output(&mut renderer, event_rx, notice_rx)
            .await
            .unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();

        assert!(output.ends_with("GeminiBot: hey there\n-- history saved\n"));
    }
}
