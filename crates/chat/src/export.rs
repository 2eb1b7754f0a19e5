use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{
    ChatResult, CreateExportDirSnafu, ParseExportSnafu, RenameExportSnafu, SerializeExportSnafu,
    WriteExportSnafu,
};
use crate::message::Message;

pub const EXPORT_ROOM_NAME: &str = "AnonChat Session";

/// User-requested snapshot of the room history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExport {
    pub room_name: String,
    pub exported_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl ChatExport {
    pub fn capture(messages: &[Message]) -> Self {
        Self {
            room_name: EXPORT_ROOM_NAME.to_string(),
            exported_at: Utc::now(),
            messages: messages.to_vec(),
        }
    }

    pub fn to_json(&self) -> ChatResult<String> {
        serde_json::to_string_pretty(self).context(SerializeExportSnafu {
            stage: "serialize-export-json",
        })
    }

    pub fn from_json(raw: &str) -> ChatResult<Self> {
        serde_json::from_str(raw).context(ParseExportSnafu {
            stage: "parse-export-json",
        })
    }

    pub fn file_name(&self) -> String {
        format!(
            "anon_chat_history_{}.json",
            self.exported_at.timestamp_millis()
        )
    }

    /// Writes the export into `directory` and returns the final path.
    pub fn write_to_dir(&self, directory: &Path) -> ChatResult<PathBuf> {
        std::fs::create_dir_all(directory).context(CreateExportDirSnafu {
            stage: "create-export-directory",
            path: directory.to_path_buf(),
        })?;

        let content = self.to_json()?;
        let path = directory.join(self.file_name());
        let temp_path = path.with_extension("json.tmp");

        std::fs::write(&temp_path, content).context(WriteExportSnafu {
            stage: "write-temporary-export-file",
            path: temp_path.clone(),
        })?;
        if let Err(source) = std::fs::rename(&temp_path, &path) {
            if let Err(error) = std::fs::remove_file(&temp_path) {
                tracing::warn!(path = ?temp_path, error = %error, "failed to remove temporary export file");
            }
            return Err(source).context(RenameExportSnafu {
                stage: "rename-temporary-export-file",
                from: temp_path,
                to: path,
            });
        }

        tracing::info!(path = ?path, message_count = self.messages.len(), "exported chat history");
        Ok(path)
    }
}
