use std::path::PathBuf;

use snafu::Snafu;

use crate::store::StoreError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("message store rejected a change on `{stage}`: {source}"))]
    Store {
        stage: &'static str,
        source: StoreError,
    },
    #[snafu(display("failed to serialize chat export on `{stage}`: {source}"))]
    SerializeExport {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to parse chat export on `{stage}`: {source}"))]
    ParseExport {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to create export directory at {path:?} on `{stage}`: {source}"))]
    CreateExportDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to write export file at {path:?} on `{stage}`: {source}"))]
    WriteExport {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to move export from {from:?} to {to:?} on `{stage}`: {source}"))]
    RenameExport {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;
