use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use snafu::{ResultExt, Snafu, ensure};

/// Largest image accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMediaType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageMediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    pub fn from_mime(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detects the format from the file signature.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageMediaType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.mime())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MediaError {
    #[snafu(display("image payload is empty"))]
    EmptyImage { stage: &'static str },
    #[snafu(display("image is {size} bytes, the limit is {limit} bytes"))]
    ImageTooLarge {
        stage: &'static str,
        size: usize,
        limit: usize,
    },
    #[snafu(display("failed to read image at {path:?} on `{stage}`: {source}"))]
    ReadImage {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("image payload is not valid base64 on `{stage}`: {source}"))]
    DecodeImage {
        stage: &'static str,
        source: base64::DecodeError,
    },
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Raw image bytes tagged with their media type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    media_type: ImageMediaType,
    bytes: Vec<u8>,
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ImagePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImagePayload {
    /// Wraps raw bytes, detecting the media type from the signature.
    pub fn from_bytes(bytes: Vec<u8>) -> MediaResult<Self> {
        Self::with_declared_type(bytes, None)
    }

    pub fn from_file(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).context(ReadImageSnafu {
            stage: "read-image-file",
            path: path.to_path_buf(),
        })?;
        Self::from_bytes(bytes)
    }

    /// Parses a `data:<mime>;base64,<payload>` URL or a bare base64 string.
    pub fn from_data_url(raw: &str) -> MediaResult<Self> {
        let raw = raw.trim();
        let (declared, encoded) = match raw.split_once(',') {
            Some((header, payload)) => {
                let declared = header
                    .strip_prefix("data:")
                    .and_then(|rest| rest.split(';').next())
                    .and_then(ImageMediaType::from_mime);
                (declared, payload)
            }
            None => (None, raw),
        };

        let bytes = STANDARD.decode(encoded.trim()).context(DecodeImageSnafu {
            stage: "decode-data-url",
        })?;
        Self::with_declared_type(bytes, declared)
    }

    fn with_declared_type(bytes: Vec<u8>, declared: Option<ImageMediaType>) -> MediaResult<Self> {
        ensure!(
            !bytes.is_empty(),
            EmptyImageSnafu {
                stage: "validate-image"
            }
        );
        ensure!(
            bytes.len() <= MAX_IMAGE_BYTES,
            ImageTooLargeSnafu {
                stage: "validate-image",
                size: bytes.len(),
                limit: MAX_IMAGE_BYTES,
            }
        );

        // Signature wins over the declared type; JPEG is the last resort.
        let media_type = match ImageMediaType::sniff(&bytes).or(declared) {
            Some(media_type) => media_type,
            None => {
                tracing::debug!(
                    len = bytes.len(),
                    "unrecognized image signature, treating payload as jpeg"
                );
                ImageMediaType::Jpeg
            }
        };

        Ok(Self { media_type, bytes })
    }

    pub fn media_type(&self) -> ImageMediaType {
        self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type.mime(), self.to_base64())
    }
}
