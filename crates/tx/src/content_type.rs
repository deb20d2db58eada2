//! Content type detection by magic numbers
//!
//! Sniffing is delegated to [`infer`], which knows the signatures of common
//! image, audio, video, archive, document and font formats. Anything it does
//! not recognize is [`OCTET_STREAM`].
//!
//! ## Example Usage
//!
//! ```
//! use permakey_tx::content_type::{OCTET_STREAM, detect};
//!
//! assert_eq!(detect(b"\x89PNG\r\n\x1a\n....").mime, "image/png");
//! assert_eq!(detect(b"plain words").mime, OCTET_STREAM);
//! ```

/// Fallback MIME type.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A detected content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentType {
    /// MIME type for the `Content-Type` tag.
    pub mime: &'static str,
    /// Conventional file extension.
    pub extension: &'static str,
}

impl ContentType {
    const fn new(mime: &'static str, extension: &'static str) -> Self {
        Self { mime, extension }
    }

    /// The generic binary type.
    pub const fn octet_stream() -> Self {
        Self::new(OCTET_STREAM, "bin")
    }

    /// Returns true when no signature matched.
    pub fn is_fallback(&self) -> bool {
        self.mime == OCTET_STREAM
    }
}

impl From<infer::Type> for ContentType {
    fn from(kind: infer::Type) -> Self {
        Self::new(kind.mime_type(), kind.extension())
    }
}

/// Detects the content type of `data`.
pub fn detect(data: &[u8]) -> ContentType {
    infer::get(data).map_or_else(ContentType::octet_stream, ContentType::from)
}
