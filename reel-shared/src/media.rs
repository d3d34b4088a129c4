//! Media classification and upload limits
//!

use std::path::Path;

use crate::error::ReelError;

/// Extensions the compressor re-encodes as JPEG.
pub const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".bmp"];
/// Extensions the compressor transcodes to H.264/AAC MP4.
pub const VIDEO_EXTENSIONS: [&str; 5] = [".mp4", ".mov", ".avi", ".mkv", ".webm"];

pub const IMAGE_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/jpg",
    "image/webp",
    "image/bmp",
];
pub const VIDEO_MIME_TYPES: [&str; 6] = [
    "video/mp4",
    "video/quicktime",
    "video/x-matroska",
    "video/webm",
    "video/avi",
    "video/x-msvideo",
];

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: usize = 50 * 1024 * 1024;

/// What the ingestion pipeline does with a file, decided once from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unsupported,
}

impl MediaKind {
    /// Classify by the lowercased extension of `path`, including the leading dot.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let ext = extension_of(path);
        let ext = ext.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Unsupported
        }
    }

    pub fn max_bytes(&self) -> Option<usize> {
        match self {
            MediaKind::Image => Some(MAX_IMAGE_BYTES),
            MediaKind::Video => Some(MAX_VIDEO_BYTES),
            MediaKind::Unsupported => None,
        }
    }

    fn accepts_mime(&self, mime: &str) -> bool {
        match self {
            MediaKind::Image => IMAGE_MIME_TYPES.contains(&mime),
            MediaKind::Video => VIDEO_MIME_TYPES.contains(&mime),
            MediaKind::Unsupported => false,
        }
    }
}

/// The extension of `path` with its leading dot, in the case supplied. Empty when there is none.
pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// A file received in a multipart request. Lives for one request only.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_path(&self.filename)
    }

    /// Checks the MIME type, size ceiling and extension against `expected`.
    pub fn validate_as(&self, expected: MediaKind, field: &str) -> Result<(), ReelError> {
        if self.data.is_empty() {
            return Err(ReelError::ValidationError(format!("{field} is empty")));
        }
        if !expected.accepts_mime(&self.content_type) {
            return Err(ReelError::ValidationError(format!(
                "{field} has unsupported content type {}",
                self.content_type
            )));
        }
        if let Some(max) = expected.max_bytes() {
            if self.size() > max {
                return Err(ReelError::ValidationError(format!(
                    "{field} is {} bytes, the limit is {max} bytes",
                    self.size()
                )));
            }
        }
        if self.kind() != expected {
            return Err(ReelError::ValidationError(format!(
                "{field} has unsupported extension '{}'",
                extension_of(&self.filename)
            )));
        }
        Ok(())
    }
}

/// The outcome of a stage that may degrade instead of failing.
///
/// A degraded result still carries a usable value (the uncompressed file, an
/// empty placeholder) alongside the reason the stage fell back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort<T> {
    Done(T),
    Degraded { fallback: T, reason: String },
}

impl<T> BestEffort<T> {
    pub fn degraded(fallback: T, reason: impl Into<String>) -> Self {
        BestEffort::Degraded {
            fallback,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, BestEffort::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            BestEffort::Done(value) => value,
            BestEffort::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            BestEffort::Done(value) => value,
            BestEffort::Degraded { fallback, .. } => fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_path() {
        assert_eq!(MediaKind::from_path("cover.png"), MediaKind::Image);
        assert_eq!(MediaKind::from_path("/uploads/1.JPEG"), MediaKind::Image);
        assert_eq!(MediaKind::from_path("clip.mov"), MediaKind::Video);
        assert_eq!(MediaKind::from_path("clip.WebM"), MediaKind::Video);
        assert_eq!(MediaKind::from_path("notes.txt"), MediaKind::Unsupported);
        assert_eq!(MediaKind::from_path("noextension"), MediaKind::Unsupported);
        assert_eq!(MediaKind::from_path("anim.gif"), MediaKind::Unsupported);
    }

    #[test]
    fn test_extension_keeps_case() {
        assert_eq!(extension_of("Photo.PNG"), ".PNG");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_validate_as() {
        let file = UploadedFile::new("cover.png", "image/png", vec![1, 2, 3]);
        assert!(file.validate_as(MediaKind::Image, "thumbnail").is_ok());
        assert!(file.validate_as(MediaKind::Video, "video").is_err());

        let wrong_mime = UploadedFile::new("cover.png", "image/gif", vec![1]);
        assert!(matches!(
            wrong_mime.validate_as(MediaKind::Image, "image"),
            Err(ReelError::ValidationError(_))
        ));

        let wrong_ext = UploadedFile::new("cover", "image/png", vec![1]);
        assert!(wrong_ext.validate_as(MediaKind::Image, "image").is_err());

        let empty = UploadedFile::new("cover.png", "image/png", Vec::new());
        assert!(empty.validate_as(MediaKind::Image, "image").is_err());

        let too_big = UploadedFile::new("cover.png", "image/png", vec![0; MAX_IMAGE_BYTES + 1]);
        assert!(too_big.validate_as(MediaKind::Image, "image").is_err());

        let video = UploadedFile::new("clip.mov", "video/quicktime", vec![0; 16]);
        assert!(video.validate_as(MediaKind::Video, "video").is_ok());
    }

    #[test]
    fn test_best_effort() {
        let done = BestEffort::Done("hash".to_string());
        assert!(!done.is_degraded());
        assert_eq!(done.into_inner(), "hash");

        let degraded = BestEffort::degraded(String::new(), "corrupt image");
        assert!(degraded.is_degraded());
        assert_eq!(degraded.value(), "");
    }
}
