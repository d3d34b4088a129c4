//! Media ingestion
//!
//! Uploads are written to a flat directory under a timestamp name, shrunk in
//! place (images) or transcoded to a sibling MP4 (videos), and images get a
//! blurhash placeholder computed from the final bytes.

pub mod compress;
pub mod materialize;
pub mod pipeline;
pub mod placeholder;

pub use compress::{FfmpegTranscoder, MediaCompressor, Transcoder};
pub use materialize::{MaterializedFile, UploadStore};
pub use pipeline::{MediaPipeline, ProfileImage, VideoAssets};

/// URL path prefix the uploads directory is served under.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";
