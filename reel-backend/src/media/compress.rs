use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use reel_shared::error::ReelError;
use reel_shared::media::{BestEffort, MediaKind};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::MaterializedFile;

/// Images are shrunk to fit inside a square of this many pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 500;
pub const JPEG_QUALITY: u8 = 90;

/// Re-encodes a video file into a web-friendly MP4.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), ReelError>;
}

/// Runs an external ffmpeg: H.264 at 800k, AAC at 128k, 640px wide.
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), ReelError> {
        let input_str = input.to_string_lossy().into_owned();
        let output_str = output.to_string_lossy().into_owned();

        info!("Transcoding video: {} -> {}", input_str, output_str);

        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "-y",
            "-i", input_str.as_str(),
            "-vf", "scale=640:-2",
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-b:v", "800k",
            "-c:a", "aac",
            "-b:a", "128k",
            "-movflags", "+faststart",
            "-f", "mp4",
            output_str.as_str(),
        ]);

        let result = cmd.output().await.map_err(|err| {
            error!("Failed to run {}: {}", self.binary, err);
            ReelError::Transcode(format!("Failed to run {}: {err}", self.binary))
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!("ffmpeg transcode failed: {}", stderr);
            return Err(ReelError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        info!("Video transcode complete: {}", output_str);
        Ok(())
    }
}

/// Shrinks materialized uploads according to their [`MediaKind`].
///
/// Concurrent transcodes are capped by a semaphore; image work runs on the
/// blocking pool and is not capped.
pub struct MediaCompressor {
    transcoder: Arc<dyn Transcoder>,
    transcode_permits: Arc<Semaphore>,
}

impl MediaCompressor {
    pub fn new(transcoder: Arc<dyn Transcoder>, max_concurrent_transcodes: usize) -> Self {
        Self {
            transcoder,
            transcode_permits: Arc::new(Semaphore::new(max_concurrent_transcodes.max(1))),
        }
    }

    /// Image failures degrade to the untouched file. Video failures are errors.
    pub async fn compress(
        &self,
        file: MaterializedFile,
    ) -> Result<BestEffort<MaterializedFile>, ReelError> {
        match file.kind {
            MediaKind::Image => Ok(self.compress_image(file).await),
            MediaKind::Video => self.compress_video(file).await.map(BestEffort::Done),
            MediaKind::Unsupported => {
                debug!(path = %file.path.display(), "Unsupported file type for compression, leaving as is");
                Ok(BestEffort::Done(file))
            }
        }
    }

    async fn compress_image(&self, file: MaterializedFile) -> BestEffort<MaterializedFile> {
        let path = file.path.clone();
        match tokio::task::spawn_blocking(move || shrink_image(&path)).await {
            Ok(Ok(())) => {
                debug!(path = %file.path.display(), "Image compressed in place");
                BestEffort::Done(file)
            }
            Ok(Err(err)) => {
                warn!(path = %file.path.display(), "Image compression failed, keeping original: {err}");
                BestEffort::degraded(file, err.to_string())
            }
            Err(err) => {
                warn!(path = %file.path.display(), "Image compression task failed: {err}");
                BestEffort::degraded(file, err.to_string())
            }
        }
    }

    async fn compress_video(&self, file: MaterializedFile) -> Result<MaterializedFile, ReelError> {
        let target = file.path.with_extension("mp4");

        let _permit = self
            .transcode_permits
            .acquire()
            .await
            .map_err(|err| ReelError::Other(format!("Transcode queue closed: {err}")))?;

        if target == file.path {
            // ffmpeg cannot read and write the same file
            let scratch = file.path.with_extension("transcode.mp4");
            if let Err(err) = self.transcoder.transcode(&file.path, &scratch).await {
                let _ = tokio::fs::remove_file(&scratch).await;
                return Err(err);
            }
            tokio::fs::rename(&scratch, &target).await?;
        } else {
            self.transcoder.transcode(&file.path, &target).await?;
        }

        Ok(file.moved_to(target))
    }
}

/// Overwrites `path` with a JPEG no larger than [`MAX_IMAGE_DIMENSION`] square.
pub fn shrink_image(path: &Path) -> Result<(), image::ImageError> {
    let original = ImageReader::open(path)?.with_guessed_format()?.decode()?;

    let (width, height) = original.dimensions();
    let resized = if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        original.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Lanczos3)
    } else {
        original
    };

    // jpeg has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    // the original stays intact until the new bytes are fully on disk
    let scratch = shrink_scratch_path(path);
    if let Err(err) = std::fs::write(&scratch, output.into_inner()) {
        let _ = std::fs::remove_file(&scratch);
        return Err(err.into());
    }
    std::fs::rename(&scratch, path)?;
    Ok(())
}

fn shrink_scratch_path(path: &Path) -> PathBuf {
    path.with_extension("shrink.jpg")
}
