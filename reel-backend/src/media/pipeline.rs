use std::sync::Arc;

use reel_shared::error::ReelError;
use reel_shared::media::{MediaKind, UploadedFile};
use tracing::debug;

use super::placeholder::placeholder;
use super::{MaterializedFile, MediaCompressor, Transcoder, UploadStore};

/// Relative paths and placeholder to persist on a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileImage {
    pub image_url: String,
    pub blurhash: String,
}

/// Relative paths and placeholder to persist on a new video record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAssets {
    pub video_url: String,
    pub thumbnail_url: String,
    pub blurhash: String,
}

pub struct MediaPipeline {
    store: UploadStore,
    compressor: MediaCompressor,
}

impl MediaPipeline {
    pub fn new(store: UploadStore, compressor: MediaCompressor) -> Self {
        Self { store, compressor }
    }

    pub fn with_transcoder(
        store: UploadStore,
        transcoder: Arc<dyn Transcoder>,
        max_concurrent_transcodes: usize,
    ) -> Self {
        Self::new(
            store,
            MediaCompressor::new(transcoder, max_concurrent_transcodes),
        )
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    /// Materialize, compress, then hash the compressed bytes.
    pub async fn ingest_profile_image(
        &self,
        image: &UploadedFile,
    ) -> Result<ProfileImage, ReelError> {
        image.validate_as(MediaKind::Image, "image")?;

        let file = self.ingest_image(image).await?;
        let blurhash = self.image_placeholder(&file).await;

        Ok(ProfileImage {
            image_url: file.public_path(),
            blurhash,
        })
    }

    /// Both files are validated before anything touches the disk. A
    /// transcode failure aborts before the thumbnail is written.
    pub async fn ingest_video(
        &self,
        video: &UploadedFile,
        thumbnail: &UploadedFile,
    ) -> Result<VideoAssets, ReelError> {
        video.validate_as(MediaKind::Video, "video")?;
        thumbnail.validate_as(MediaKind::Image, "thumbnail")?;

        let original = self.store.materialize(video).await?;
        let transcoded = self.compressor.compress(original.clone()).await?.into_inner();
        if transcoded.path != original.path {
            debug!(
                from = %original.public_path(),
                to = %transcoded.public_path(),
                "Video path changed after transcode"
            );
        }

        let thumb = self.ingest_image(thumbnail).await?;
        let blurhash = self.image_placeholder(&thumb).await;

        Ok(VideoAssets {
            video_url: transcoded.public_path(),
            thumbnail_url: thumb.public_path(),
            blurhash,
        })
    }

    async fn ingest_image(&self, upload: &UploadedFile) -> Result<MaterializedFile, ReelError> {
        let file = self.store.materialize(upload).await?;
        // a degraded compression leaves the original bytes in place, which is still usable
        Ok(self.compressor.compress(file).await?.into_inner())
    }

    async fn image_placeholder(&self, file: &MaterializedFile) -> String {
        match file.kind {
            MediaKind::Image => placeholder(file.path.clone()).await.into_inner(),
            _ => String::new(),
        }
    }
}
