use std::path::{Path, PathBuf};

use reel_shared::error::ReelError;
use reel_shared::media::{extension_of, MediaKind, UploadedFile};
use tracing::{debug, error};

use super::UPLOADS_URL_PREFIX;

/// An upload written to durable storage under a generated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub filename: String,
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MaterializedFile {
    /// The relative path persisted on records, `/uploads/<filename>`.
    pub fn public_path(&self) -> String {
        format!("{}/{}", UPLOADS_URL_PREFIX, self.filename)
    }

    /// The same upload after a stage wrote it to `path`.
    pub fn moved_to(&self, path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.filename.clone());
        Self {
            filename,
            path,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), ReelError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| {
            error!(dir = %self.dir.display(), "Failed to create uploads directory: {err}");
            ReelError::IOError(format!(
                "Failed to create uploads directory {}: {err}",
                self.dir.display()
            ))
        })
    }

    /// `<millis><original extension>`, extension kept verbatim.
    pub fn generated_name(millis: i64, original: &str) -> String {
        format!("{}{}", millis, extension_of(original))
    }

    pub async fn materialize(&self, file: &UploadedFile) -> Result<MaterializedFile, ReelError> {
        self.materialize_at(file, chrono::Utc::now().timestamp_millis())
            .await
    }

    /// Two uploads with the same timestamp and extension land on the same
    /// path, and the later write wins.
    pub async fn materialize_at(
        &self,
        file: &UploadedFile,
        millis: i64,
    ) -> Result<MaterializedFile, ReelError> {
        let filename = Self::generated_name(millis, &file.filename);
        let path = self.dir.join(&filename);

        tokio::fs::write(&path, &file.data).await.map_err(|err| {
            error!(path = %path.display(), "Failed to write upload: {err}");
            ReelError::IOError(format!("Failed to write {}: {err}", path.display()))
        })?;
        debug!(
            original = %file.filename,
            path = %path.display(),
            bytes = file.size(),
            "Materialized upload"
        );

        Ok(MaterializedFile {
            filename,
            path,
            kind: file.kind(),
        })
    }
}
