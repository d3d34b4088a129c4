use std::path::{Path, PathBuf};

use image::{GenericImageView, ImageReader};
use reel_shared::media::BestEffort;
use tracing::warn;

/// Blurhash components on each axis.
pub const COMPONENTS: u32 = 4;

fn encode(path: &Path) -> Result<String, String> {
    let img = ImageReader::open(path)
        .map_err(|err| err.to_string())?
        .with_guessed_format()
        .map_err(|err| err.to_string())?
        .decode()
        .map_err(|err| err.to_string())?;
    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8();
    blurhash::encode(COMPONENTS, COMPONENTS, width, height, rgba.as_raw())
        .map_err(|err| format!("{err:?}"))
}

/// Computes a blurhash from the file at `path`, falling back to an empty string.
pub async fn placeholder(path: PathBuf) -> BestEffort<String> {
    let shown = path.display().to_string();
    match tokio::task::spawn_blocking(move || encode(&path)).await {
        Ok(Ok(hash)) => BestEffort::Done(hash),
        Ok(Err(reason)) => {
            warn!(path = %shown, "Blurhash generation failed: {reason}");
            BestEffort::degraded(String::new(), reason)
        }
        Err(err) => {
            warn!(path = %shown, "Blurhash task failed: {err}");
            BestEffort::degraded(String::new(), err.to_string())
        }
    }
}
