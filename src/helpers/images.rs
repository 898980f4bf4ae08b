//! Recipe images arrive as base64 data URIs and are written below the media
//! root. The database only keeps the path relative to that root.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Subdirectory of the media root holding recipe images.
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// A decoded `data:image/<ext>;base64,<payload>` value.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_uri(value: &str) -> ApiResult<DecodedImage> {
    let invalid = |reason: &str| ApiError::field("image", reason);

    let rest = value
        .strip_prefix("data:")
        .ok_or_else(|| invalid("Expected a base64 data URI"))?;
    let (media_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| invalid("Expected a base64 data URI"))?;
    let extension = media_type
        .strip_prefix("image/")
        .map(str::to_ascii_lowercase)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| invalid("Unsupported image type"))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid("Image payload is not valid base64"))?;
    if bytes.is_empty() {
        return Err(invalid("Image is empty"));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Decode and store an image, returning its path relative to `media_root`.
pub async fn save_image(media_root: &Path, data_uri: &str) -> ApiResult<String> {
    let image = decode_data_uri(data_uri)?;
    let relative = format!("{}/{}.{}", RECIPE_IMAGE_DIR, Uuid::new_v4(), image.extension);

    let directory = media_root.join(RECIPE_IMAGE_DIR);
    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot create {}: {}", directory.display(), e)))?;
    tokio::fs::write(media_root.join(&relative), &image.bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot write {}: {}", relative, e)))?;

    debug!("Stored {} byte image at {}", image.bytes.len(), relative);
    Ok(relative)
}

/// Best effort removal; a missing file is not an error.
pub async fn remove_image(media_root: &Path, relative: &str) {
    if let Err(e) = tokio::fs::remove_file(media_root.join(relative)).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove image {}: {}", relative, e);
        }
    }
}

/// Public URL of a stored image.
pub fn image_url(media_url: &str, relative: &str) -> String {
    format!("{}/{}", media_url.trim_end_matches('/'), relative)
}
