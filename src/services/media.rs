use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{DownloadedMedia, ImageInput};
use crate::services::ai_service::CompletionError;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Resolves an [`ImageInput`] to the single URL sent to the provider: a
/// `data:` URL or a remote URL. `Ok(None)` means no image was supplied.
pub fn resolve_image_url(image: &ImageInput) -> Result<Option<String>, CompletionError> {
    if let Some(data) = non_empty(&image.base64_data) {
        let mime_type = non_empty(&image.mime_type).unwrap_or(DEFAULT_IMAGE_MIME);
        return Ok(Some(build_data_url(data, mime_type)));
    }

    if let Some(url) = non_empty(&image.url) {
        return Ok(Some(url.to_string()));
    }

    if let Some(path) = &image.path {
        let bytes = fs::read(path).map_err(|source| CompletionError::ImageRead {
            path: path.display().to_string(),
            source,
        })?;
        log::debug!("📊 Image file size: {} bytes ({})", bytes.len(), path.display());

        let mime_type = mime_from_path(path)
            .or_else(|| non_empty(&image.mime_type))
            .unwrap_or(DEFAULT_IMAGE_MIME);
        let encoded = general_purpose::STANDARD.encode(&bytes);
        return Ok(Some(build_data_url(&encoded, mime_type)));
    }

    Ok(None)
}

/// Prefixes raw base64 with a data URL header; already-prefixed input is returned as-is.
pub fn build_data_url(base64_data: &str, mime_type: &str) -> String {
    if base64_data.starts_with("data:") {
        return base64_data.to_string();
    }
    format!("data:{};base64,{}", mime_type, base64_data)
}

pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

/// Preferred file extension for a MIME type. The subtype wins when it is a
/// known extension (`image/jpeg` -> `jpeg`), otherwise the first registered one.
pub fn extension_from_mime(mime_type: &str) -> Option<&'static str> {
    // "image/jpeg; charset=binary" -> "image/jpeg"
    let essence = mime_type.split(';').next()?.trim().to_ascii_lowercase();
    let extensions = mime_guess::get_mime_extensions_str(&essence)?;
    let subtype = essence.split('/').nth(1).unwrap_or_default();

    extensions
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| extensions.first())
        .copied()
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// Replaces everything outside `[A-Za-z0-9-_.]` with `_`.
pub fn sanitize_filename(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<message id>-<timestamp>` with filesystem-hostile characters removed.
pub fn message_slug(message_id: &str, timestamp: Option<DateTime<Utc>>) -> String {
    let id = if message_id.is_empty() { "message" } else { message_id };
    let stamp = match timestamp {
        Some(ts) => ts
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-"),
        None => Utc::now().timestamp_millis().to_string(),
    };
    format!("{}-{}", id, stamp)
}

/// Writes downloaded media under `downloads_dir` and returns the file path.
pub async fn persist_media(
    downloads_dir: &Path,
    media: &DownloadedMedia,
    slug: &str,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(downloads_dir).await?;

    let base_name = media
        .filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| sanitize_filename(slug));

    let file_name = match extension_from_mime(&media.mime_type) {
        Some(ext) if !base_name.to_lowercase().ends_with(&format!(".{}", ext)) => {
            format!("{}.{}", base_name, ext)
        }
        _ => base_name,
    };

    let file_path = downloads_dir.join(file_name);
    tokio::fs::write(&file_path, &media.data).await?;
    log::info!("💾 Saved {} bytes to {}", media.data.len(), file_path.display());

    Ok(file_path)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
