//! Source images and asset fetching.

use std::borrow::Cow;
use std::path::Path;

use image::RgbaImage;
use tracing::debug;

use crate::error::{Error, Result};

/// A photograph to be watermarked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImage {
    /// Uploaded file contents with their declared MIME type.
    File {
        /// Original file name, reused for the archive entry.
        name: String,
        /// MIME type reported by the intake, e.g. `image/png`.
        mime: String,
        /// Encoded image bytes.
        bytes: Vec<u8>,
    },
    /// Image referenced by URL or path (demo preview).
    Url(String),
}

impl SourceImage {
    /// Read a file from disk, deriving the MIME type from its extension or,
    /// failing that, from its contents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::load(path.display().to_string(), e))?;
        let mime = mime_for_path(path)
            .or_else(|| image::guess_format(&bytes).ok().map(|f| f.to_mime_type()))
            .unwrap_or("application/octet-stream");
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );

        Ok(Self::File {
            name,
            mime: mime.to_string(),
            bytes,
        })
    }

    /// Display name: the file name, or the last path segment of a URL.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } => name.as_str(),
            Self::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url.as_str());
                match path.trim_end_matches('/').rsplit('/').next() {
                    Some(segment) if !segment.is_empty() => segment,
                    _ => url.as_str(),
                }
            }
        }
    }

    /// Declared MIME type for uploaded files; `None` for URL sources.
    #[must_use]
    pub fn mime(&self) -> Option<&str> {
        match self {
            Self::File { mime, .. } => Some(mime.as_str()),
            Self::Url(_) => None,
        }
    }

    /// Decode the source into an RGBA surface at its native resolution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if fetching or decoding fails.
    pub fn decode(&self) -> Result<RgbaImage> {
        let bytes: Cow<'_, [u8]> = match self {
            Self::File { bytes, .. } => Cow::Borrowed(bytes.as_slice()),
            Self::Url(url) => Cow::Owned(fetch(url)?),
        };
        decode_bytes(&bytes, self.name())
    }
}

/// Decode encoded image bytes into an RGBA surface.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] if the bytes are not a decodable image.
pub fn decode_bytes(bytes: &[u8], origin: &str) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::load(origin, e))?;
    debug!(origin, width = img.width(), height = img.height(), "decoded image");
    Ok(img.to_rgba8())
}

/// Fetch the bytes behind an asset reference.
///
/// `http://` and `https://` references are downloaded (requires the `remote`
/// feature); `file://` references and plain strings are read from disk.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] on any read or network failure.
pub fn fetch(reference: &str) -> Result<Vec<u8>> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return fetch_remote(reference);
    }
    let path = reference.strip_prefix("file://").unwrap_or(reference);
    std::fs::read(path).map_err(|e| Error::load(reference, e))
}

#[cfg(feature = "remote")]
fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    debug!(url, "fetching remote image");
    let response = reqwest::blocking::get(url)
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| Error::load(url, e))?;
    let bytes = response.bytes().map_err(|e| Error::load(url, e))?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "remote"))]
fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    Err(Error::load(
        url,
        "remote sources require the `remote` feature",
    ))
}

/// MIME type implied by a supported file extension.
#[must_use]
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    mime_for_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_supported_image_accepts_upload_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
    }

    #[test]
    fn is_supported_image_rejects_other_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("logo.svg")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn mime_for_path_maps_extensions() {
        assert_eq!(mime_for_path(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("a.png")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(mime_for_path(Path::new("a.tiff")), None);
    }

    #[test]
    fn url_name_is_last_path_segment() {
        let src = SourceImage::Url("https://example.com/img/kitchen.jpg?w=800&h=600".into());
        assert_eq!(src.name(), "kitchen.jpg");
        assert_eq!(src.mime(), None);

        let bare = SourceImage::Url("preview.png".into());
        assert_eq!(bare.name(), "preview.png");
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        let src = SourceImage::File {
            name: "broken.png".into(),
            mime: "image/png".into(),
            bytes: b"not an image".to_vec(),
        };
        let err = src.decode().unwrap_err();
        assert!(matches!(err, Error::ImageLoad { ref origin, .. } if origin == "broken.png"));
    }

    #[test]
    fn missing_file_reference_fails_to_load() {
        let err = fetch("file:///definitely/not/here/logo.png").unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }

    #[cfg(not(feature = "remote"))]
    #[test]
    fn remote_reference_without_feature_fails_to_load() {
        let err = fetch("https://example.com/logo.png").unwrap_err();
        assert!(err.to_string().contains("remote"));
    }
}
