//! Error types for the logo-watermark crate.

/// Errors that can occur while compositing and packaging watermarked images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source image or the watermark asset could not be fetched or decoded.
    #[error("failed to load image {origin}: {cause}")]
    ImageLoad {
        /// Path, URL or file name of the image that failed to load.
        origin: String,
        /// Underlying I/O, network or decode failure.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The composited surface could not be serialized.
    #[error("failed to encode {mime} output: {reason}")]
    Encode {
        /// MIME type that was requested.
        mime: &'static str,
        /// Human-readable failure description.
        reason: String,
    },

    /// Packaging the results into a zip archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An I/O error occurred while writing output files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an [`Error::ImageLoad`] for the given origin.
    pub(crate) fn load(
        origin: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ImageLoad {
            origin: origin.into(),
            cause: cause.into(),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
