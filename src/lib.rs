//! Batch-apply a logo watermark to photographs.
//!
//! The [`Compositor`] decodes a source photo and a watermark graphic, plans
//! where the watermark goes (one anchored instance or a rotated grid of
//! tiles), rasterizes the composite with a uniform opacity and re-encodes it.
//! Watermarks may be bitmaps or SVG documents.
//! PNG and WebP uploads keep their format; everything else, and every
//! URL-sourced image, becomes a JPEG at quality 92.
//!
//! # Quick Start
//!
//! ```no_run
//! use logo_watermark::{Compositor, SourceImage, WatermarkConfig};
//!
//! let compositor = Compositor::new();
//! let source = SourceImage::from_path("kitchen.jpg".as_ref()).unwrap();
//! let result = compositor
//!     .apply_watermark(&source, "watermark.svg", &WatermarkConfig::default())
//!     .unwrap();
//! std::fs::write("kitchen_watermarked.jpg", &result.bytes).unwrap();
//! ```
//!
//! # Batches and archives
//!
//! ```no_run
//! use logo_watermark::{create_archive, Compositor, SourceImage, WatermarkConfig};
//!
//! let sources: Vec<SourceImage> = ["a.png", "b.webp"]
//!     .iter()
//!     .map(|p| SourceImage::from_path(p.as_ref()).unwrap())
//!     .collect();
//! let items = Compositor::with_cache().process_batch(&sources, "watermark.svg", &WatermarkConfig::default());
//! let entries: Vec<_> = items.into_iter().filter_map(|item| item.into_entry()).collect();
//! let zip = create_archive(&entries).unwrap();
//! ```

#![deny(missing_docs)]

pub mod archive;
pub mod asset;
pub mod config;
mod engine;
pub mod error;
pub mod placement;
pub mod raster;
pub mod source;

pub use archive::{create_archive, save_archive, ArchiveEntry};
pub use asset::WatermarkAsset;
pub use config::{Mode, Position, Settings, WatermarkConfig};
pub use engine::{
    composite, encode, BatchItem, CompositeResult, Compositor, OutputFormat, WatermarkCache,
    JPEG_QUALITY,
};
pub use error::{Error, Result};
pub use source::SourceImage;
