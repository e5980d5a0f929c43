//! Core watermark compositing engine.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, RgbaImage};
use tracing::{debug, warn};

use crate::archive::ArchiveEntry;
use crate::asset::WatermarkAsset;
use crate::config::WatermarkConfig;
use crate::error::{Error, Result};
use crate::placement::{self, Size};
use crate::raster;
use crate::source::{self, SourceImage};

/// JPEG quality used for every lossy output.
pub const JPEG_QUALITY: u8 = 92;

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `image/jpeg`, quality [`JPEG_QUALITY`], flattened onto black.
    Jpeg,
    /// `image/png`.
    Png,
    /// `image/webp`, lossless.
    WebP,
}

impl OutputFormat {
    /// Output format for a declared upload MIME type: PNG and WebP are
    /// preserved, everything else becomes JPEG.
    #[must_use]
    pub fn for_mime(mime: &str) -> Self {
        match mime {
            "image/png" => Self::Png,
            "image/webp" => Self::WebP,
            _ => Self::Jpeg,
        }
    }

    /// Output format for a source. URL sources always produce JPEG.
    #[must_use]
    pub fn for_source(source: &SourceImage) -> Self {
        match source {
            SourceImage::File { mime, .. } => Self::for_mime(mime),
            SourceImage::Url(_) => Self::Jpeg,
        }
    }

    /// MIME type of this format.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Conventional file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// An encoded, watermarked image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeResult {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Format the bytes are encoded in.
    pub format: OutputFormat,
}

impl CompositeResult {
    /// MIME type of the encoded bytes.
    #[must_use]
    pub const fn mime(&self) -> &'static str {
        self.format.mime()
    }
}

type Slot = Arc<Mutex<Option<Arc<WatermarkAsset>>>>;

/// Decoded watermark assets shared between concurrent compositor calls.
///
/// At most one load runs per key at a time; callers asking for a key that is
/// being loaded wait for that load. Failed loads are not cached.
#[derive(Debug, Default)]
pub struct WatermarkCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl WatermarkCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached asset for `key`, running `load` if it is absent.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `load`.
    pub fn get_or_load<F>(&self, key: &str, load: F) -> Result<Arc<WatermarkAsset>>
    where
        F: FnOnce() -> Result<WatermarkAsset>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mark) = entry.as_ref() {
            return Ok(Arc::clone(mark));
        }

        debug!(key, "loading watermark asset");
        let mark = Arc::new(load()?);
        *entry = Some(Arc::clone(&mark));
        Ok(mark)
    }

    /// Number of successfully loaded assets.
    #[must_use]
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    /// Whether no asset has been loaded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one item of a batch.
#[derive(Debug)]
pub struct BatchItem {
    /// Original source name, used for the archive entry.
    pub name: String,
    /// The composite, or why this item failed.
    pub result: Result<CompositeResult>,
}

impl BatchItem {
    /// Archive entry for a successful item; `None` if it failed.
    #[must_use]
    pub fn into_entry(self) -> Option<ArchiveEntry> {
        self.result.ok().map(|composite| ArchiveEntry {
            name: self.name,
            bytes: composite.bytes,
        })
    }
}

/// Draws a watermark onto source images and re-encodes them.
///
/// Every call is independent: it decodes its own surfaces and touches no
/// shared mutable state, apart from the optional [`WatermarkCache`].
#[derive(Debug, Default)]
pub struct Compositor {
    cache: Option<WatermarkCache>,
}

impl Compositor {
    /// Compositor that loads the watermark asset fresh on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compositor that decodes each watermark asset once and shares it.
    #[must_use]
    pub fn with_cache() -> Self {
        Self {
            cache: Some(WatermarkCache::new()),
        }
    }

    /// The asset cache, if enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&WatermarkCache> {
        self.cache.as_ref()
    }

    /// Watermark one source image.
    ///
    /// Decodes the source, then the watermark at `watermark` (path or URL),
    /// composites them according to `config` and encodes the result in the
    /// format chosen by [`OutputFormat::for_source`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if either image cannot be loaded or an
    /// SVG watermark cannot be rendered, and [`Error::Encode`] if
    /// serialization fails.
    pub fn apply_watermark(
        &self,
        source: &SourceImage,
        watermark: &str,
        config: &WatermarkConfig,
    ) -> Result<CompositeResult> {
        let base = source.decode()?;
        let mark = self.load_watermark(watermark)?;
        let canvas = composite(base, &mark, config)?;
        let result = encode(&canvas, OutputFormat::for_source(source))?;

        debug!(
            source = source.name(),
            mime = result.mime(),
            bytes = result.bytes.len(),
            "watermark applied"
        );
        Ok(result)
    }

    /// Watermark every source, one [`BatchItem`] per source in input order.
    ///
    /// Items fail independently. Uses parallel iteration when the `cli`
    /// feature is enabled (via rayon).
    #[must_use]
    pub fn process_batch(
        &self,
        sources: &[SourceImage],
        watermark: &str,
        config: &WatermarkConfig,
    ) -> Vec<BatchItem> {
        let process = |source: &SourceImage| {
            let result = self.apply_watermark(source, watermark, config);
            if let Err(e) = &result {
                warn!(source = source.name(), error = %e, "failed to watermark image");
            }
            BatchItem {
                name: source.name().to_string(),
                result,
            }
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            sources.par_iter().map(process).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            sources.iter().map(process).collect()
        }
    }

    fn load_watermark(&self, reference: &str) -> Result<Arc<WatermarkAsset>> {
        let load = || WatermarkAsset::from_bytes(&source::fetch(reference)?, reference);
        match &self.cache {
            Some(cache) => cache.get_or_load(reference, load),
            None => load().map(Arc::new),
        }
    }
}

/// Draw `mark` onto `base` as described by `config`.
///
/// The returned surface has exactly the dimensions of `base`. SVG watermarks
/// are rendered once at the display size, capped at the larger side of
/// `base`.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] if an SVG watermark cannot be rendered.
pub fn composite(
    mut base: RgbaImage,
    mark: &WatermarkAsset,
    config: &WatermarkConfig,
) -> Result<RgbaImage> {
    let image = Size::from_pixels(base.width(), base.height());
    let instructions = placement::plan(config, image, mark.native_size());

    let Some(first) = instructions.first() else {
        return Ok(base);
    };
    if config.opacity <= 0.0 || !raster::is_drawable(first.width, first.height) {
        return Ok(base);
    }

    let limit = base.width().max(base.height());
    let surface = mark.rasterize(first.width, first.height, limit)?;
    let Some(prepared) = raster::prepare_watermark(&surface, first.width, first.height) else {
        return Ok(base);
    };

    for instruction in &instructions {
        raster::draw_watermark(&mut base, &prepared, instruction, config.opacity);
    }
    Ok(base)
}

/// Composite onto opaque black, the way a canvas without alpha stores it.
fn flatten_onto_black(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let px = canvas.get_pixel(x, y);
        let alpha = u16::from(px[3]);
        #[allow(clippy::cast_possible_truncation)]
        Rgb([0, 1, 2].map(|ch| ((u16::from(px[ch]) * alpha + 127) / 255) as u8))
    })
}

/// Serialize a surface.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the encoder fails or writes nothing.
pub fn encode(canvas: &RgbaImage, format: OutputFormat) -> Result<CompositeResult> {
    let mime = format.mime();
    let (width, height) = canvas.dimensions();
    let mut bytes = Vec::new();

    let written = match format {
        OutputFormat::Jpeg => {
            let rgb = flatten_onto_black(canvas);
            JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Png => PngEncoder::new(&mut bytes).write_image(
            canvas.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        OutputFormat::WebP => WebPEncoder::new_lossless(&mut bytes).write_image(
            canvas.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };

    written.map_err(|e| Error::Encode {
        mime,
        reason: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(Error::Encode {
            mime,
            reason: "encoder produced no output".to_string(),
        });
    }

    Ok(CompositeResult { bytes, format })
}
