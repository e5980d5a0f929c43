//! Watermark graphics: raster images or SVG documents.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use resvg::{tiny_skia, usvg};
use tracing::debug;

use crate::error::{Error, Result};
use crate::placement::Size;
use crate::raster;
use crate::source;

/// A decoded watermark graphic.
#[derive(Debug)]
pub enum WatermarkAsset {
    /// Bitmap logo (PNG, WebP, JPEG, ...).
    Raster(RgbaImage),
    /// Vector logo, rendered on demand at the size it is drawn at.
    Svg(SvgMark),
}

impl WatermarkAsset {
    /// Decode asset bytes. SVG is detected from the reference's extension or
    /// from the document prefix; everything else goes through the raster
    /// decoders.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if the bytes cannot be parsed.
    pub fn from_bytes(bytes: &[u8], origin: &str) -> Result<Self> {
        if is_svg(origin, bytes) {
            SvgMark::parse(bytes, origin).map(Self::Svg)
        } else {
            source::decode_bytes(bytes, origin).map(Self::Raster)
        }
    }

    /// Intrinsic size, used for the aspect ratio of the drawn watermark.
    #[must_use]
    pub fn native_size(&self) -> Size {
        match self {
            Self::Raster(img) => Size::from_pixels(img.width(), img.height()),
            Self::Svg(svg) => svg.size,
        }
    }

    /// Bitmap to draw a `width` x `height` watermark from.
    ///
    /// Raster logos are returned as-is. SVG logos are rendered at the display
    /// size, scaled down so neither side exceeds `limit` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if an SVG cannot be rendered.
    pub fn rasterize(&self, width: f64, height: f64, limit: u32) -> Result<Cow<'_, RgbaImage>> {
        match self {
            Self::Raster(img) => Ok(Cow::Borrowed(img)),
            Self::Svg(svg) => {
                let (w, h) = fit_within(width, height, limit);
                svg.render(w, h).map(Cow::Owned)
            }
        }
    }
}

/// A parsed SVG document kept in source form.
pub struct SvgMark {
    origin: String,
    data: Vec<u8>,
    size: Size,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgMark {
    /// Parse an SVG document and record its intrinsic size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if the document is not valid SVG.
    pub fn parse(data: &[u8], origin: &str) -> Result<Self> {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        let fontdb = Arc::new(fontdb);

        let tree = parse_tree(data, &fontdb).map_err(|e| Error::load(origin, e))?;
        let size = tree.size();
        debug!(origin, width = size.width(), height = size.height(), "parsed SVG watermark");

        Ok(Self {
            origin: origin.to_string(),
            data: data.to_vec(),
            size: Size::new(f64::from(size.width()), f64::from(size.height())),
            fontdb,
        })
    }

    /// Render into a `width` x `height` bitmap, stretching to fill it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if the surface cannot be allocated.
    #[allow(clippy::cast_precision_loss)]
    pub fn render(&self, width: u32, height: u32) -> Result<RgbaImage> {
        let tree = parse_tree(&self.data, &self.fontdb).map_err(|e| Error::load(&self.origin, e))?;
        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| Error::load(&self.origin, "failed to allocate SVG surface"))?;

        let size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        // tiny-skia stores premultiplied pixels
        let mut image = RgbaImage::new(width, height);
        for (dst, px) in image.pixels_mut().zip(pixmap.pixels()) {
            let c = px.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(image)
    }
}

impl fmt::Debug for SvgMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvgMark")
            .field("origin", &self.origin)
            .field("bytes", &self.data.len())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

fn parse_tree(
    data: &[u8],
    fontdb: &Arc<usvg::fontdb::Database>,
) -> std::result::Result<usvg::Tree, usvg::Error> {
    let mut options = usvg::Options::default();
    options.fontdb = Arc::clone(fontdb);
    usvg::Tree::from_data(data, &options)
}

/// Whether an asset is an SVG document, judged by extension, then content.
#[must_use]
pub fn is_svg(reference: &str, bytes: &[u8]) -> bool {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    if Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
    {
        return true;
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let text = head.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn fit_within(width: f64, height: f64, limit: u32) -> (u32, u32) {
    let longest = width.max(height);
    let scale = if longest > 0.0 {
        (f64::from(limit.max(1)) / longest).min(1.0)
    } else {
        1.0
    };
    (
        raster::to_dimension(width * scale),
        raster::to_dimension(height * scale),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20" viewBox="0 0 40 20">
  <rect width="40" height="20" fill="#00ff00"/>
</svg>"##;

    #[test]
    fn svg_is_detected_by_extension_or_content() {
        assert!(is_svg("/watermark.svg", b""));
        assert!(is_svg("https://cdn.example.com/logo.SVG?v=2", b""));
        assert!(is_svg("logo", LOGO.as_bytes()));
        assert!(is_svg("logo", b"\xef\xbb\xbf<?xml version=\"1.0\"?>\n<svg/>"));
        assert!(!is_svg("logo.png", b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn svg_native_size_comes_from_document() {
        let asset = WatermarkAsset::from_bytes(LOGO.as_bytes(), "logo.svg").unwrap();
        assert!(matches!(asset, WatermarkAsset::Svg(_)));
        assert_eq!(asset.native_size(), Size::new(40.0, 20.0));
    }

    #[test]
    fn svg_renders_at_requested_size() {
        let asset = WatermarkAsset::from_bytes(LOGO.as_bytes(), "logo.svg").unwrap();
        let surface = asset.rasterize(120.0, 60.0, 1000).unwrap();
        assert_eq!(surface.dimensions(), (120, 60));

        let px = surface.get_pixel(60, 30);
        assert!(px[1] >= 250 && px[0] <= 5 && px[3] >= 250, "{px:?}");
    }

    #[test]
    fn svg_render_size_is_capped() {
        let asset = WatermarkAsset::from_bytes(LOGO.as_bytes(), "logo.svg").unwrap();
        let surface = asset.rasterize(40_000.0, 20_000.0, 400).unwrap();
        assert_eq!(surface.dimensions(), (400, 200));
    }

    #[test]
    fn invalid_svg_fails_to_load() {
        let err = WatermarkAsset::from_bytes(b"<svg><unclosed", "broken.svg").unwrap_err();
        assert!(matches!(err, Error::ImageLoad { ref origin, .. } if origin == "broken.svg"));
    }

    #[test]
    fn raster_asset_is_borrowed_unchanged() {
        let asset = WatermarkAsset::Raster(RgbaImage::new(7, 3));
        assert_eq!(asset.native_size(), Size::new(7.0, 3.0));
        assert!(matches!(asset.rasterize(700.0, 300.0, 10).unwrap(), Cow::Borrowed(_)));
    }
}
