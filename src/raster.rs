//! Watermark rasterization.
//!
//! Each [`DrawInstruction`] becomes an affine [`Projection`] from watermark
//! space to canvas space (scale, translate, then rotate about the pivot). The
//! watermark is warped through it with bilinear interpolation into a layer
//! that covers the instruction's footprint clipped to the canvas, and the
//! layer is composited with source-over blending:
//! `out = src * alpha * opacity + dst * (1 - alpha * opacity)`

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

use crate::placement::DrawInstruction;

/// A watermark surface ready to be warped onto a canvas.
///
/// The surface carries a one-pixel clamp-to-edge border so bilinear samples
/// along the watermark's outline never fall outside the image.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMark {
    padded: RgbaImage,
}

impl PreparedMark {
    /// Wrap a non-empty watermark surface as-is.
    #[must_use]
    pub(crate) fn new(mark: &RgbaImage) -> Self {
        let (w, h) = mark.dimensions();
        let padded = RgbaImage::from_fn(w + 2, h + 2, |x, y| {
            *mark.get_pixel(x.saturating_sub(1).min(w - 1), y.saturating_sub(1).min(h - 1))
        });
        Self { padded }
    }

    /// Size of the watermark surface, without the border.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.padded.width() - 2, self.padded.height() - 2)
    }
}

/// Whether a watermark of this display size produces any pixels.
#[must_use]
pub fn is_drawable(width: f64, height: f64) -> bool {
    width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0
}

/// Prepare the watermark for drawing at `width` x `height`.
///
/// The surface is resampled ahead of time only when it shrinks; enlargement
/// is left to the warp, so memory stays bounded by the watermark's own size.
/// Returns `None` when the display size is empty or not finite, in which case
/// nothing is drawn.
#[must_use]
pub fn prepare_watermark(mark: &RgbaImage, width: f64, height: f64) -> Option<PreparedMark> {
    if !is_drawable(width, height) || mark.width() == 0 || mark.height() == 0 {
        return None;
    }

    let target_w = to_dimension(width);
    let target_h = to_dimension(height);
    let surface = if target_w < mark.width() && target_h < mark.height() {
        Cow::Owned(imageops::resize(mark, target_w, target_h, FilterType::Triangle))
    } else {
        Cow::Borrowed(mark)
    };
    Some(PreparedMark::new(&surface))
}

/// Draw one watermark instance onto `canvas`.
///
/// The prepared surface is stretched to the instruction's size and rotated
/// about its pivot. `opacity` multiplies the watermark's own alpha.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn draw_watermark(
    canvas: &mut RgbaImage,
    mark: &PreparedMark,
    instruction: &DrawInstruction,
    opacity: f64,
) {
    let DrawInstruction {
        x,
        y,
        width,
        height,
        rotation_degrees,
        pivot,
    } = *instruction;

    if opacity <= 0.0 || !is_drawable(width, height) {
        return;
    }

    let (mark_w, mark_h) = mark.dimensions();
    let (mark_w, mark_h) = (mark_w as f32, mark_h as f32);
    let (px, py) = (pivot.x as f32, pivot.y as f32);

    // Watermark space to canvas space, both in continuous coordinates
    let placement = Projection::translate(px, py)
        * Projection::rotate((rotation_degrees as f32).to_radians())
        * Projection::translate(-px, -py)
        * Projection::translate(x as f32, y as f32)
        * Projection::scale(width as f32 / mark_w, height as f32 / mark_h);

    let corners = [(0.0, 0.0), (mark_w, 0.0), (0.0, mark_h), (mark_w, mark_h)]
        .map(|corner| placement * corner);
    let min_x = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    let min_y = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_y = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

    // Clip to canvas bounds
    let x0 = clip(min_x.floor(), canvas.width());
    let x1 = clip(max_x.ceil(), canvas.width());
    let y0 = clip(min_y.floor(), canvas.height());
    let y1 = clip(max_y.ceil(), canvas.height());
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    // Padded pixel indices map to watermark space shifted by half a pixel
    // for the sample center and one pixel for the border; layer indices sit
    // at canvas pixel centers offset by the layer origin.
    let to_layer = Projection::translate(-0.5 - x0 as f32, -0.5 - y0 as f32)
        * placement
        * Projection::translate(-0.5, -0.5);

    let mut layer = RgbaImage::new(x1 - x0, y1 - y0);
    warp_into(
        &mark.padded,
        &to_layer,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
        &mut layer,
    );

    let inverse = placement.invert();
    for (lx, ly, sample) in layer.enumerate_pixels() {
        let (cx, cy) = (x0 + lx, y0 + ly);
        let (u, v) = inverse * (cx as f32 + 0.5, cy as f32 + 0.5);
        if u < 0.0 || v < 0.0 || u >= mark_w || v >= mark_h {
            continue;
        }
        blend_over(canvas.get_pixel_mut(cx, cy), *sample, opacity);
    }
}

/// Source-over blend of a straight-alpha sample onto a straight-alpha pixel.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f64) {
    let src_alpha = (f64::from(src[3]) / 255.0 * opacity).min(1.0);
    if src_alpha <= 0.0 {
        return;
    }

    let dst_alpha = f64::from(dst[3]) / 255.0;
    let keep = dst_alpha * (1.0 - src_alpha);
    let out_alpha = src_alpha + keep;

    for ch in 0..3 {
        let color = f64::from(src[ch]) / 255.0 * src_alpha + f64::from(dst[ch]) / 255.0 * keep;
        dst[ch] = to_channel(color / out_alpha);
    }
    dst[3] = to_channel(out_alpha);
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_dimension(value: f64) -> u32 {
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn clip(value: f32, len: u32) -> u32 {
    value.clamp(0.0, len as f32) as u32
}
