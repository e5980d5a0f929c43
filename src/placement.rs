//! Watermark placement geometry.
//!
//! Pure functions: given image and watermark dimensions plus a
//! [`WatermarkConfig`], compute where every watermark instance is drawn.
//! Nothing here allocates pixels or performs I/O.

use crate::config::{Mode, Position, WatermarkConfig};

/// Margin between a flush-aligned watermark and the image edge, as a fraction
/// of the smaller image dimension.
const MARGIN_FRACTION: f64 = 0.02;

/// Width and height in (possibly fractional) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Size {
    /// Create a size from floating-point dimensions.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Create a size from integer pixel dimensions.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(f64::from(width), f64::from(height))
    }
}

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal coordinate, growing to the right.
    pub x: f64,
    /// Vertical coordinate, growing downwards.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One fully resolved watermark placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstruction {
    /// Left edge before rotation.
    pub x: f64,
    /// Top edge before rotation.
    pub y: f64,
    /// Drawn width.
    pub width: f64,
    /// Drawn height.
    pub height: f64,
    /// Clockwise rotation in degrees.
    pub rotation_degrees: f64,
    /// Point the rotation is applied around.
    pub pivot: Point,
}

/// Grid layout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Number of columns.
    pub cols: u32,
    /// Number of rows.
    pub rows: u32,
    /// Horizontal gap as a fraction of the image width.
    pub spacing_x: f64,
    /// Vertical gap as a fraction of the image height.
    pub spacing_y: f64,
}

/// Watermark display size: `fraction` of the image width, height following
/// the watermark's native aspect ratio.
#[must_use]
pub fn display_size(image: Size, native: Size, fraction: f64) -> Size {
    let width = image.width * fraction;
    Size::new(width, width * (native.height / native.width))
}

/// Top-left corner of a single watermark anchored at `position`.
#[must_use]
pub fn simple_position(position: Position, image: Size, mark: Size) -> Point {
    let margin = image.width.min(image.height) * MARGIN_FRACTION;

    let left = margin;
    let center_x = (image.width - mark.width) / 2.0;
    let right = image.width - mark.width - margin;
    let top = margin;
    let center_y = (image.height - mark.height) / 2.0;
    let bottom = image.height - mark.height - margin;

    match position {
        Position::TopLeft => Point::new(left, top),
        Position::Top => Point::new(center_x, top),
        Position::TopRight => Point::new(right, top),
        Position::Left => Point::new(left, center_y),
        Position::Center => Point::new(center_x, center_y),
        Position::Right => Point::new(right, center_y),
        Position::BottomLeft => Point::new(left, bottom),
        Position::Bottom => Point::new(center_x, bottom),
        Position::BottomRight => Point::new(right, bottom),
    }
}

/// Row-major grid of watermarks, rotated as one layout around the image center.
///
/// Oversized layouts are not rejected: tiles may overlap or fall off-canvas.
#[must_use]
pub fn grid_instructions(
    layout: &GridLayout,
    image: Size,
    mark: Size,
    rotation_degrees: f64,
) -> Vec<DrawInstruction> {
    let cols = f64::from(layout.cols);
    let rows = f64::from(layout.rows);

    let spacing_x = image.width * layout.spacing_x;
    let spacing_y = image.height * layout.spacing_y;
    let total_w = mark.width * cols + spacing_x * (cols - 1.0);
    let total_h = mark.height * rows + spacing_y * (rows - 1.0);
    let start_x = (image.width - total_w) / 2.0 + spacing_x / 2.0;
    let start_y = (image.height - total_h) / 2.0 + spacing_y / 2.0;

    let pivot = Point::new(image.width / 2.0, image.height / 2.0);

    let mut instructions = Vec::with_capacity((layout.cols as usize) * (layout.rows as usize));
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            instructions.push(DrawInstruction {
                x: start_x + f64::from(col) * (mark.width + spacing_x),
                y: start_y + f64::from(row) * (mark.height + spacing_y),
                width: mark.width,
                height: mark.height,
                rotation_degrees,
                pivot,
            });
        }
    }
    instructions
}

/// All draw instructions for `config` on an image of size `image`, given the
/// watermark's native size.
#[must_use]
pub fn plan(config: &WatermarkConfig, image: Size, native: Size) -> Vec<DrawInstruction> {
    let mark = display_size(image, native, config.size);
    let rotation_degrees = f64::from(config.rotation);

    match config.mode {
        Mode::Simple => {
            let origin = simple_position(config.position, image, mark);
            vec![DrawInstruction {
                x: origin.x,
                y: origin.y,
                width: mark.width,
                height: mark.height,
                rotation_degrees,
                pivot: Point::new(origin.x + mark.width / 2.0, origin.y + mark.height / 2.0),
            }]
        }
        Mode::Grid => {
            let layout = GridLayout {
                cols: config.grid_cols,
                rows: config.grid_rows,
                spacing_x: config.grid_spacing,
                spacing_y: config.grid_spacing,
            };
            grid_instructions(&layout, image, mark, rotation_degrees)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: Size = Size::new(800.0, 600.0);

    fn assert_point(actual: Point, x: f64, y: f64) {
        assert!(
            (actual.x - x).abs() < 1e-9 && (actual.y - y).abs() < 1e-9,
            "expected ({x}, {y}), got ({}, {})",
            actual.x,
            actual.y
        );
    }

    #[test]
    fn simple_anchors_inset_by_two_percent_of_short_side() {
        let mark = Size::new(240.0, 120.0);
        let at = |p| simple_position(p, IMAGE, mark);

        assert_point(at(Position::TopLeft), 12.0, 12.0);
        assert_point(at(Position::Top), 280.0, 12.0);
        assert_point(at(Position::TopRight), 548.0, 12.0);
        assert_point(at(Position::Left), 12.0, 240.0);
        assert_point(at(Position::Right), 548.0, 240.0);
        assert_point(at(Position::BottomLeft), 12.0, 468.0);
        assert_point(at(Position::Bottom), 280.0, 468.0);
        assert_point(at(Position::BottomRight), 548.0, 468.0);
    }

    #[test]
    fn center_ignores_margin() {
        let p = simple_position(Position::Center, IMAGE, Size::new(240.0, 120.0));
        assert_eq!(p, Point::new(280.0, 240.0));
    }

    #[test]
    fn display_size_follows_native_aspect() {
        let size = display_size(IMAGE, Size::new(500.0, 250.0), 0.3);
        assert!((size.width - 240.0).abs() < 1e-9);
        assert!((size.height - 120.0).abs() < 1e-9);
    }

    #[test]
    fn grid_two_by_two_is_row_major_and_disjoint() {
        let layout = GridLayout {
            cols: 2,
            rows: 2,
            spacing_x: 0.1,
            spacing_y: 0.1,
        };
        let cells = grid_instructions(&layout, IMAGE, Size::new(160.0, 80.0), 0.0);
        assert_eq!(cells.len(), 4);

        let expected = [(240.0, 220.0), (480.0, 220.0), (240.0, 360.0), (480.0, 360.0)];
        for (cell, &(x, y)) in cells.iter().zip(&expected) {
            assert_point(Point::new(cell.x, cell.y), x, y);
            assert_eq!(cell.pivot, Point::new(400.0, 300.0));
        }

        for (i, a) in cells.iter().enumerate() {
            for b in &cells[i + 1..] {
                let overlap_x = a.x < b.x + b.width && b.x < a.x + a.width;
                let overlap_y = a.y < b.y + b.height && b.y < a.y + a.height;
                assert!(!(overlap_x && overlap_y), "cells overlap: {a:?} {b:?}");
            }
        }
    }

    #[test]
    fn single_column_grid_has_no_spacing_contribution() {
        let layout = GridLayout {
            cols: 1,
            rows: 1,
            spacing_x: 0.2,
            spacing_y: 0.2,
        };
        let cells = grid_instructions(&layout, IMAGE, Size::new(100.0, 50.0), 0.0);
        assert_eq!(cells.len(), 1);
        // total = mark size; start = centered + half spacing
        assert_point(Point::new(cells[0].x, cells[0].y), 350.0 + 80.0, 275.0 + 60.0);
    }

    #[test]
    fn oversized_grid_is_not_an_error() {
        let layout = GridLayout {
            cols: 10,
            rows: 10,
            spacing_x: 0.5,
            spacing_y: 0.5,
        };
        let cells = grid_instructions(&layout, IMAGE, Size::new(400.0, 300.0), 30.0);
        assert_eq!(cells.len(), 100);
        assert!(cells[0].x < 0.0);
        assert!(cells.iter().all(|c| (c.rotation_degrees - 30.0).abs() < f64::EPSILON));
    }

    #[test]
    fn zero_columns_yields_no_instructions() {
        let layout = GridLayout {
            cols: 0,
            rows: 3,
            spacing_x: 0.1,
            spacing_y: 0.1,
        };
        assert!(grid_instructions(&layout, IMAGE, Size::new(10.0, 10.0), 0.0).is_empty());
    }

    #[test]
    fn simple_plan_pivots_on_watermark_center() {
        let config = WatermarkConfig {
            rotation: 15,
            ..WatermarkConfig::default()
        };
        let draws = plan(&config, IMAGE, Size::new(1000.0, 500.0));
        assert_eq!(draws.len(), 1);
        let draw = draws[0];
        assert_point(Point::new(draw.x, draw.y), 280.0, 240.0);
        assert_point(draw.pivot, 400.0, 300.0);
        assert!((draw.rotation_degrees - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn grid_plan_uses_config_counts() {
        let config = WatermarkConfig {
            mode: Mode::Grid,
            grid_cols: 3,
            grid_rows: 2,
            size: 0.1,
            ..WatermarkConfig::default()
        };
        let draws = plan(&config, IMAGE, Size::new(100.0, 100.0));
        assert_eq!(draws.len(), 6);
        assert!(draws.iter().all(|d| (d.width - 80.0).abs() < 1e-9));
    }

    #[test]
    fn planning_is_deterministic() {
        let config = WatermarkConfig {
            mode: Mode::Grid,
            rotation: 45,
            grid_cols: 4,
            grid_rows: 3,
            ..WatermarkConfig::default()
        };
        let native = Size::new(320.0, 113.0);
        assert_eq!(plan(&config, IMAGE, native), plan(&config, IMAGE, native));
    }
}
