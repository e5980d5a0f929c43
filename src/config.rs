//! Watermark placement configuration and process-wide settings.

use serde::{Deserialize, Serialize};

/// How watermark instances are laid out on the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// One watermark at one of nine anchor points.
    #[default]
    Simple,
    /// A rows x cols tiling of watermarks with uniform spacing.
    Grid,
}

/// Anchor point for a single watermark in [`Mode::Simple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum Position {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Position {
    /// Every anchor, in reading order.
    pub const ALL: [Position; 9] = [
        Position::TopLeft,
        Position::Top,
        Position::TopRight,
        Position::Left,
        Position::Center,
        Position::Right,
        Position::BottomLeft,
        Position::Bottom,
        Position::BottomRight,
    ];
}

/// Placement configuration applied to every image of a batch.
///
/// Values are not validated or clamped: whatever geometry the numbers imply
/// is rendered, including watermarks that overflow the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WatermarkConfig {
    /// Single anchor or tiled grid.
    pub mode: Mode,
    /// Anchor point, used in [`Mode::Simple`] only.
    pub position: Position,
    /// Uniform alpha multiplier in `[0, 1]`.
    pub opacity: f64,
    /// Watermark width as a fraction of the image width, in `(0, 1]`.
    pub size: f64,
    /// Rotation in degrees, `[0, 45]`.
    pub rotation: i32,
    /// Number of grid columns.
    pub grid_cols: u32,
    /// Number of grid rows.
    pub grid_rows: u32,
    /// Gap between grid cells as a fraction of image width/height, `[0, 0.5]`.
    pub grid_spacing: f64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Simple,
            position: Position::Center,
            opacity: 0.7,
            size: 0.3,
            rotation: 0,
            grid_cols: 2,
            grid_rows: 2,
            grid_spacing: 0.1,
        }
    }
}

/// Default location of the logo graphic.
pub const DEFAULT_WATERMARK: &str = "watermark.svg";

/// Default file name of the downloadable archive.
pub const DEFAULT_ARCHIVE_NAME: &str = "watermarked-images.zip";

/// Image used for the preview when no files are supplied.
pub const DEFAULT_DEMO_URL: &str =
    "https://images.unsplash.com/photo-1600566753190-17f0baa2a6c3?w=800&h=600";

/// Process-wide settings, built once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Path or URL of the watermark asset.
    pub watermark: String,
    /// Source used for the preview when no inputs are given.
    pub demo_url: String,
    /// File name of the output archive.
    pub archive_name: String,
    /// Initial placement configuration.
    pub defaults: WatermarkConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watermark: DEFAULT_WATERMARK.to_string(),
            demo_url: DEFAULT_DEMO_URL.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            defaults: WatermarkConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_configuration() {
        let config = WatermarkConfig::default();
        assert_eq!(config.mode, Mode::Simple);
        assert_eq!(config.position, Position::Center);
        assert!((config.opacity - 0.7).abs() < f64::EPSILON);
        assert!((config.size - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.rotation, 0);
        assert_eq!((config.grid_cols, config.grid_rows), (2, 2));
        assert!((config.grid_spacing - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn all_positions_are_distinct() {
        for (i, a) in Position::ALL.iter().enumerate() {
            for b in &Position::ALL[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn settings_default_to_bundled_asset_and_archive_name() {
        let settings = Settings::default();
        assert_eq!(settings.watermark, DEFAULT_WATERMARK);
        assert_eq!(settings.archive_name, "watermarked-images.zip");
        assert_eq!(settings.defaults, WatermarkConfig::default());
    }
}
