use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use logo_watermark::source::is_supported_image;
use logo_watermark::{
    create_archive, save_archive, BatchItem, Compositor, Mode, Position, Settings, SourceImage,
};

/// Preview file written in demo mode when no output is given.
const DEFAULT_PREVIEW: &str = "preview.jpg";

#[derive(Parser)]
#[command(
    name = "logo-watermark",
    about = "Batch-apply a logo watermark to photos and package them as a zip archive",
    version,
    after_help = "Simple usage: logo-watermark photos/ -w logo.png  (writes watermarked-images.zip)\n\n\
                  Without inputs, the demo image is watermarked and written as a preview."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image files, directories or URLs
    inputs: Vec<String>,

    /// Watermark graphic (PNG, WebP, JPEG or SVG), path or URL (default: watermark.svg)
    #[arg(short, long)]
    watermark: Option<String>,

    /// Output archive, or preview image in demo mode
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Placement mode
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Anchor point in simple mode
    #[arg(long, value_enum)]
    position: Option<Position>,

    /// Watermark opacity (0.0-1.0)
    #[arg(long)]
    opacity: Option<f64>,

    /// Watermark width as a fraction of the image width (0.0-1.0)
    #[arg(long)]
    size: Option<f64>,

    /// Rotation in degrees (0-45)
    #[arg(long)]
    rotation: Option<i32>,

    /// Grid columns
    #[arg(long)]
    grid_cols: Option<u32>,

    /// Grid rows
    #[arg(long)]
    grid_rows: Option<u32>,

    /// Gap between grid cells as a fraction of the image (0.0-0.5)
    #[arg(long)]
    grid_spacing: Option<f64>,

    /// Decode the watermark once and share it across the batch
    #[arg(long)]
    cache: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Command-line flags take precedence over the settings file.
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(w) = &self.watermark {
            settings.watermark.clone_from(w);
        }
        let config = &mut settings.defaults;
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(position) = self.position {
            config.position = position;
        }
        if let Some(opacity) = self.opacity {
            config.opacity = opacity;
        }
        if let Some(size) = self.size {
            config.size = size;
        }
        if let Some(rotation) = self.rotation {
            config.rotation = rotation;
        }
        if let Some(cols) = self.grid_cols {
            config.grid_cols = cols;
        }
        if let Some(rows) = self.grid_rows {
            config.grid_rows = rows;
        }
        if let Some(spacing) = self.grid_spacing {
            config.grid_spacing = spacing;
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }
    init_logging(&cli);

    let mut settings = match &cli.config {
        Some(path) => match load_settings(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: Failed to load settings from {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => Settings::default(),
    };
    cli.apply_overrides(&mut settings);

    let compositor = if cli.cache {
        Compositor::with_cache()
    } else {
        Compositor::new()
    };

    if cli.inputs.is_empty() {
        run_demo(&cli, &settings, &compositor);
    } else {
        run_batch(&cli, &settings, &compositor);
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: &Path) -> Result<Settings, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    toml::from_str(&text).map_err(|e| e.to_string())
}

fn run_demo(cli: &Cli, settings: &Settings, compositor: &Compositor) {
    let source = SourceImage::Url(settings.demo_url.clone());
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PREVIEW));

    let result = match compositor.apply_watermark(&source, &settings.watermark, &settings.defaults)
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Preview unavailable: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = std::fs::write(&output, &result.bytes) {
        eprintln!("Error: Failed to write preview {}: {e}", output.display());
        process::exit(1);
    }
    if !cli.quiet {
        eprintln!("[OK] preview ({}) -> {}", result.mime(), output.display());
    }
}

fn run_batch(cli: &Cli, settings: &Settings, compositor: &Compositor) {
    let (sources, slots) = collect_sources(&cli.inputs);

    if !cli.quiet {
        eprintln!(
            "Watermarking {} image(s) with {}",
            sources.len(),
            settings.watermark
        );
        eprintln!();
    }

    let processed = compositor.process_batch(&sources, &settings.watermark, &settings.defaults);
    let results = merge_in_order(slots, processed);

    let mut success_count = 0u32;
    let mut fail_count = 0u32;
    for item in &results {
        print_result(item, cli);
        if item.result.is_ok() {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    let entries: Vec<_> = results
        .into_iter()
        .filter_map(BatchItem::into_entry)
        .collect();
    if entries.is_empty() {
        eprintln!("Error: No image was watermarked, archive not written");
        process::exit(1);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.archive_name));
    let written = create_archive(&entries).and_then(|zip| save_archive(&zip, &output));
    match written {
        Ok(()) => {
            if !cli.quiet {
                eprintln!("Archive written: {}", output.display());
            }
        }
        Err(e) => {
            eprintln!("Error: Failed to write archive {}: {e}", output.display());
            process::exit(1);
        }
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

/// Expand inputs into sources, in input order.
///
/// The second list has one slot per expanded input: `None` where the next
/// source goes, or the failed item for an input that could not be read.
fn collect_sources(inputs: &[String]) -> (Vec<SourceImage>, Vec<Option<BatchItem>>) {
    let mut sources = Vec::new();
    let mut slots = Vec::new();

    for input in inputs {
        if input.starts_with("http://") || input.starts_with("https://") {
            sources.push(SourceImage::Url(input.clone()));
            slots.push(None);
            continue;
        }

        let path = Path::new(input);
        let paths = if path.is_dir() {
            match std::fs::read_dir(path) {
                Ok(rd) => {
                    let mut files: Vec<PathBuf> = rd
                        .filter_map(std::result::Result::ok)
                        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                        .map(|e| e.path())
                        .filter(|p| is_supported_image(p))
                        .collect();
                    files.sort();
                    files
                }
                Err(e) => {
                    slots.push(Some(BatchItem {
                        name: input.clone(),
                        result: Err(e.into()),
                    }));
                    continue;
                }
            }
        } else {
            vec![path.to_path_buf()]
        };

        for p in paths {
            match SourceImage::from_path(&p) {
                Ok(source) => {
                    sources.push(source);
                    slots.push(None);
                }
                Err(e) => slots.push(Some(BatchItem {
                    name: p.display().to_string(),
                    result: Err(e),
                })),
            }
        }
    }

    (sources, slots)
}

/// Fill the empty slots with processed items, keeping input order.
fn merge_in_order(slots: Vec<Option<BatchItem>>, processed: Vec<BatchItem>) -> Vec<BatchItem> {
    let mut processed = processed.into_iter();
    slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| processed.next()))
        .collect()
}

fn print_result(item: &BatchItem, cli: &Cli) {
    match &item.result {
        Ok(composite) => {
            if !cli.quiet {
                eprintln!("[OK] {} ({})", item.name, composite.mime());
            }
            if cli.verbose {
                eprintln!("  -> {} bytes", composite.bytes.len());
            }
        }
        Err(e) => eprintln!("[FAIL] {}: {e}", item.name),
    }
}

#[cfg(test)]
mod tests {
    use logo_watermark::{CompositeResult, Error, OutputFormat};

    use super::*;

    fn done(name: &str) -> BatchItem {
        BatchItem {
            name: name.to_string(),
            result: Ok(CompositeResult {
                bytes: vec![0],
                format: OutputFormat::Png,
            }),
        }
    }

    #[test]
    fn unreadable_inputs_keep_their_position() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.png");
        let last = dir.path().join("c.png");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&last, b"c").unwrap();
        let missing = dir.path().join("b.png");

        let inputs: Vec<String> = [&first, &missing, &last]
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let (sources, slots) = collect_sources(&inputs);

        assert_eq!(sources.len(), 2);
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_none());
        assert!(matches!(&slots[1], Some(item) if item.result.is_err()));
        assert!(slots[2].is_none());

        let processed = sources.iter().map(|s| done(s.name())).collect();
        let names: Vec<_> = merge_in_order(slots, processed)
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, ["a.png", missing.display().to_string().as_str(), "c.png"]);
    }

    #[test]
    fn merge_places_failures_between_processed_items() {
        let failed = BatchItem {
            name: "broken".into(),
            result: Err(Error::Io(std::io::Error::other("unreadable"))),
        };
        let merged = merge_in_order(
            vec![None, Some(failed), None, None],
            vec![done("one"), done("two"), done("three")],
        );

        let names: Vec<_> = merged.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, ["one", "broken", "two", "three"]);
        assert!(merged[1].result.is_err());
    }
}
