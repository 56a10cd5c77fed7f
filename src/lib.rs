//! Cropgen: a multi-scale sliding-window crop sampler for detector
//! training.
//!
//! Given a set of images and (optionally) ground-truth bounding boxes,
//! cropgen enumerates candidate windows across a geometric scale pyramid,
//! keeps the ones that overlap ground truth strongly enough, and serves
//! fixed-size, optionally flip-augmented crops in shuffled epochs. The whole
//! generator (images, records, traversal state, config) snapshots to opaque
//! bytes and restores without losing its place in the epoch.
//!
//! # Modules
//!
//! - [`geom`]: integer rectangle/size types and IoU
//! - [`window`]: pyramid window enumeration and overlap filtering
//! - [`store`]: the shuffled sample index store
//! - [`generator`]: the sample generator and crop extraction
//! - [`snapshot`]: snapshot encoding and validated restore
//! - [`error`]: error types for cropgen operations
//!
//! # Example
//!
//! ```no_run
//! use cropgen::{Rect, SampleGenerator, SamplerConfig, Size};
//! use image::RgbImage;
//!
//! # fn main() -> Result<(), cropgen::CropgenError> {
//! let image = RgbImage::new(640, 480);
//! let truth = vec![Rect::new(100, 120, 64, 64)];
//! let config = SamplerConfig {
//!     window_size: Size::new(32, 32),
//!     output_size: Size::new(64, 64),
//!     ..SamplerConfig::default()
//! };
//!
//! let mut generator = SampleGenerator::new(vec![(image, truth)], config)?;
//! let crops = generator.get_batch(16, true, false)?;
//! # let _ = crops;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod geom;
pub mod snapshot;
pub mod store;
pub mod window;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use image::RgbImage;
use log::info;
use serde::Deserialize;
use walkdir::WalkDir;

pub use error::CropgenError;
pub use generator::{SampleGenerator, SampleView};
pub use geom::{Rect, Size};
pub use store::{SampleRecord, SampleStore};
pub use window::{enumerate_windows, passes_overlap, SamplerConfig};

/// The cropgen CLI application.
#[derive(Parser)]
#[command(name = "cropgen")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build a sample generator from an image directory and write its
    /// snapshot.
    Build(BuildArgs),
    /// Restore a snapshot and write sampled crops as PNG files.
    Sample(SampleArgs),
    /// Restore a snapshot and print its state.
    Inspect(InspectArgs),
}

/// Arguments for the build subcommand.
#[derive(clap::Args)]
struct BuildArgs {
    /// Directory scanned (recursively) for images.
    images: PathBuf,

    /// Snapshot file to write.
    #[arg(long, short)]
    output: PathBuf,

    /// Optional JSON sidecar with ground-truth boxes per image.
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Window size enumerated at scale 1, as WxH.
    #[arg(long, value_parser = parse_size, default_value = "32x32")]
    window_size: Size,

    /// Size every crop is resized to, as WxH.
    #[arg(long, value_parser = parse_size, default_value = "64x64")]
    output_size: Size,

    /// Minimum IoU against ground truth for a window to be kept.
    #[arg(long, default_value_t = 0.80)]
    overlap_threshold: f64,

    /// Horizontal stride of the position grid.
    #[arg(long, default_value_t = 1)]
    stride_x: u32,

    /// Vertical stride of the position grid.
    #[arg(long, default_value_t = 1)]
    stride_y: u32,

    /// Ratio between consecutive pyramid scales.
    #[arg(long, default_value_t = 2f64.powf(1.0 / 8.0))]
    scale_ratio: f64,

    /// Maximum number of pyramid scales.
    #[arg(long, default_value_t = 100)]
    max_scales: usize,

    /// Seed for deterministic shuffling and augmentation.
    #[arg(long)]
    seed: Option<u64>,
}

/// Arguments for the sample subcommand.
#[derive(clap::Args)]
struct SampleArgs {
    /// Snapshot file to restore.
    snapshot: PathBuf,

    /// Number of crops to extract.
    #[arg(long, short = 'n', default_value_t = 16)]
    count: usize,

    /// Directory the crops are written into.
    #[arg(long)]
    out_dir: PathBuf,

    /// Flip each crop left-right with probability 0.5.
    #[arg(long)]
    flip_horizontal: bool,

    /// Flip each crop top-bottom with probability 0.5.
    #[arg(long)]
    flip_vertical: bool,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// Snapshot file to restore.
    snapshot: PathBuf,
}

/// Run the cropgen CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), CropgenError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build(args)) => run_build(args),
        Some(Commands::Sample(args)) => run_sample(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => {
            println!("cropgen {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Multi-scale sliding-window crop sampler.");
            println!();
            println!("Run 'cropgen --help' for usage information.");
            Ok(())
        }
    }
}

/// One entry of the annotation sidecar: an image's relative path and its
/// ground-truth boxes.
#[derive(Debug, Deserialize)]
struct AnnotationEntry {
    file_name: String,
    #[serde(default)]
    boxes: Vec<Rect>,
}

/// Execute the build subcommand.
fn run_build(args: BuildArgs) -> Result<(), CropgenError> {
    let config = SamplerConfig {
        window_size: args.window_size,
        output_size: args.output_size,
        overlap_threshold: args.overlap_threshold,
        stride_x: args.stride_x,
        stride_y: args.stride_y,
        scale_ratio: args.scale_ratio,
        max_scales: args.max_scales,
    };

    let mut truth_by_name: HashMap<String, Vec<Rect>> = match &args.annotations {
        Some(path) => load_annotations(path)?,
        None => HashMap::new(),
    };

    let mut inputs = Vec::new();
    for (name, image) in load_images(&args.images)? {
        let truth = truth_by_name.remove(&name).unwrap_or_default();
        inputs.push((image, truth));
    }

    let generator = match args.seed {
        Some(seed) => SampleGenerator::seeded(inputs, config, seed)?,
        None => SampleGenerator::new(inputs, config)?,
    };

    let bytes = generator.snapshot()?;
    fs::write(&args.output, &bytes)?;
    info!(
        "wrote snapshot {} ({} records, {} bytes)",
        args.output.display(),
        generator.len(),
        bytes.len()
    );
    println!(
        "{} records over {} image(s) -> {}",
        generator.len(),
        generator.image_count(),
        args.output.display()
    );
    Ok(())
}

/// Execute the sample subcommand.
fn run_sample(args: SampleArgs) -> Result<(), CropgenError> {
    let bytes = fs::read(&args.snapshot)?;
    let mut generator = SampleGenerator::restore(&bytes)?;

    fs::create_dir_all(&args.out_dir)?;
    let crops = generator.get_batch(args.count, args.flip_horizontal, args.flip_vertical)?;
    for (i, crop) in crops.iter().enumerate() {
        let path = args.out_dir.join(format!("crop_{i:05}.png"));
        crop.save(&path)
            .map_err(|source| CropgenError::ImageEncode {
                path: path.clone(),
                source,
            })?;
    }
    println!("wrote {} crops to {}", crops.len(), args.out_dir.display());
    Ok(())
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), CropgenError> {
    let bytes = fs::read(&args.snapshot)?;
    let generator = SampleGenerator::restore(&bytes)?;
    let config = generator.config();

    println!("snapshot: {}", args.snapshot.display());
    println!("images:   {}", generator.image_count());
    println!("records:  {}", generator.len());
    println!(
        "epoch:    cursor {} of {}",
        generator.cursor(),
        generator.len()
    );
    println!(
        "config:   window {} -> output {}, threshold {:.2}, stride {}x{}, ratio {:.4}, max {} scales",
        config.window_size,
        config.output_size,
        config.overlap_threshold,
        config.stride_x,
        config.stride_y,
        config.scale_ratio,
        config.max_scales
    );
    match generator.peek_next() {
        Some(view) => println!(
            "next:     image {} ({}x{}), window ({}, {}) {}x{}",
            view.image_index,
            view.image.width(),
            view.image.height(),
            view.window.x,
            view.window.y,
            view.window.width,
            view.window.height
        ),
        None => println!("next:     epoch boundary (reshuffle pending)"),
    }
    Ok(())
}

/// Parses a `WxH` size argument.
fn parse_size(value: &str) -> Result<Size, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("'{value}' is not a WxH size"))?;
    let width: u32 = w
        .trim()
        .parse()
        .map_err(|_| format!("'{w}' is not a valid width"))?;
    let height: u32 = h
        .trim()
        .parse()
        .map_err(|_| format!("'{h}' is not a valid height"))?;
    Ok(Size::new(width, height))
}

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Loads every image under `dir`, sorted by relative path so image indices
/// are deterministic across runs.
fn load_images(dir: &Path) -> Result<Vec<(String, RgbImage)>, CropgenError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let matches_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }
        let name = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        paths.push((name, path));
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    if paths.is_empty() {
        return Err(CropgenError::EmptyImageDir {
            path: dir.to_path_buf(),
        });
    }

    let mut images = Vec::with_capacity(paths.len());
    for (name, path) in paths {
        let image = image::open(&path)
            .map_err(|source| CropgenError::ImageDecode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        images.push((name, image));
    }
    Ok(images)
}

/// Loads the annotation sidecar, keyed by relative image path.
fn load_annotations(path: &Path) -> Result<HashMap<String, Vec<Rect>>, CropgenError> {
    let data = fs::read(path)?;
    let entries: Vec<AnnotationEntry> =
        serde_json::from_slice(&data).map_err(|source| CropgenError::AnnotationParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(entries
        .into_iter()
        .map(|entry| (entry.file_name, entry.boxes))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_accepts_wxh() {
        assert_eq!(parse_size("32x48").unwrap(), Size::new(32, 48));
        assert_eq!(parse_size("640X480").unwrap(), Size::new(640, 480));
        assert!(parse_size("32").is_err());
        assert!(parse_size("ax4").is_err());
    }
}
