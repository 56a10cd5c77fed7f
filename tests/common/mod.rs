// Each integration test binary compiles its own copy of this module and
// uses a different subset of the helpers.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use cropgen::{SamplerConfig, Size};
use image::{Rgb, RgbImage};

/// Synthetic image whose red channel encodes the column and green channel
/// the row, making crop geometry recoverable from pixel values.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Writes a gradient PNG, creating parent directories as needed.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    gradient_image(width, height)
        .save(path)
        .expect("write png file");
}

/// Single-scale configuration with square windows, convenient for exact
/// window-count arithmetic in tests.
pub fn single_scale_config(window: u32, output: u32, stride: u32) -> SamplerConfig {
    SamplerConfig {
        window_size: Size::new(window, window),
        output_size: Size::new(output, output),
        stride_x: stride,
        stride_y: stride,
        scale_ratio: 2.0,
        max_scales: 1,
        ..SamplerConfig::default()
    }
}
