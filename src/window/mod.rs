//! Multi-scale sliding-window enumeration and ground-truth overlap
//! filtering.
//!
//! Enumeration walks a geometric scale pyramid: at scale step `s` the image
//! is conceptually downscaled by `scale_ratio^s`, candidate positions are
//! taken on a stride grid over the downscaled image, and each position is
//! mapped back to a full-resolution rectangle. The walk stops once the
//! downscaled image no longer holds the base window, or after `max_scales`
//! steps.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::CropgenError;
use crate::geom::{Rect, Size};
use crate::store::SampleRecord;

/// Window geometry configuration for sample generation.
///
/// `window_size` is the window enumerated at scale 1; `output_size` is the
/// fixed size every extracted crop is resized to. The remaining fields
/// control the pyramid walk and the ground-truth overlap filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Base window size enumerated at scale 1.
    pub window_size: Size,
    /// Every crop is resized to this size before being returned.
    pub output_size: Size,
    /// Minimum IoU against any ground-truth box for a window to be kept.
    pub overlap_threshold: f64,
    /// Horizontal step of the position grid, in downscaled pixels.
    pub stride_x: u32,
    /// Vertical step of the position grid, in downscaled pixels.
    pub stride_y: u32,
    /// Geometric ratio between consecutive scales. Must be greater than 1.
    pub scale_ratio: f64,
    /// Upper bound on the number of pyramid scales.
    pub max_scales: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window_size: Size::new(64, 64),
            output_size: Size::new(64, 64),
            overlap_threshold: 0.80,
            stride_x: 1,
            stride_y: 1,
            scale_ratio: 2f64.powf(1.0 / 8.0),
            max_scales: 100,
        }
    }
}

impl SamplerConfig {
    /// Checks the configuration before any enumeration begins.
    ///
    /// Violations are fatal at construction time; no partially-built
    /// generator is ever observable.
    pub fn validate(&self) -> Result<(), CropgenError> {
        if !self.window_size.has_area() {
            return Err(CropgenError::geometry(format!(
                "window_size {} must have positive area",
                self.window_size
            )));
        }
        if !self.output_size.has_area() {
            return Err(CropgenError::geometry(format!(
                "output_size {} must have positive area",
                self.output_size
            )));
        }
        if !(self.scale_ratio > 1.0) || !self.scale_ratio.is_finite() {
            return Err(CropgenError::geometry(format!(
                "scale_ratio {} must be finite and greater than 1",
                self.scale_ratio
            )));
        }
        if self.stride_x == 0 || self.stride_y == 0 {
            return Err(CropgenError::geometry("strides must be positive"));
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(CropgenError::geometry(format!(
                "overlap_threshold {} must lie in [0, 1]",
                self.overlap_threshold
            )));
        }
        Ok(())
    }
}

/// Enumerates every valid window for one image across the scale pyramid.
///
/// Positions are walked on the stride grid of the downscaled image and
/// mapped back to full resolution with round-to-nearest, so the grid spacing
/// grows with the scale factor. A window is kept only when it lies strictly
/// inside the image: a right or bottom edge that reaches the image extent is
/// rejected, matching the exact-count contract of the enumerator.
pub fn enumerate_windows(width: u32, height: u32, cfg: &SamplerConfig) -> Vec<Rect> {
    let mut windows = Vec::new();
    let base = cfg.window_size;

    let mut step = 0usize;
    loop {
        let scale = cfg.scale_ratio.powi(step as i32);
        let scaled_w = (width as f64 / scale).round() as u32;
        let scaled_h = (height as f64 / scale).round() as u32;
        if scaled_w < base.width || scaled_h < base.height {
            break;
        }

        let win_w = (base.width as f64 * scale).round() as u32;
        let win_h = (base.height as f64 * scale).round() as u32;

        for i in (0..scaled_h as u64).step_by(cfg.stride_y as usize) {
            let y = (i as f64 * scale).round() as u32;
            if y as u64 + win_h as u64 >= height as u64 {
                continue;
            }
            for j in (0..scaled_w as u64).step_by(cfg.stride_x as usize) {
                let x = (j as f64 * scale).round() as u32;
                if x as u64 + win_w as u64 >= width as u64 {
                    continue;
                }
                windows.push(Rect::new(x, y, win_w, win_h));
            }
        }

        step += 1;
        if step >= cfg.max_scales {
            break;
        }
    }

    windows
}

/// Returns true when the candidate reaches the IoU threshold against any
/// ground-truth box.
///
/// A zero-area union never divides: such candidates are rejected outright.
pub fn passes_overlap(candidate: &Rect, truth: &[Rect], threshold: f64) -> bool {
    truth.iter().any(|gt| {
        let union = candidate.union_area(gt);
        if union == 0 {
            return false;
        }
        candidate.intersection_area(gt) as f64 / union as f64 >= threshold
    })
}

/// Runs enumeration and overlap filtering over every source image.
///
/// `sources` holds `(width, height, ground_truth)` per image. When no image
/// in the whole dataset carries ground truth the filter is bypassed and
/// every enumerated window is kept; otherwise each window must reach the
/// threshold against a box of its own image.
pub fn collect_records(sources: &[(u32, u32, &[Rect])], cfg: &SamplerConfig) -> Vec<SampleRecord> {
    let check_ground_truth = sources.iter().any(|(_, _, truth)| !truth.is_empty());

    let mut records = Vec::new();
    for (image_index, (width, height, truth)) in sources.iter().enumerate() {
        debug!(
            "enumerating image {}/{} ({}x{}, {} ground-truth boxes)",
            image_index + 1,
            sources.len(),
            width,
            height,
            truth.len()
        );

        let before = records.len();
        for window in enumerate_windows(*width, *height, cfg) {
            if check_ground_truth && !passes_overlap(&window, truth, cfg.overlap_threshold) {
                continue;
            }
            records.push(SampleRecord {
                image_index,
                window,
            });
        }
        debug!(
            "image {} contributed {} windows",
            image_index,
            records.len() - before
        );
    }

    records
}
