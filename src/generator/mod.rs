//! Sample generation: construction-time enumeration plus the crop
//! extraction pipeline.
//!
//! A [`SampleGenerator`] owns its images for its whole lifetime. Windows are
//! enumerated and filtered once, at construction; afterwards every
//! [`get_single`](SampleGenerator::get_single) call pulls the next shuffled
//! record, crops it with copy semantics, applies the requested flip
//! augmentations with a fair coin each, and resizes to the configured output
//! size with bilinear interpolation.

use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::error::CropgenError;
use crate::geom::Rect;
use crate::store::SampleStore;
use crate::window::{collect_records, SamplerConfig};

/// Salt applied to a caller seed so the flip generator never mirrors the
/// shuffle generator's stream.
const FLIP_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Multi-scale sliding-window sample generator.
///
/// See the crate docs for the full construction/extraction contract.
#[derive(Debug)]
pub struct SampleGenerator {
    images: Vec<RgbImage>,
    store: SampleStore,
    config: SamplerConfig,
    flip_rng: StdRng,
}

/// Inspection view of the next sample, for manual debugging only.
///
/// Borrowing from the generator keeps the view read-only; it never advances
/// the traversal.
#[derive(Debug)]
pub struct SampleView<'a> {
    pub image_index: usize,
    pub image: &'a RgbImage,
    pub window: Rect,
}

impl SampleGenerator {
    /// Builds a generator over `inputs`, each an image with its (possibly
    /// empty) set of ground-truth boxes.
    ///
    /// Enumeration and overlap filtering run here, once. Construction
    /// succeeds with zero surviving records; sampling calls then fail with
    /// [`CropgenError::EmptyDataset`].
    pub fn new(
        inputs: Vec<(RgbImage, Vec<Rect>)>,
        config: SamplerConfig,
    ) -> Result<Self, CropgenError> {
        Self::build(inputs, config, None)
    }

    /// Like [`new`](Self::new), but with deterministic shuffle and flip
    /// streams derived from `seed`.
    pub fn seeded(
        inputs: Vec<(RgbImage, Vec<Rect>)>,
        config: SamplerConfig,
        seed: u64,
    ) -> Result<Self, CropgenError> {
        Self::build(inputs, config, Some(seed))
    }

    fn build(
        inputs: Vec<(RgbImage, Vec<Rect>)>,
        config: SamplerConfig,
        seed: Option<u64>,
    ) -> Result<Self, CropgenError> {
        config.validate()?;

        let records = {
            let sources: Vec<(u32, u32, &[Rect])> = inputs
                .iter()
                .map(|(img, truth)| (img.width(), img.height(), truth.as_slice()))
                .collect();
            collect_records(&sources, &config)
        };

        let image_count = inputs.len();
        if records.is_empty() {
            warn!("no windows survived enumeration over {image_count} image(s)");
        } else {
            info!(
                "collected {} windows over {} image(s) ({:.2} per image)",
                records.len(),
                image_count,
                records.len() as f64 / image_count.max(1) as f64
            );
        }

        let images = inputs.into_iter().map(|(img, _)| img).collect();
        let flip_rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ FLIP_SEED_SALT),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Ok(Self {
            images,
            store: SampleStore::new(records, seed),
            config,
            flip_rng,
        })
    }

    /// Reassembles a generator from restored parts. RNG streams are fresh;
    /// they are never carried across a snapshot.
    pub(crate) fn from_parts(
        images: Vec<RgbImage>,
        store: SampleStore,
        config: SamplerConfig,
    ) -> Self {
        Self {
            images,
            store,
            config,
            flip_rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Returns the number of sampleable records.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true when no records survived enumeration and filtering.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns the sampler configuration.
    #[inline]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Returns the traversal cursor within the current epoch.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.store.cursor()
    }

    /// Returns the number of owned images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn images(&self) -> &[RgbImage] {
        &self.images
    }

    pub(crate) fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Extracts the next crop.
    ///
    /// Each flip flag draws one independent fair coin; the crop is then
    /// resized to the configured output size with bilinear interpolation.
    /// The returned buffer never aliases the source image.
    pub fn get_single(
        &mut self,
        rnd_horz_flip: bool,
        rnd_vert_flip: bool,
    ) -> Result<RgbImage, CropgenError> {
        let index = self.store.next_index()?;
        let record = *self.store.record(index);
        let window = record.window;
        let source = &self.images[record.image_index];

        let mut crop =
            imageops::crop_imm(source, window.x, window.y, window.width, window.height).to_image();
        if rnd_horz_flip && self.flip_rng.random_bool(0.5) {
            imageops::flip_horizontal_in_place(&mut crop);
        }
        if rnd_vert_flip && self.flip_rng.random_bool(0.5) {
            imageops::flip_vertical_in_place(&mut crop);
        }

        let out = self.config.output_size;
        Ok(imageops::resize(
            &crop,
            out.width,
            out.height,
            FilterType::Triangle,
        ))
    }

    /// Extracts `batch_size` crops as `batch_size` sequential
    /// [`get_single`](Self::get_single) calls with the same flags.
    pub fn get_batch(
        &mut self,
        batch_size: usize,
        rnd_horz_flip: bool,
        rnd_vert_flip: bool,
    ) -> Result<Vec<RgbImage>, CropgenError> {
        let mut crops = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            crops.push(self.get_single(rnd_horz_flip, rnd_vert_flip)?);
        }
        Ok(crops)
    }

    /// Returns the source image and window of the next sample without
    /// advancing the traversal.
    ///
    /// `None` on an empty generator, and at an epoch boundary where the next
    /// index is undetermined until the reshuffle inside `get_single`.
    pub fn peek_next(&self) -> Option<SampleView<'_>> {
        let index = self.store.peek_index()?;
        let record = self.store.record(index);
        Some(SampleView {
            image_index: record.image_index,
            image: &self.images[record.image_index],
            window: record.window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Size;

    /// Image whose red channel encodes the column and green the row, so any
    /// crop pinpoints its source window and orientation.
    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 16) as u8, (y * 16) as u8, 0])
        })
    }

    fn config(window: u32, output: u32) -> SamplerConfig {
        SamplerConfig {
            window_size: Size::new(window, window),
            output_size: Size::new(output, output),
            stride_x: 1,
            stride_y: 1,
            scale_ratio: 2.0,
            max_scales: 1,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn crops_have_the_configured_output_size() {
        let mut gen =
            SampleGenerator::seeded(vec![(gradient_image(12, 12), Vec::new())], config(4, 9), 5)
                .unwrap();
        assert!(!gen.is_empty());
        let crop = gen.get_single(false, false).unwrap();
        assert_eq!(crop.dimensions(), (9, 9));
    }

    #[test]
    fn unflipped_crop_reproduces_the_source_window() {
        let mut gen =
            SampleGenerator::seeded(vec![(gradient_image(12, 12), Vec::new())], config(4, 4), 5)
                .unwrap();
        let view = gen.peek_next().expect("peek mid-epoch");
        let window = view.window;
        let crop = gen.get_single(false, false).unwrap();
        // Same-size bilinear resize is the identity, so the crop matches the
        // window region pixel for pixel.
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(
                    crop.get_pixel(x, y),
                    gradient_image(12, 12).get_pixel(window.x + x, window.y + y)
                );
            }
        }
    }

    #[test]
    fn horizontal_flip_rate_is_close_to_half() {
        let mut gen =
            SampleGenerator::seeded(vec![(gradient_image(12, 12), Vec::new())], config(4, 4), 99)
                .unwrap();
        let mut flipped = 0u32;
        let mut observed = 0u32;
        for _ in 0..10_000u32 {
            let window = gen.peek_next().map(|view| view.window);
            let crop = gen.get_single(true, false).unwrap();
            // Epoch boundaries hide the peek for that draw; skip those.
            if let Some(window) = window {
                observed += 1;
                // Red encodes the source column: a flipped crop descends.
                let expected_left = (window.x * 16) as u8;
                if crop.get_pixel(0, 0)[0] != expected_left {
                    flipped += 1;
                }
            }
        }
        let fraction = flipped as f64 / observed as f64;
        assert!(
            (0.47..=0.53).contains(&fraction),
            "flip fraction {fraction} out of tolerance"
        );
    }

    #[test]
    fn vertical_flip_flag_flips_rows() {
        let mut gen =
            SampleGenerator::seeded(vec![(gradient_image(12, 12), Vec::new())], config(4, 4), 1)
                .unwrap();
        let mut saw_flip = false;
        for _ in 0..64 {
            let window = gen.peek_next().map(|view| view.window);
            let crop = gen.get_single(false, true).unwrap();
            if let Some(window) = window {
                let expected_top = (window.y * 16) as u8;
                if crop.get_pixel(0, 0)[1] != expected_top {
                    // Green encodes the row; a mismatch means rows reversed.
                    assert_eq!(crop.get_pixel(0, 0)[1], ((window.y + 3) * 16) as u8);
                    saw_flip = true;
                }
            }
        }
        assert!(saw_flip, "no vertical flip observed in 64 fair coin tosses");
    }

    #[test]
    fn batch_is_sequential_singles() {
        let mut gen =
            SampleGenerator::seeded(vec![(gradient_image(12, 12), Vec::new())], config(4, 4), 7)
                .unwrap();
        let batch = gen.get_batch(5, false, false).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(gen.cursor(), 5);
        for crop in &batch {
            assert_eq!(crop.dimensions(), (4, 4));
        }
    }

    #[test]
    fn seeded_generators_produce_identical_streams() {
        let make = || {
            SampleGenerator::seeded(vec![(gradient_image(16, 16), Vec::new())], config(4, 6), 21)
                .unwrap()
        };
        let mut a = make();
        let mut b = make();
        for _ in 0..40 {
            let ca = a.get_single(true, true).unwrap();
            let cb = b.get_single(true, true).unwrap();
            assert_eq!(ca.as_raw(), cb.as_raw());
        }
    }

    #[test]
    fn sampling_an_empty_generator_fails() {
        // 10x10 image cannot hold a 32x32 window.
        let mut gen =
            SampleGenerator::new(vec![(gradient_image(10, 10), Vec::new())], config(32, 32))
                .unwrap();
        assert!(gen.is_empty());
        assert!(matches!(
            gen.get_single(false, false),
            Err(CropgenError::EmptyDataset)
        ));
        assert!(matches!(
            gen.get_batch(3, false, false),
            Err(CropgenError::EmptyDataset)
        ));
        assert!(gen.peek_next().is_none());
    }

    #[test]
    fn invalid_geometry_aborts_construction() {
        let bad = SamplerConfig {
            output_size: Size::new(0, 4),
            ..config(4, 4)
        };
        assert!(matches!(
            SampleGenerator::new(vec![(gradient_image(8, 8), Vec::new())], bad),
            Err(CropgenError::InvalidGeometry { .. })
        ));
    }
}
