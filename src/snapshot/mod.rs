//! Snapshot encoding and validated restore for [`SampleGenerator`].
//!
//! Layout: `magic | u32 header length | JSON header | raw RGB planes |
//! crc32c trailer`. The header carries the sampler config, the sample
//! records, the traversal order and cursor, and per-image dimensions; pixel
//! data follows as tightly packed 8-bit RGB rows in image order. The crc32c
//! word covers every preceding byte.
//!
//! Random generator state is process-local and never serialized; a restored
//! generator reseeds its shuffle and flip streams from OS entropy.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::CropgenError;
use crate::generator::SampleGenerator;
use crate::store::{SampleRecord, SampleStore};
use crate::window::SamplerConfig;

const MAGIC: [u8; 8] = *b"CROPGEN\x01";
const VERSION: u32 = 1;
/// 8-bit RGB, three channels. The only payload format currently written.
const FORMAT_RGB8: u8 = 3;

#[derive(Serialize, Deserialize)]
struct ImageMeta {
    width: u32,
    height: u32,
    format: u8,
}

#[derive(Serialize, Deserialize)]
struct SnapshotHeader {
    version: u32,
    config: SamplerConfig,
    images: Vec<ImageMeta>,
    records: Vec<SampleRecord>,
    order: Vec<usize>,
    cursor: usize,
}

/// Serializes the generator's entire state to opaque bytes.
pub fn encode(generator: &SampleGenerator) -> Result<Vec<u8>, CropgenError> {
    let store = generator.store();
    let header = SnapshotHeader {
        version: VERSION,
        config: *generator.config(),
        images: generator
            .images()
            .iter()
            .map(|img| ImageMeta {
                width: img.width(),
                height: img.height(),
                format: FORMAT_RGB8,
            })
            .collect(),
        records: store.records().to_vec(),
        order: store.order().to_vec(),
        cursor: store.cursor(),
    };
    let header_bytes =
        serde_json::to_vec(&header).map_err(|source| CropgenError::SnapshotHeader { source })?;

    let pixel_len: usize = generator.images().iter().map(|img| img.as_raw().len()).sum();
    let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + header_bytes.len() + pixel_len + 4);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&header_bytes);
    for img in generator.images() {
        bytes.extend_from_slice(img.as_raw());
    }
    let crc = crc32c::crc32c(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());
    Ok(bytes)
}

/// Reconstructs a generator from snapshot bytes.
///
/// Every structural invariant is re-checked: magic and checksum, header
/// parse, config geometry, permutation and cursor bounds, record/image
/// consistency, and exact pixel payload length. Restore is all-or-nothing.
pub fn decode(bytes: &[u8]) -> Result<SampleGenerator, CropgenError> {
    let min_len = MAGIC.len() + 4 + 4;
    if bytes.len() < min_len {
        return Err(CropgenError::SnapshotTruncated {
            expected: min_len,
            actual: bytes.len(),
        });
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(CropgenError::SnapshotBadMagic);
    }

    let body = &bytes[..bytes.len() - 4];
    let stored = read_u32_le(&bytes[bytes.len() - 4..]);
    let computed = crc32c::crc32c(body);
    if stored != computed {
        return Err(CropgenError::SnapshotChecksum { stored, computed });
    }

    let header_len = read_u32_le(&body[MAGIC.len()..]) as usize;
    let header_start = MAGIC.len() + 4;
    let header_end = header_start
        .checked_add(header_len)
        .filter(|&end| end <= body.len())
        .ok_or(CropgenError::SnapshotTruncated {
            expected: header_start + header_len + 4,
            actual: bytes.len(),
        })?;

    let header: SnapshotHeader = serde_json::from_slice(&body[header_start..header_end])
        .map_err(|source| CropgenError::SnapshotHeader { source })?;
    if header.version != VERSION {
        return Err(CropgenError::payload(format!(
            "unsupported snapshot version {}",
            header.version
        )));
    }
    header.config.validate()?;

    let payload = &body[header_end..];
    let expected_len: u128 = header
        .images
        .iter()
        .map(|meta| meta.width as u128 * meta.height as u128 * 3)
        .sum();
    if header.images.iter().any(|meta| meta.format != FORMAT_RGB8) {
        return Err(CropgenError::payload("unsupported image format tag"));
    }
    if expected_len != payload.len() as u128 {
        return Err(CropgenError::payload(format!(
            "pixel payload holds {} bytes, header describes {}",
            payload.len(),
            expected_len
        )));
    }

    let mut images = Vec::with_capacity(header.images.len());
    let mut offset = 0usize;
    for meta in &header.images {
        let len = (meta.width as usize) * (meta.height as usize) * 3;
        let plane = payload[offset..offset + len].to_vec();
        offset += len;
        let img = RgbImage::from_raw(meta.width, meta.height, plane)
            .ok_or_else(|| CropgenError::payload("image plane does not match its dimensions"))?;
        images.push(img);
    }

    for (sample_index, record) in header.records.iter().enumerate() {
        let meta = header.images.get(record.image_index).ok_or_else(|| {
            CropgenError::payload(format!(
                "sample {} references missing image {}",
                sample_index, record.image_index
            ))
        })?;
        if !record.window.has_area() {
            return Err(CropgenError::payload(format!(
                "sample {sample_index} has a zero-area window"
            )));
        }
        if !record.window.fits_within(meta.width, meta.height) {
            return Err(CropgenError::ImageBoundsViolation {
                sample_index,
                image_index: record.image_index,
                window: record.window,
                width: meta.width,
                height: meta.height,
            });
        }
    }

    let store = SampleStore::from_parts(header.records, header.order, header.cursor)?;
    Ok(SampleGenerator::from_parts(images, store, header.config))
}

/// Reads a little-endian u32 from the first four bytes of `bytes`.
///
/// Callers guarantee at least four bytes remain.
fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

impl SampleGenerator {
    /// Snapshots the entire generator state as opaque bytes.
    pub fn snapshot(&self) -> Result<Vec<u8>, CropgenError> {
        encode(self)
    }

    /// Restores a generator from [`snapshot`](Self::snapshot) bytes,
    /// resuming traversal exactly where the source instance left off.
    pub fn restore(bytes: &[u8]) -> Result<Self, CropgenError> {
        decode(bytes)
    }
}
