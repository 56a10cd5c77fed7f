//! Fuzz target for snapshot restore.
//!
//! This fuzzer feeds arbitrary byte sequences to the snapshot decoder,
//! checking for panics, crashes, or hangs. Every structural error must come
//! back as a `CropgenError`, never a panic.

#![no_main]

use cropgen::SampleGenerator;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = SampleGenerator::restore(data);
});
