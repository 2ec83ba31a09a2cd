// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Difference hash (dHash) used as the content identity of scans and photos.

use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::contrast::stretch_contrast;
use scanwerk_core::types::ContentHash;

use crate::raster::RasterImage;

const HASH_WIDTH: u32 = 8;
const HASH_HEIGHT: u32 = 8;

/// Computes 64-bit difference hashes.
///
/// The image is reduced to grey, contrast-stretched to the full 0-255 range
/// and resampled to 9x8. Each bit records whether a cell is darker than its
/// right-hand neighbour, so the hash survives re-encoding, rescaling and
/// global brightness changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    pub fn hash(&self, image: &RasterImage) -> ContentHash {
        ContentHash::from_bits(self.bits(image))
    }

    /// The raw hash. Bits are emitted column by column, top to bottom,
    /// most significant first.
    pub fn bits(&self, image: &RasterImage) -> u64 {
        let gray = stretch(image.as_dynamic().to_luma8());
        let small = imageops::resize(&gray, HASH_WIDTH + 1, HASH_HEIGHT, FilterType::Lanczos3);

        let mut bits = 0u64;
        for col in 0..HASH_WIDTH {
            for row in 0..HASH_HEIGHT {
                let here = small.get_pixel(col, row).0[0];
                let right = small.get_pixel(col + 1, row).0[0];
                bits = (bits << 1) | u64::from(here < right);
            }
        }
        bits
    }
}

/// Linear contrast stretch of the intensity range onto 0-255. Flat images
/// are returned as they are.
fn stretch(gray: GrayImage) -> GrayImage {
    let (min, max) = gray
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return gray;
    }
    stretch_contrast(&gray, min, max, 0, u8::MAX)
}
