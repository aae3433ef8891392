//! Average-hash fingerprints for catching repeated figures.

use std::collections::HashSet;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::FigureError;
use crate::models::config::HashingConfig;

/// Computes an average hash (aHash) over a square luminance grid.
///
/// The crop is downscaled to `grid_size x grid_size`, each cell's luminance
/// (`0.299 R + 0.587 G + 0.114 B`) is compared against the grid mean, and the
/// resulting bits are packed four per hex digit in raster order. The default
/// 16x16 grid yields a 64-character string.
#[derive(Debug, Clone)]
pub struct PerceptualHasher {
    grid_size: u32,
}

impl PerceptualHasher {
    /// Create a hasher with a 16x16 grid.
    pub fn new() -> Self {
        Self { grid_size: 16 }
    }

    /// Create a hasher from configuration.
    pub fn from_config(config: &HashingConfig) -> Self {
        Self::new().with_grid_size(config.grid_size)
    }

    /// Set the grid side length (at least 1).
    pub fn with_grid_size(mut self, size: u32) -> Self {
        self.grid_size = size.max(1);
        self
    }

    /// Hash encoded image bytes.
    pub fn hash(&self, bytes: &[u8]) -> Result<String, FigureError> {
        let image = image::load_from_memory(bytes).map_err(|e| FigureError::Hash(e.to_string()))?;
        Ok(self.hash_image(&image))
    }

    /// Hash a decoded image.
    pub fn hash_image(&self, image: &DynamicImage) -> String {
        let grid = self.grid_size;
        let small = image.resize_exact(grid, grid, FilterType::Triangle).to_rgb8();

        // Luminance scaled by 1000 keeps the mean comparison exact.
        let luma: Vec<u64> = small
            .pixels()
            .map(|p| 299 * p[0] as u64 + 587 * p[1] as u64 + 114 * p[2] as u64)
            .collect();

        let count = luma.len() as u64;
        let sum: u64 = luma.iter().sum();

        luma.chunks(4)
            .map(|chunk| {
                let nibble = chunk.iter().enumerate().fold(0u32, |acc, (i, &l)| {
                    if l * count >= sum { acc | (8 >> i) } else { acc }
                });
                char::from_digit(nibble, 16).unwrap_or('0')
            })
            .collect()
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes accepted during one image's processing pass.
///
/// Construct a fresh set per image; figures legitimately repeat across pages.
#[derive(Debug, Clone, Default)]
pub struct SeenHashes {
    hashes: HashSet<String>,
}

impl SeenHashes {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `hash` was already accepted.
    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Record `hash`; returns false if it was already present.
    pub fn insert(&mut self, hash: impl Into<String>) -> bool {
        self.hashes.insert(hash.into())
    }

    /// Number of accepted hashes.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// True if nothing has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
