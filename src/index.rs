//! Color index: groups every pixel of a raster by its quantized color.
//!
//! The index is rebuilt from scratch whenever the raster changes, since a
//! recolor can move pixels from one bucket to another.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::color::{ColorKey, Quantizer, Rgb};
use crate::raster::{Coord, RasterBuffer};

/// Bucket key with its pixel count, for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCount {
    pub color: ColorKey,
    pub count: usize,
}

/// UI-facing view of one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    pub key: ColorKey,
    pub rgb: Rgb,
    pub hex_color: String,
    pub pixel_count: usize,
}

impl ColorInfo {
    pub fn new(key: ColorKey, pixel_count: usize) -> Self {
        let rgb = key.rgb();
        Self {
            key,
            rgb,
            hex_color: rgb.to_hex(),
            pixel_count,
        }
    }
}

impl From<&ColorCount> for ColorInfo {
    fn from(c: &ColorCount) -> Self {
        ColorInfo::new(c.color, c.count)
    }
}

#[derive(Debug, Clone)]
pub struct ColorIndex {
    levels: u16,
    width: u32,
    height: u32,
    buckets: HashMap<ColorKey, Vec<Coord>>,
}

impl ColorIndex {
    /// Scan the buffer once, row by row, bucketing pixels by quantized RGB.
    /// Alpha is ignored. Coordinates inside a bucket keep scan order.
    pub fn build(buffer: &RasterBuffer, quantizer: &Quantizer) -> Self {
        let (width, height) = buffer.dimensions();
        let mut buckets: HashMap<ColorKey, Vec<Coord>> = HashMap::new();

        if width > 0 {
            for (i, px) in buffer.as_bytes().chunks_exact(4).enumerate() {
                let key = quantizer.quantize_rgb(px[0], px[1], px[2]);
                let coord = Coord::new(i as u32 % width, i as u32 / width);
                buckets.entry(key).or_default().push(coord);
            }
        }

        tracing::debug!(
            width,
            height,
            levels = quantizer.levels(),
            buckets = buckets.len(),
            "Built color index"
        );

        Self {
            levels: quantizer.levels(),
            width,
            height,
            buckets,
        }
    }

    /// Coordinates of one bucket; empty if the key is not present
    pub fn get(&self, key: &ColorKey) -> &[Coord] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &ColorKey) -> bool {
        self.buckets.contains_key(key)
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn levels(&self) -> u16 {
        self.levels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sum of all bucket sizes; equals `width * height`
    pub fn total_pixels(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ColorKey> {
        self.buckets.keys()
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&ColorKey, &[Coord])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Buckets by descending pixel count; equal counts ordered by key
    pub fn color_counts(&self) -> Vec<ColorCount> {
        let mut counts: Vec<ColorCount> = self
            .buckets
            .iter()
            .map(|(key, coords)| ColorCount {
                color: *key,
                count: coords.len(),
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.color.cmp(&b.color)));
        counts
    }

    pub fn color_infos(&self) -> Vec<ColorInfo> {
        self.color_counts().iter().map(ColorInfo::from).collect()
    }
}
