//! Resolves a "replace this color" request into concrete pixel positions.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::color::{color_distance, ColorKey};
use crate::index::ColorIndex;
use crate::raster::Coord;

/// Threshold used by the coarse (default) similarity mode
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 100.0;

/// Threshold for a tighter "fine" similarity mode
pub const FINE_SIMILARITY_THRESHOLD: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilaritySettings {
    /// Also take buckets within `threshold` of the source color
    pub include_similar: bool,
    /// Maximum Euclidean RGB distance between bucket colors, inclusive
    pub threshold: f32,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            include_similar: false,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl SimilaritySettings {
    pub fn exact() -> Self {
        Self::default()
    }

    pub fn similar(threshold: f32) -> Self {
        Self {
            include_similar: true,
            threshold,
        }
    }
}

/// Keys whose pixels a request covers, closest first.
///
/// The source key always comes first (distance 0) even when it has no
/// pixels; remaining keys are ordered by distance, then by key.
pub fn matching_keys(index: &ColorIndex, source: ColorKey, settings: &SimilaritySettings) -> Vec<ColorKey> {
    if !settings.include_similar {
        return vec![source];
    }

    let target = source.rgb();
    let keys: Vec<ColorKey> = index.keys().copied().collect();

    let mut matched: Vec<(f32, ColorKey)> = keys
        .par_iter()
        .filter(|key| **key != source)
        .filter_map(|key| {
            let d = color_distance(key.rgb(), target);
            (d <= settings.threshold).then_some((d, *key))
        })
        .collect();

    matched.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    std::iter::once(source)
        .chain(matched.into_iter().map(|(_, key)| key))
        .collect()
}

/// All coordinates to rewrite for `source`, bucket by bucket in
/// `matching_keys` order, scan order within each bucket.
pub fn resolve(index: &ColorIndex, source: ColorKey, settings: &SimilaritySettings) -> Vec<Coord> {
    let keys = matching_keys(index, source, settings);
    let total = keys.iter().map(|k| index.get(k).len()).sum();

    let mut coords = Vec::with_capacity(total);
    for key in &keys {
        coords.extend_from_slice(index.get(key));
    }

    tracing::debug!(
        source = %source,
        include_similar = settings.include_similar,
        threshold = settings.threshold,
        buckets = keys.len(),
        pixels = coords.len(),
        "Resolved color selection"
    );

    coords
}

/// Every `stride`-th coordinate, starting with the first, for cheap previews.
/// A stride of 0 behaves like 1.
pub fn sample(coords: &[Coord], stride: usize) -> Vec<Coord> {
    coords.iter().step_by(stride.max(1)).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Quantizer, Rgb};
    use crate::raster::RasterBuffer;
    use std::collections::HashSet;

    fn key(r: u8, g: u8, b: u8) -> ColorKey {
        ColorKey::from_quantized(Rgb::new(r, g, b))
    }

    /// One row: two reds, a dark red, a mid red, a green and a blue
    fn gradient_index() -> ColorIndex {
        let pixels: [[u8; 4]; 6] = [
            [255, 0, 0, 255],
            [250, 10, 10, 255],
            [200, 0, 0, 255],
            [130, 0, 0, 255],
            [0, 255, 0, 255],
            [0, 0, 255, 255],
        ];
        let data = pixels.iter().flatten().copied().collect();
        let buf = RasterBuffer::new(6, 1, data).unwrap();
        ColorIndex::build(&buf, &Quantizer::new(8).unwrap())
    }

    #[test]
    fn test_exact_mode_is_single_bucket() {
        let index = gradient_index();
        let coords = resolve(&index, key(224, 0, 0), &SimilaritySettings::exact());
        assert_eq!(coords, vec![Coord::new(0, 0), Coord::new(1, 0)]);
    }

    #[test]
    fn test_unknown_key_resolves_empty() {
        let index = gradient_index();
        let coords = resolve(&index, key(32, 32, 32), &SimilaritySettings::exact());
        assert!(coords.is_empty());
    }

    #[test]
    fn test_similarity_threshold_inclusive() {
        let index = gradient_index();
        // 224 -> 192 is exactly 32 apart
        let at = resolve(&index, key(224, 0, 0), &SimilaritySettings::similar(32.0));
        assert_eq!(at.len(), 3);
        let below = resolve(&index, key(224, 0, 0), &SimilaritySettings::similar(31.9));
        assert_eq!(below.len(), 2);
    }

    #[test]
    fn test_similarity_orders_by_distance() {
        let index = gradient_index();
        let keys = matching_keys(&index, key(224, 0, 0), &SimilaritySettings::similar(100.0));
        assert_eq!(keys, vec![key(224, 0, 0), key(192, 0, 0), key(128, 0, 0)]);

        let coords = resolve(&index, key(224, 0, 0), &SimilaritySettings::similar(100.0));
        assert_eq!(
            coords,
            vec![Coord::new(0, 0), Coord::new(1, 0), Coord::new(2, 0), Coord::new(3, 0)]
        );
    }

    #[test]
    fn test_similarity_superset_and_monotonic() {
        let index = gradient_index();
        let source = key(224, 0, 0);
        let exact: HashSet<Coord> = resolve(&index, source, &SimilaritySettings::exact())
            .into_iter()
            .collect();

        let mut previous = exact.clone();
        for t in [0.0, FINE_SIMILARITY_THRESHOLD, 50.0, DEFAULT_SIMILARITY_THRESHOLD, 300.0, 500.0] {
            let set: HashSet<Coord> = resolve(&index, source, &SimilaritySettings::similar(t))
                .into_iter()
                .collect();
            assert!(set.is_superset(&exact), "threshold {}", t);
            assert!(set.is_superset(&previous), "threshold {}", t);
            previous = set;
        }
        assert_eq!(previous.len(), index.total_pixels());
    }

    #[test]
    fn test_sample_every_nth() {
        let coords: Vec<Coord> = (0..25).map(|x| Coord::new(x, 0)).collect();
        let sampled = sample(&coords, 10);
        assert_eq!(sampled, vec![Coord::new(0, 0), Coord::new(10, 0), Coord::new(20, 0)]);
        assert_eq!(sample(&coords, 10), sampled);
    }

    #[test]
    fn test_sample_zero_stride_keeps_all() {
        let coords: Vec<Coord> = (0..4).map(|x| Coord::new(x, 0)).collect();
        assert_eq!(sample(&coords, 0), coords);
        assert!(sample(&[], 3).is_empty());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SimilaritySettings::default();
        assert!(!settings.include_similar);
        assert_eq!(settings.threshold, 100.0);
    }
}
