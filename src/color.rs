//! Color primitives: RGB triples, quantized color keys, hex conversion and
//! the channel quantizer that collapses 16M colors into a few hundred buckets.

use palette::Srgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::{Result, RecolorError};

/// Default number of quantization levels per channel
pub const DEFAULT_QUANTIZATION_LEVELS: u16 = 8;

/// Largest level count that still maps onto 8-bit channels
pub const MAX_QUANTIZATION_LEVELS: u16 = 256;

// ============================================================================
// RGB
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Display form: `#` followed by two lowercase hex digits per channel
    pub fn to_hex(self) -> String {
        rgb_to_hex(self.r, self.g, self.b)
    }
}

impl From<Srgb<u8>> for Rgb {
    fn from(c: Srgb<u8>) -> Self {
        Self::new(c.red, c.green, c.blue)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// Single RGB channel, used by the selection editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    R,
    G,
    B,
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Parse `#rrggbb`, `rrggbb` or the three-digit shorthand `#rgb`
pub fn hex_to_rgb(hex: &str) -> Result<Rgb> {
    let parsed: Srgb<u8> = hex
        .trim()
        .parse()
        .map_err(|e| RecolorError::InvalidColor(format!("{:?}: {}", hex, e)))?;
    Ok(parsed.into())
}

/// Euclidean distance in RGB space
pub fn color_distance(a: Rgb, b: Rgb) -> f32 {
    let dr = a.r as f32 - b.r as f32;
    let dg = a.g as f32 - b.g as f32;
    let db = a.b as f32 - b.b as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}

// ============================================================================
// COLOR KEY
// ============================================================================

/// A quantized color, used as the bucket key of the color index.
///
/// The string form is `"R,G,B"`, which is what UI layers pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ColorKey(Rgb);

impl ColorKey {
    /// Wrap channel values that are already quantized
    pub const fn from_quantized(rgb: Rgb) -> Self {
        Self(rgb)
    }

    pub fn rgb(self) -> Rgb {
        self.0
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0.r, self.0.g, self.0.b)
    }
}

impl FromStr for ColorKey {
    type Err = RecolorError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || RecolorError::MalformedColorKey(s.to_string());

        let fields: Vec<&str> = s.split(',').collect();
        if fields.len() != 3 {
            return Err(malformed());
        }

        let mut channels = [0u8; 3];
        for (slot, field) in channels.iter_mut().zip(&fields) {
            *slot = field.trim().parse().map_err(|_| malformed())?;
        }

        Ok(Self(Rgb::new(channels[0], channels[1], channels[2])))
    }
}

impl From<ColorKey> for String {
    fn from(key: ColorKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ColorKey {
    type Error = RecolorError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

// ============================================================================
// QUANTIZER
// ============================================================================

/// Maps 8-bit channel values onto `levels` evenly sized buckets.
///
/// Each value maps to its bucket's lower boundary, `floor(v / step) * step`
/// with `step = 256 / levels`. When `levels` does not divide 256 the boundary
/// is fractional and gets rounded up, which keeps every result inside its own
/// bucket so quantizing twice is the same as quantizing once.
#[derive(Clone)]
pub struct Quantizer {
    levels: u16,
    table: [u8; 256],
}

impl Quantizer {
    pub fn new(levels: u16) -> Result<Self> {
        if levels == 0 || levels > MAX_QUANTIZATION_LEVELS {
            return Err(RecolorError::InvalidParameter(format!(
                "quantization levels must be in 1..={}, got {}",
                MAX_QUANTIZATION_LEVELS, levels
            )));
        }

        Ok(Self {
            levels,
            table: boundary_table(levels),
        })
    }

    pub fn levels(&self) -> u16 {
        self.levels
    }

    #[inline]
    pub fn quantize(&self, value: u8) -> u8 {
        self.table[value as usize]
    }

    #[inline]
    pub fn quantize_rgb(&self, r: u8, g: u8, b: u8) -> ColorKey {
        ColorKey(Rgb::new(self.quantize(r), self.quantize(g), self.quantize(b)))
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self {
            levels: DEFAULT_QUANTIZATION_LEVELS,
            table: boundary_table(DEFAULT_QUANTIZATION_LEVELS),
        }
    }
}

/// Lookup table from channel value to its bucket's (rounded up) lower boundary.
/// `levels` must already be validated.
fn boundary_table(levels: u16) -> [u8; 256] {
    let n = levels as u32;
    let mut table = [0u8; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        let bucket = value as u32 * n / 256;
        *slot = ((bucket * 256 + n - 1) / n) as u8;
    }
    table
}

impl fmt::Debug for Quantizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quantizer").field("levels", &self.levels).finish()
    }
}

/// Quantize a single channel value
pub fn quantize(value: u8, levels: u16) -> Result<u8> {
    Ok(Quantizer::new(levels)?.quantize(value))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_eight_levels() {
        assert_eq!(quantize(0, 8).unwrap(), 0);
        assert_eq!(quantize(31, 8).unwrap(), 0);
        assert_eq!(quantize(32, 8).unwrap(), 32);
        assert_eq!(quantize(100, 8).unwrap(), 96);
        assert_eq!(quantize(255, 8).unwrap(), 224);
    }

    #[test]
    fn test_quantize_rejects_bad_levels() {
        assert!(matches!(quantize(10, 0), Err(RecolorError::InvalidParameter(_))));
        assert!(matches!(quantize(10, 257), Err(RecolorError::InvalidParameter(_))));
    }

    #[test]
    fn test_quantize_idempotent() {
        for levels in [2u16, 3, 4, 5, 8, 16, 32, 100, 256] {
            let q = Quantizer::new(levels).unwrap();
            for v in 0..=255u8 {
                let once = q.quantize(v);
                assert_eq!(q.quantize(once), once, "levels {} value {}", levels, v);
            }
        }
    }

    #[test]
    fn test_quantize_monotonic() {
        for levels in [2u16, 7, 8, 32] {
            let q = Quantizer::new(levels).unwrap();
            let mut prev = 0u8;
            for v in 0..=255u8 {
                let cur = q.quantize(v);
                assert!(cur >= prev);
                assert!(cur <= v);
                prev = cur;
            }
        }
    }

    #[test]
    fn test_quantize_same_key_iff_same_bucket() {
        let q = Quantizer::new(8).unwrap();
        for a in (0..=255u8).step_by(7) {
            for b in (0..=255u8).step_by(5) {
                let same_bucket = a / 32 == b / 32;
                assert_eq!(q.quantize(a) == q.quantize(b), same_bucket);
            }
        }
    }

    #[test]
    fn test_single_level_collapses_everything() {
        let q = Quantizer::new(1).unwrap();
        assert_eq!(q.quantize(0), 0);
        assert_eq!(q.quantize(255), 0);
    }

    #[test]
    fn test_hex_round_trip() {
        let hex = rgb_to_hex(12, 34, 56);
        assert_eq!(hex, "#0c2238");
        assert_eq!(hex_to_rgb(&hex).unwrap(), Rgb::new(12, 34, 56));
    }

    #[test]
    fn test_hex_without_hash() {
        assert_eq!(hex_to_rgb("ff8000").unwrap(), Rgb::new(255, 128, 0));
        assert_eq!(hex_to_rgb("#FF8000").unwrap(), Rgb::new(255, 128, 0));
    }

    #[test]
    fn test_hex_invalid() {
        assert!(matches!(hex_to_rgb("#12345"), Err(RecolorError::InvalidColor(_))));
        assert!(matches!(hex_to_rgb("zzzzzz"), Err(RecolorError::InvalidColor(_))));
    }

    #[test]
    fn test_color_key_parse_and_display() {
        let key: ColorKey = "224,0,32".parse().unwrap();
        assert_eq!(key.rgb(), Rgb::new(224, 0, 32));
        assert_eq!(key.to_string(), "224,0,32");
    }

    #[test]
    fn test_color_key_wrong_field_count() {
        assert!(matches!("1,2".parse::<ColorKey>(), Err(RecolorError::MalformedColorKey(_))));
        assert!(matches!("1,2,3,4".parse::<ColorKey>(), Err(RecolorError::MalformedColorKey(_))));
        assert!(matches!("a,b,c".parse::<ColorKey>(), Err(RecolorError::MalformedColorKey(_))));
    }

    #[test]
    fn test_color_key_serde_as_string() {
        let key = ColorKey::from_quantized(Rgb::new(32, 64, 96));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"32,64,96\"");
        let back: ColorKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_color_distance() {
        assert_eq!(color_distance(Rgb::new(0, 0, 0), Rgb::new(0, 0, 0)), 0.0);
        assert_eq!(color_distance(Rgb::new(0, 0, 0), Rgb::new(3, 4, 0)), 5.0);
    }
}
