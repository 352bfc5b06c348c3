//! Selection state: which bucket the user picked and what to turn it into.

use serde::{Deserialize, Serialize};
use crate::color::{Channel, Quantizer, Rgb};
use crate::index::ColorInfo;
use crate::resolver::SimilaritySettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Bucket picked from the color list
    pub selected: Option<ColorInfo>,
    /// Replacement color being edited
    pub new_color: Rgb,
    pub similarity: SimilaritySettings,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(SimilaritySettings::default())
    }
}

impl Selection {
    pub fn new(similarity: SimilaritySettings) -> Self {
        Self {
            selected: None,
            new_color: Rgb::default(),
            similarity,
        }
    }

    /// Pick a bucket; the replacement starts out as the bucket's own color
    pub fn select(&mut self, color: ColorInfo) {
        self.new_color = color.rgb;
        self.selected = Some(color);
    }

    pub fn update_channel(&mut self, channel: Channel, value: u8) {
        match channel {
            Channel::R => self.new_color.r = value,
            Channel::G => self.new_color.g = value,
            Channel::B => self.new_color.b = value,
        }
    }

    pub fn new_color_hex(&self) -> String {
        self.new_color.to_hex()
    }

    /// After a committed change the selected pixels carry `new_color`, so the
    /// selection now points at the bucket that color falls into. The pixel
    /// count is carried over.
    pub fn follow_change(&mut self, quantizer: &Quantizer) {
        if let Some(previous) = &self.selected {
            let c = self.new_color;
            self.selected = Some(ColorInfo {
                key: quantizer.quantize_rgb(c.r, c.g, c.b),
                rgb: c,
                hex_color: c.to_hex(),
                pixel_count: previous.pixel_count,
            });
        }
    }

    pub fn reset(&mut self, similarity: SimilaritySettings) {
        *self = Self::new(similarity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorKey;

    fn info(r: u8, g: u8, b: u8, count: usize) -> ColorInfo {
        ColorInfo::new(ColorKey::from_quantized(Rgb::new(r, g, b)), count)
    }

    #[test]
    fn test_select_seeds_new_color() {
        let mut selection = Selection::default();
        selection.select(info(224, 0, 32, 5));
        assert_eq!(selection.new_color, Rgb::new(224, 0, 32));
        assert_eq!(selection.new_color_hex(), "#e00020");
    }

    #[test]
    fn test_update_channel() {
        let mut selection = Selection::default();
        selection.update_channel(Channel::G, 200);
        selection.update_channel(Channel::B, 7);
        assert_eq!(selection.new_color, Rgb::new(0, 200, 7));
    }

    #[test]
    fn test_follow_change_moves_to_new_bucket() {
        let mut selection = Selection::default();
        selection.select(info(224, 0, 0, 12));
        selection.new_color = Rgb::new(10, 250, 40);
        selection.follow_change(&Quantizer::new(8).unwrap());

        let selected = selection.selected.unwrap();
        assert_eq!(selected.key.to_string(), "0,224,32");
        assert_eq!(selected.rgb, Rgb::new(10, 250, 40));
        assert_eq!(selected.hex_color, "#0afa28");
        assert_eq!(selected.pixel_count, 12);
    }

    #[test]
    fn test_follow_change_without_selection() {
        let mut selection = Selection::default();
        selection.follow_change(&Quantizer::default());
        assert!(selection.selected.is_none());
    }

    #[test]
    fn test_reset() {
        let mut selection = Selection::default();
        selection.select(info(32, 32, 32, 1));
        selection.similarity = SimilaritySettings::similar(30.0);
        selection.reset(SimilaritySettings::default());
        assert_eq!(selection, Selection::default());
    }
}
