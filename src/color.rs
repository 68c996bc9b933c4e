use std::str::FromStr;

use eframe::egui::Color32;
use palette::Srgb;
use palette::named;

// ---------------------------------------------------------------------------
// Palette helpers
// ---------------------------------------------------------------------------

fn to_color32(rgb: Srgb<u8>) -> Color32 {
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

/// Parse a `#rrggbb` hex code.
pub fn from_hex(hex: &str) -> Option<Color32> {
    Srgb::<u8>::from_str(hex).ok().map(to_color32)
}

/// Same hue with a straight (unmultiplied) opacity in `0.0..=1.0`.
pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

pub fn blue() -> Color32 {
    to_color32(named::BLUE)
}

pub fn red() -> Color32 {
    to_color32(named::RED)
}

pub fn green() -> Color32 {
    to_color32(named::GREEN)
}

// ---------------------------------------------------------------------------
// Choropleth scale: state total → fill colour
// ---------------------------------------------------------------------------

/// ColorBrewer YlGn, six classes.
const YL_GN: [&str; 6] = ["#ffffcc", "#d9f0a3", "#addd8e", "#78c679", "#31a354", "#006837"];

/// Equal-width bins between the smallest and largest value, one colour each.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedScale {
    min: f64,
    max: f64,
    colors: Vec<Color32>,
}

impl BinnedScale {
    /// YlGn scale over the given values; `None` when there are none.
    pub fn yl_gn<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        let colors = YL_GN
            .iter()
            .map(|hex| from_hex(hex).unwrap_or(Color32::GRAY))
            .collect();
        Some(BinnedScale { min, max, colors })
    }

    pub fn bins(&self) -> usize {
        self.colors.len()
    }

    /// Index of the bin `value` falls into; the top edge belongs to the last bin.
    pub fn bin(&self, value: f64) -> usize {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0;
        }
        let t = ((value - self.min) / span).clamp(0.0, 1.0);
        ((t * self.bins() as f64) as usize).min(self.bins() - 1)
    }

    pub fn color_for(&self, value: f64) -> Color32 {
        self.colors[self.bin(value)]
    }

    /// Legend entries: `(lower bound, upper bound, colour)` per bin.
    pub fn legend_entries(&self) -> Vec<(f64, f64, Color32)> {
        let width = (self.max - self.min) / self.bins() as f64;
        self.colors
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let lo = self.min + width * i as f64;
                (lo, lo + width, *c)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_codes_parse() {
        assert_eq!(from_hex("#006837"), Some(Color32::from_rgb(0x00, 0x68, 0x37)));
        assert_eq!(from_hex("nope"), None);
    }

    #[test]
    fn named_layer_colours() {
        assert_eq!(blue(), Color32::from_rgb(0, 0, 255));
        assert_eq!(green(), Color32::from_rgb(0, 128, 0));
    }

    #[test]
    fn values_fall_into_equal_width_bins() {
        let scale = BinnedScale::yl_gn([0.0, 600.0]).unwrap();
        assert_eq!(scale.bin(0.0), 0);
        assert_eq!(scale.bin(99.0), 0);
        assert_eq!(scale.bin(100.0), 1);
        assert_eq!(scale.bin(600.0), 5);
        assert_eq!(scale.legend_entries()[1].0, 100.0);
    }

    #[test]
    fn flat_scale_uses_first_bin() {
        let scale = BinnedScale::yl_gn([42.0]).unwrap();
        assert_eq!(scale.bin(42.0), 0);
        assert!(BinnedScale::yl_gn(std::iter::empty()).is_none());
    }
}
