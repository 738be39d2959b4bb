use hex::{FromHex, FromHexError};
use serde::Serialize;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt, str::FromStr};

/// An sRGB color in `#RRGGBB` form.
///
/// This is the only color representation callers can use: palette entries,
/// text colors, and shape fills all parse into this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// WCAG relative luminance, in the `[0, 1]` range.
    pub fn luminance(&self) -> f64 {
        fn channel(value: u8) -> f64 {
            let value = value as f64 / 255.0;
            if value <= 0.03928 { value / 12.92 } else { ((value + 0.055) / 1.055).powf(2.4) }
        }
        0.2126 * channel(self.r) + 0.7152 * channel(self.g) + 0.0722 * channel(self.b)
    }

    /// WCAG contrast ratio against another color, in the `[1, 21]` range.
    ///
    /// Both luminances get the +0.05 flare term so the division is always
    /// well defined.
    pub fn contrast_ratio(&self, other: &Color) -> f64 {
        let a = self.luminance() + 0.05;
        let b = other.luminance() + 0.05;
        if a > b { a / b } else { b / a }
    }

    pub fn to_hsl(self) -> Hsl {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let lightness = (max + min) / 2.0;
        if delta == 0.0 {
            return Hsl { hue: 0.0, saturation: 0.0, lightness };
        }
        let saturation = delta / (1.0 - (2.0 * lightness - 1.0).abs());
        let hue = if max == r {
            60.0 * (((g - b) / delta).rem_euclid(6.0))
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        Hsl { hue, saturation, lightness }
    }

    /// The same hue/saturation at a different lightness.
    pub fn with_lightness(self, lightness: f64) -> Self {
        let mut hsl = self.to_hsl();
        hsl.lightness = lightness.clamp(0.0, 1.0);
        hsl.to_color()
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some(digits) = input.strip_prefix('#') else {
            return Err(ParseColorError::InvalidFormat(input.to_string()));
        };
        if digits.len() != 6 {
            return Err(ParseColorError::InvalidFormat(input.to_string()));
        }
        let values = <[u8; 3]>::from_hex(digits)?;
        Ok(Self { r: values[0], g: values[1], b: values[2] })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", hex::encode([self.r, self.g, self.b]))
    }
}

/// A color in HSL space, used for palette tint/shade derivation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    /// Degrees in `[0, 360)`.
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl Hsl {
    pub fn to_color(self) -> Color {
        let chroma = (1.0 - (2.0 * self.lightness - 1.0).abs()) * self.saturation;
        let hue = self.hue.rem_euclid(360.0) / 60.0;
        let x = chroma * (1.0 - (hue % 2.0 - 1.0).abs());
        let (r, g, b) = match hue {
            h if h < 1.0 => (chroma, x, 0.0),
            h if h < 2.0 => (x, chroma, 0.0),
            h if h < 3.0 => (0.0, chroma, x),
            h if h < 4.0 => (0.0, x, chroma),
            h if h < 5.0 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = self.lightness - chroma / 2.0;
        let channel = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Color { r: channel(r), g: channel(g), b: channel(b) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseColorError {
    #[error("color '{0}' is not in '#RRGGBB' form")]
    InvalidFormat(String),

    #[error("invalid hex color: {0}")]
    InvalidHex(#[from] FromHexError),
}

/// The outcome of checking a foreground/background pairing against WCAG.
#[derive(Clone, Debug, Serialize)]
pub struct ContrastReport {
    pub ratio: f64,
    pub passes_aa: bool,
    pub passes_aaa: bool,
    pub large_text: bool,
    pub recommendation: ContrastRecommendation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastRecommendation {
    Pass,
    IncreaseContrast,
    UseLargeTextOrIncreaseContrast,
}

/// Checks a text color pairing at a given size.
///
/// "Large" text is 18pt and up, or 14pt and up when bold; it gets the relaxed
/// 3:1 AA threshold.
pub fn validate_contrast(foreground: &Color, background: &Color, font_size: f64, bold: bool) -> ContrastReport {
    let ratio = foreground.contrast_ratio(background);
    let large_text = font_size >= 18.0 || (font_size >= 14.0 && bold);
    let (aa, aaa) = if large_text { (3.0, 4.5) } else { (4.5, 7.0) };
    let passes_aa = ratio >= aa;
    let recommendation = if passes_aa {
        ContrastRecommendation::Pass
    } else if !large_text && ratio >= 3.0 {
        ContrastRecommendation::UseLargeTextOrIncreaseContrast
    } else {
        ContrastRecommendation::IncreaseContrast
    };
    ContrastReport { ratio, passes_aa, passes_aaa: ratio >= aaa, large_text, recommendation }
}
