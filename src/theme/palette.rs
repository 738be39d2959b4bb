//! Deterministic palette derivation from one or more base colors.

use super::{Palette, SemanticColors};
use crate::design::color::Color;
use std::collections::BTreeMap;

/// The standard tint/shade steps, lightest to darkest.
pub(crate) const SCALE_STEPS: [u16; 10] = [50, 100, 200, 300, 400, 500, 600, 700, 800, 900];

const SCALE_LIGHTNESS: [f64; 10] = [0.95, 0.90, 0.80, 0.70, 0.60, 0.50, 0.40, 0.30, 0.20, 0.10];

/// Tints and shades of a base color at the standard steps.
///
/// Step 500 keeps the base's own lightness band; lower steps are tints,
/// higher ones shades.
pub(crate) fn tint_scale(base: Color) -> BTreeMap<u16, Color> {
    SCALE_STEPS
        .iter()
        .zip(SCALE_LIGHTNESS)
        .map(|(step, lightness)| (*step, base.with_lightness(lightness)))
        .collect()
}

/// Builds a full palette from 1..n base colors.
///
/// Missing slots are filled deterministically: the secondary is a dark shade
/// of the primary, the accent a hue rotation, and the neutrals come from the
/// primary's lightest tint.
pub(crate) fn derive_palette(bases: &[Color]) -> Option<Palette> {
    let primary = *bases.first()?;
    let scale = tint_scale(primary);
    let secondary = bases.get(1).copied().unwrap_or(scale[&700]);
    let accent = bases.get(2).copied().unwrap_or_else(|| {
        let mut hsl = primary.to_hsl();
        hsl.hue = (hsl.hue + 30.0).rem_euclid(360.0);
        hsl.to_color()
    });
    Some(Palette {
        primary,
        secondary,
        background: Color::new(0xff, 0xff, 0xff),
        surface: scale[&50],
        text: Color::new(0x1a, 0x1a, 0x1a),
        text_secondary: Color::new(0x4a, 0x4a, 0x4a),
        accent,
        semantic: default_semantics(),
    })
}

pub(crate) fn default_semantics() -> SemanticColors {
    SemanticColors {
        success: Color::new(0x2e, 0x7d, 0x32),
        warning: Color::new(0xb2, 0x6a, 0x00),
        error: Color::new(0xc6, 0x28, 0x28),
        info: Color::new(0x15, 0x65, 0xc0),
    }
}
