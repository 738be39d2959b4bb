//! Themes: palettes, font hierarchies and the registry that owns them.

pub(crate) mod palette;
pub mod registry;
pub mod resolve;

use crate::{
    deck::TextKind,
    design::{
        color::{validate_contrast, Color},
        metrics,
    },
};
use serde::{Deserialize, Serialize};
use std::io;

/// A named bundle of palette, font hierarchy and spacing.
///
/// Unset style fields on content items resolve against the deck's theme.
/// Built-in themes are immutable; custom ones are registered at runtime.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Theme {
    pub id: String,

    pub name: String,

    /// Whether this is one of the themes shipped with the engine. Never
    /// settable by callers.
    #[serde(default)]
    pub builtin: bool,

    pub palette: Palette,

    #[serde(default)]
    pub fonts: FontHierarchy,

    #[serde(default)]
    pub spacing: Spacing,

    #[serde(default)]
    pub line_height_ratios: LineHeightRatios,
}

impl Theme {
    /// Checks the palette pairings every text kind can produce.
    ///
    /// Each `{text, text_secondary} × {background, surface}` pair must meet
    /// WCAG AA at the default size of every text kind that uses it.
    pub fn validate(&self) -> Result<(), ThemeError> {
        let pairs = [
            (self.palette.text, self.palette.background),
            (self.palette.text, self.palette.surface),
            (self.palette.text_secondary, self.palette.background),
            (self.palette.text_secondary, self.palette.surface),
        ];
        let kinds = [TextKind::Title, TextKind::Heading, TextKind::Body, TextKind::Caption];
        for (foreground, background) in pairs {
            for kind in kinds {
                let size = self.fonts.level(kind).default_size;
                let report = validate_contrast(&foreground, &background, size, false);
                if !report.passes_aa {
                    return Err(ThemeError::Accessibility {
                        foreground,
                        background,
                        ratio: report.ratio,
                        requirement: if report.large_text { 3.0 } else { 4.5 },
                    });
                }
            }
        }
        Ok(())
    }

    /// Deep-merges a patch over this theme; `id`, `name` and `builtin` are
    /// left untouched.
    pub fn apply_patch(&self, patch: &ThemePatch) -> Result<Theme, ThemeError> {
        let mut base = serde_json::to_value(self)?;
        let overlay = serde_json::to_value(patch)?;
        merge_values(&mut base, overlay);
        let mut merged: Theme = serde_json::from_value(base)?;
        merged.id = self.id.clone();
        merged.name = self.name.clone();
        merged.builtin = self.builtin;
        Ok(merged)
    }

    /// The canonical JSON form used by `export`/`import` and persistence.
    pub fn canonical_json(&self) -> Result<String, ThemeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builds a complete theme from 1..n base colors.
///
/// The palette is derived deterministically (tints, shades, hue-rotated
/// accent); fonts and spacing use the engine defaults.
pub fn derive_theme(id: &str, name: &str, bases: &[Color]) -> Result<Theme, ThemeError> {
    let palette = palette::derive_palette(bases)
        .ok_or_else(|| ThemeError::Invalid("at least one base color is required".into()))?;
    let theme = Theme {
        id: id.to_string(),
        name: name.to_string(),
        builtin: false,
        palette,
        fonts: FontHierarchy::default(),
        spacing: Spacing::default(),
        line_height_ratios: LineHeightRatios::default(),
    };
    theme.validate()?;
    Ok(theme)
}

fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// The color palette of a theme.
///
/// Palettes are value types: themes own them, nothing points back.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    pub text_secondary: Color,
    pub accent: Color,
    pub semantic: SemanticColors,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SemanticColors {
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
}

/// Per-kind font settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FontHierarchy {
    #[serde(default = "default_title_level")]
    pub title: FontLevel,

    #[serde(default = "default_heading_level")]
    pub heading: FontLevel,

    #[serde(default = "default_subheading_level")]
    pub subheading: FontLevel,

    #[serde(default = "default_body_level")]
    pub body: FontLevel,

    #[serde(default = "default_caption_level")]
    pub caption: FontLevel,

    #[serde(default = "default_footnote_level")]
    pub footnote: FontLevel,
}

impl FontHierarchy {
    /// The level backing a text kind; plain text reads as body.
    pub fn level(&self, kind: TextKind) -> &FontLevel {
        match kind {
            TextKind::Title => &self.title,
            TextKind::Heading => &self.heading,
            TextKind::Subheading => &self.subheading,
            TextKind::Text | TextKind::Body => &self.body,
            TextKind::Caption => &self.caption,
            TextKind::Footnote => &self.footnote,
        }
    }
}

impl Default for FontHierarchy {
    fn default() -> Self {
        Self {
            title: default_title_level(),
            heading: default_heading_level(),
            subheading: default_subheading_level(),
            body: default_body_level(),
            caption: default_caption_level(),
            footnote: default_footnote_level(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FontLevel {
    #[serde(default = "default_font_family")]
    pub family: String,

    /// The size used when neither the caller nor responsive scaling says
    /// otherwise, in points.
    #[serde(rename = "default")]
    pub default_size: f64,

    pub min: f64,

    pub max: f64,
}

fn default_font_family() -> String {
    "Roboto".into()
}

fn level(default_size: f64, min: f64, max: f64) -> FontLevel {
    FontLevel { family: default_font_family(), default_size, min, max }
}

fn default_title_level() -> FontLevel {
    level(40.0, 28.0, 64.0)
}

fn default_heading_level() -> FontLevel {
    level(32.0, 24.0, 48.0)
}

fn default_subheading_level() -> FontLevel {
    level(26.0, 20.0, 36.0)
}

fn default_body_level() -> FontLevel {
    level(20.0, 18.0, 32.0)
}

fn default_caption_level() -> FontLevel {
    level(16.0, 16.0, 24.0)
}

fn default_footnote_level() -> FontLevel {
    level(14.0, 14.0, 20.0)
}

/// Spacing scale, in points.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Spacing {
    #[serde(default = "default_spacing_base")]
    pub base: f64,

    #[serde(default = "default_spacing_scale")]
    pub scale: Vec<f64>,
}

impl Default for Spacing {
    fn default() -> Self {
        Self { base: default_spacing_base(), scale: default_spacing_scale() }
    }
}

fn default_spacing_base() -> f64 {
    8.0
}

fn default_spacing_scale() -> Vec<f64> {
    vec![0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 6.0, 8.0]
}

/// Line height ratios per text kind.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LineHeightRatios {
    pub title: f64,
    pub heading: f64,
    pub subheading: f64,
    pub body: f64,
    pub caption: f64,
    pub footnote: f64,
}

impl LineHeightRatios {
    pub fn ratio(&self, kind: TextKind) -> f64 {
        match kind {
            TextKind::Title => self.title,
            TextKind::Heading => self.heading,
            TextKind::Subheading => self.subheading,
            TextKind::Text | TextKind::Body => self.body,
            TextKind::Caption => self.caption,
            TextKind::Footnote => self.footnote,
        }
    }
}

impl Default for LineHeightRatios {
    fn default() -> Self {
        Self {
            title: metrics::line_height_ratio(TextKind::Title),
            heading: metrics::line_height_ratio(TextKind::Heading),
            subheading: metrics::line_height_ratio(TextKind::Subheading),
            body: metrics::line_height_ratio(TextKind::Body),
            caption: metrics::line_height_ratio(TextKind::Caption),
            footnote: metrics::line_height_ratio(TextKind::Footnote),
        }
    }
}

/// A partial theme applied over an existing one.
///
/// Only the fields present in the patch change; everything else comes from
/// the base theme.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThemePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<PalettePatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fonts: Option<FontHierarchyPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<SpacingPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height_ratios: Option<LineHeightRatios>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PalettePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_secondary: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticPatch>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Color>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FontHierarchyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<FontLevelPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<FontLevelPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheading: Option<FontLevelPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<FontLevelPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<FontLevelPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footnote: Option<FontLevelPatch>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FontLevelPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_size: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpacingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec<f64>>,
}

/// An error from a theme operation.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("theme '{0}' already exists")]
    Exists(String),

    #[error("theme '{0}' does not exist")]
    NotFound(String),

    #[error("theme '{0}' is built in and cannot be modified")]
    Immutable(String),

    #[error(
        "contrast of {foreground} on {background} is {ratio:.2}, below the required {requirement}"
    )]
    Accessibility { foreground: Color, background: Color, ratio: f64, requirement: f64 },

    #[error("invalid theme: {0}")]
    Invalid(String),

    #[error("malformed theme: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}
