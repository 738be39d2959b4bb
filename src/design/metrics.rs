use crate::deck::TextKind;
use serde::{Deserialize, Serialize};

/// The reference slide size all responsive math scales against.
pub const STANDARD_SLIDE: SlideDimensions = SlideDimensions { width: 960.0, height: 540.0 };

/// Slide dimensions in points.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct SlideDimensions {
    pub width: f64,
    pub height: f64,
}

impl SlideDimensions {
    /// The uniform scale factor relative to the standard 960×540 slide.
    pub fn scale(&self) -> f64 {
        (self.width / STANDARD_SLIDE.width).min(self.height / STANDARD_SLIDE.height)
    }
}

impl Default for SlideDimensions {
    fn default() -> Self {
        STANDARD_SLIDE
    }
}

/// How far the audience sits from the screen.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewingDistance {
    Close,

    #[default]
    Medium,

    Far,
}

impl ViewingDistance {
    fn factor(&self) -> f64 {
        match self {
            Self::Close => 0.9,
            Self::Medium => 1.0,
            Self::Far => 1.3,
        }
    }
}

/// Relative weight of a piece of content within its slide.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,

    #[default]
    Medium,

    High,
}

impl Importance {
    fn factor(&self) -> f64 {
        match self {
            Self::Low => 0.9,
            Self::Medium => 1.0,
            Self::High => 1.15,
        }
    }
}

/// Allowed font size range for a text kind, in points.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct FontBounds {
    pub min: f64,
    pub max: f64,
}

/// Inputs to [`responsive_font_size`].
#[derive(Clone, Debug)]
pub struct FontSizeRequest {
    pub base_size: f64,
    pub slide: SlideDimensions,
    pub content_len: usize,
    pub distance: ViewingDistance,
    pub importance: Importance,
    pub kind: TextKind,
    pub bounds: FontBounds,
}

/// Computes a readable font size for the given slide and content.
///
/// The base size is scaled by the slide's deviation from 960×540, shrunk for
/// long content, adjusted for viewing distance and importance, then clamped to
/// the kind's bounds and to the kind's accessibility minimum. The result is an
/// integer point size.
pub fn responsive_font_size(request: &FontSizeRequest) -> u32 {
    let scale = request.slide.scale();
    let length_factor = match request.content_len {
        0..=50 => 1.0,
        51..=150 => 0.95,
        151..=300 => 0.85,
        _ => 0.75,
    };
    let size = request.base_size
        * scale
        * length_factor
        * request.distance.factor()
        * request.importance.factor();
    let size = size.clamp(request.bounds.min, request.bounds.max);
    let size = size.max(accessibility_minimum(request.kind));
    round_half_even(size) as u32
}

/// The smallest point size at which a kind stays legible from the back row.
pub fn accessibility_minimum(kind: TextKind) -> f64 {
    match kind {
        TextKind::Title => 28.0,
        TextKind::Heading => 24.0,
        TextKind::Subheading => 20.0,
        TextKind::Text | TextKind::Body => 18.0,
        TextKind::Caption => 16.0,
        TextKind::Footnote => 14.0,
    }
}

/// Default line height ratio for a text kind.
pub fn line_height_ratio(kind: TextKind) -> f64 {
    match kind {
        TextKind::Title => 1.2,
        TextKind::Heading | TextKind::Subheading => 1.3,
        TextKind::Text | TextKind::Body => 1.4,
        TextKind::Caption | TextKind::Footnote => 1.5,
    }
}

/// Line height in points for a resolved font size.
///
/// Small sizes get an extra 0.1 of ratio; the result never drops below
/// 1.5× the font size.
pub fn line_height(font_size: u32, kind: TextKind) -> f64 {
    line_height_with_ratio(font_size, line_height_ratio(kind))
}

pub fn line_height_with_ratio(font_size: u32, ratio: f64) -> f64 {
    let ratio = if font_size < 20 { ratio + 0.1 } else { ratio };
    let size = font_size as f64;
    (size * ratio).max(1.5 * size)
}

/// Margins around a slide's content area, in points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Margins that scale with the slide, clamped to `[8, 80]` points.
/// Horizontal margins are 1.3× the vertical ones.
pub fn responsive_margins(slide: SlideDimensions) -> Margins {
    let scale = slide.scale();
    let vertical = (32.0 * scale).clamp(8.0, 80.0);
    let horizontal = (32.0 * scale * 1.3).clamp(8.0, 80.0);
    Margins { top: vertical, right: horizontal, bottom: vertical, left: horizontal }
}

/// Rounds half-to-even so repeated scaling doesn't drift in one direction.
pub fn round_half_even(value: f64) -> f64 {
    let floor = value.floor();
    let fraction = value - floor;
    if fraction > 0.5 {
        floor + 1.0
    } else if fraction < 0.5 {
        floor
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}
