//! Resolution of caller style overrides against the active theme.

use super::Theme;
use crate::{
    deck::{TextKind, TextStyle},
    design::{
        color::Color,
        metrics::{
            self, FontBounds, FontSizeRequest, Importance, SlideDimensions, ViewingDistance,
        },
    },
};
use serde::Serialize;

/// A fully-resolved text style. No element reaches the upstream API without
/// one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedTextStyle {
    pub font_family: String,
    /// Points, already responsive-scaled and clamped.
    pub font_size: u32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    /// Points.
    pub line_height: f64,
}

/// Per-slide inputs the resolver needs beyond the theme itself.
#[derive(Clone, Copy, Debug)]
pub struct ResolveContext {
    pub slide: SlideDimensions,
    pub distance: ViewingDistance,
    /// Breakpoint font scale applied to the pre-factor baseline.
    pub font_scale: f64,
    /// Length of the content being styled, in characters.
    pub content_len: usize,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            slide: SlideDimensions::default(),
            distance: ViewingDistance::default(),
            font_scale: 1.0,
            content_len: 0,
        }
    }
}

impl Theme {
    /// Merges the theme's hierarchy with caller overrides and computes the
    /// responsive font size for the slide at hand.
    pub fn resolve_style(
        &self,
        kind: TextKind,
        overrides: Option<&TextStyle>,
        context: &ResolveContext,
    ) -> ResolvedTextStyle {
        let level = self.fonts.level(kind);
        let base_size = overrides.and_then(|s| s.font_size).unwrap_or(level.default_size);
        let font_size = metrics::responsive_font_size(&FontSizeRequest {
            base_size: base_size * context.font_scale,
            slide: context.slide,
            content_len: context.content_len,
            distance: context.distance,
            importance: importance_of(kind),
            kind,
            bounds: FontBounds { min: level.min, max: level.max },
        });
        let line_height = match overrides.and_then(|s| s.line_height) {
            Some(ratio) => metrics::line_height_with_ratio(font_size, ratio),
            None => metrics::line_height_with_ratio(font_size, self.line_height_ratios.ratio(kind)),
        };
        ResolvedTextStyle {
            font_family: overrides
                .and_then(|s| s.font_family.clone())
                .unwrap_or_else(|| level.family.clone()),
            font_size,
            bold: overrides.and_then(|s| s.bold).unwrap_or(default_bold(kind)),
            italic: overrides.and_then(|s| s.italic).unwrap_or(false),
            color: overrides.and_then(|s| s.color).unwrap_or_else(|| default_color(self, kind)),
            line_height,
        }
    }
}

fn importance_of(kind: TextKind) -> Importance {
    match kind {
        TextKind::Title | TextKind::Heading => Importance::High,
        TextKind::Subheading | TextKind::Text | TextKind::Body => Importance::Medium,
        TextKind::Caption | TextKind::Footnote => Importance::Low,
    }
}

fn default_bold(kind: TextKind) -> bool {
    matches!(kind, TextKind::Title | TextKind::Heading)
}

fn default_color(theme: &Theme, kind: TextKind) -> Color {
    match kind {
        TextKind::Caption | TextKind::Footnote => theme.palette.text_secondary,
        _ => theme.palette.text,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::theme::registry::builtin_themes;

    fn theme() -> Theme {
        builtin_themes().into_iter().next().unwrap()
    }

    #[test]
    fn unset_fields_come_from_theme() {
        let theme = theme();
        let style = theme.resolve_style(TextKind::Title, None, &ResolveContext::default());
        assert_eq!(style.font_family, theme.fonts.title.family);
        assert_eq!(style.color, theme.palette.text);
        assert!(style.bold);
        // Title default is 40 on a standard slide with high importance:
        // 40 * 1.15 = 46.
        assert_eq!(style.font_size, 46);
    }

    #[test]
    fn title_never_resolves_below_its_floor() {
        let theme = theme();
        let context = ResolveContext {
            slide: SlideDimensions { width: 320.0, height: 180.0 },
            ..Default::default()
        };
        let style = theme.resolve_style(TextKind::Title, None, &context);
        assert!(style.font_size >= 28);
    }

    #[test]
    fn overrides_win() {
        let theme = theme();
        let overrides = TextStyle {
            font_family: Some("IBM Plex Sans".into()),
            font_size: Some(30.0),
            bold: Some(false),
            italic: Some(true),
            color: Some("#1565c0".parse().unwrap()),
            line_height: Some(2.0),
        };
        let style = theme.resolve_style(TextKind::Body, Some(&overrides), &ResolveContext::default());
        assert_eq!(style.font_family, "IBM Plex Sans");
        assert_eq!(style.font_size, 30);
        assert!(!style.bold);
        assert!(style.italic);
        assert_eq!(style.color.to_string(), "#1565c0");
        assert_eq!(style.line_height, 60.0);
    }

    #[test]
    fn caption_uses_secondary_text_color() {
        let theme = theme();
        let style = theme.resolve_style(TextKind::Caption, None, &ResolveContext::default());
        assert_eq!(style.color, theme.palette.text_secondary);
        assert!(!style.bold);
    }

    #[test]
    fn breakpoint_scale_shrinks_the_baseline() {
        let theme = theme();
        let normal = theme.resolve_style(TextKind::Body, None, &ResolveContext::default());
        let scaled = theme.resolve_style(
            TextKind::Body,
            None,
            &ResolveContext { font_scale: 0.85, ..Default::default() },
        );
        assert!(scaled.font_size <= normal.font_size);
    }
}
