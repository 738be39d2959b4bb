//! Named slide templates and the grids they resolve to.

use super::{grid::GridArea, LayoutError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The closed set of named templates.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TemplateName {
    SingleColumn,
    DoubleColumn,
    ThreeColumn,
    TitleContent,
    HeroContent,
    SidebarMain,
    FeatureShowcase,
    Dashboard,
}

/// A template resolved into a custom grid with ordered named areas.
///
/// The area named `title` receives the slide title; content items flow into
/// the remaining areas in the order listed here.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateGrid {
    pub columns: usize,
    pub rows: usize,
    pub areas: Vec<(String, GridArea)>,
}

/// Resolves a template by name; unknown names are an error.
pub fn resolve_name(name: &str) -> Result<TemplateGrid, LayoutError> {
    let template =
        TemplateName::from_str(name).map_err(|_| LayoutError::UnknownTemplate(name.to_string()))?;
    Ok(resolve(template))
}

pub fn resolve(template: TemplateName) -> TemplateGrid {
    let area = |name: &str, rs, cs, re, ce| (name.to_string(), GridArea::new(rs, cs, re, ce));
    match template {
        TemplateName::SingleColumn => TemplateGrid {
            columns: 12,
            rows: 6,
            areas: vec![area("title", 0, 0, 1, 12), area("content", 1, 0, 6, 12)],
        },
        TemplateName::DoubleColumn => TemplateGrid {
            columns: 12,
            rows: 6,
            areas: vec![
                area("title", 0, 0, 1, 12),
                area("left", 1, 0, 6, 6),
                area("right", 1, 6, 6, 12),
            ],
        },
        TemplateName::ThreeColumn => TemplateGrid {
            columns: 12,
            rows: 6,
            areas: vec![
                area("title", 0, 0, 1, 12),
                area("first", 1, 0, 6, 4),
                area("second", 1, 4, 6, 8),
                area("third", 1, 8, 6, 12),
            ],
        },
        TemplateName::TitleContent => TemplateGrid {
            columns: 12,
            rows: 6,
            areas: vec![area("title", 0, 0, 2, 12), area("content", 2, 0, 6, 12)],
        },
        // 60/40 vertical split, hero on top.
        TemplateName::HeroContent => TemplateGrid {
            columns: 12,
            rows: 5,
            areas: vec![area("hero", 0, 0, 3, 12), area("content", 3, 0, 5, 12)],
        },
        TemplateName::SidebarMain => TemplateGrid {
            columns: 12,
            rows: 6,
            areas: vec![area("sidebar", 0, 0, 6, 3), area("main", 0, 3, 6, 12)],
        },
        TemplateName::FeatureShowcase => TemplateGrid {
            columns: 12,
            rows: 6,
            areas: vec![
                area("title", 0, 0, 2, 12),
                area("feature-1", 2, 0, 6, 4),
                area("feature-2", 2, 4, 6, 8),
                area("feature-3", 2, 8, 6, 12),
            ],
        },
        TemplateName::Dashboard => TemplateGrid {
            columns: 12,
            rows: 6,
            areas: vec![
                area("top-left", 0, 0, 3, 6),
                area("top-right", 0, 6, 3, 12),
                area("bottom-left", 3, 0, 6, 6),
                area("bottom-right", 3, 6, 6, 12),
            ],
        },
    }
}
