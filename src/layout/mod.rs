//! The layout engine: grid and flex primitives, named templates, breakpoint
//! adaptation and position assignment.

pub mod breakpoints;
pub mod flex;
pub mod grid;
pub mod position;
pub mod templates;

pub use position::{Arrangement, ContentArea, PlacedItem, PlacementPlan, ResolvedLayout};

use crate::{
    deck::AbsoluteBox,
    design::metrics::{responsive_margins, SlideDimensions},
};
use breakpoints::Breakpoint;
use flex::{Align, FlexConfig, FlexDirection, Justify, Wrap};
use grid::{Grid, GridArea, DEFAULT_GUTTER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use templates::{TemplateGrid, TemplateName};

/// A layout request: the kind plus responsive behavior.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LayoutSpec {
    #[serde(flatten)]
    pub kind: LayoutKind,

    /// Adapt the layout to the slide's breakpoint.
    #[serde(default)]
    pub responsive: bool,

    /// Pins the breakpoint instead of deriving it from the slide width.
    #[serde(default)]
    pub breakpoint: Option<Breakpoint>,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self { kind: LayoutKind::SingleColumn, responsive: false, breakpoint: None }
    }
}

impl LayoutSpec {
    pub fn template(name: TemplateName) -> Self {
        Self { kind: LayoutKind::Template { name: name.to_string() }, ..Default::default() }
    }
}

/// The kinds of layout a deck or slide can ask for.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutKind {
    SingleColumn,
    DoubleColumn,
    ThreeColumn,
    TitleContent,
    CustomGrid {
        columns: usize,
        rows: usize,
        areas: BTreeMap<String, GridArea>,
    },
    Flex {
        #[serde(default)]
        direction: FlexDirection,
        #[serde(default)]
        justify: Justify,
        #[serde(default)]
        align: Align,
        #[serde(default)]
        wrap: Wrap,
    },
    Template {
        name: String,
    },
}

/// An error resolving a layout. Fatal to the affected slide only.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid area '{name}': {reason}")]
    InvalidArea { name: String, reason: String },
}

/// Builds the concrete layout for one slide.
///
/// Pure with respect to its inputs: the same spec, dimensions and areas
/// always produce the same boxes.
pub fn resolve_layout(
    spec: &LayoutSpec,
    slide: SlideDimensions,
    custom_areas: Option<&BTreeMap<String, GridArea>>,
    has_title: bool,
) -> Result<ResolvedLayout, LayoutError> {
    let margins = responsive_margins(slide);
    let breakpoint = spec.breakpoint.unwrap_or_else(|| Breakpoint::from_width(slide.width));
    let font_scale = if spec.responsive || spec.breakpoint.is_some() {
        breakpoint.font_scale()
    } else {
        1.0
    };

    if let LayoutKind::Flex { direction, justify, align, wrap } = &spec.kind {
        let grid = Grid::new(slide, margins, grid::DEFAULT_COLUMNS, DEFAULT_GUTTER)?;
        let content = AbsoluteBox {
            x: margins.left,
            y: margins.top,
            width: grid.content_width,
            height: grid.content_height,
        };
        let (title_area, region) = if has_title {
            let (strip, rest) = split_title_strip(&content, grid.gutter);
            (Some(strip), rest)
        } else {
            (None, content)
        };
        let config = FlexConfig {
            direction: *direction,
            justify: *justify,
            align: *align,
            wrap: *wrap,
            gap: grid.gutter,
        };
        return Ok(ResolvedLayout {
            grid,
            breakpoint,
            font_scale,
            title_area,
            arrangement: Arrangement::Flex { config, region },
        });
    }

    let mut template = template_for(&spec.kind)?;
    if let Some(extra) = custom_areas {
        for (name, area) in extra {
            template.areas.push((name.clone(), *area));
        }
    }
    let grid = Grid::new(slide, margins, template.columns, DEFAULT_GUTTER)?;

    let mut title_area = None;
    let mut content_areas = Vec::new();
    for (name, area) in &template.areas {
        let rect = grid.area_box(name, area, template.rows)?;
        if name == "title" {
            title_area = Some(rect);
        } else {
            content_areas.push(ContentArea { name: name.clone(), rect });
        }
    }
    if content_areas.is_empty() {
        return Err(LayoutError::InvalidGrid("layout has no content areas".into()));
    }
    if title_area.is_none() && has_title {
        let region = bounding_box(&content_areas);
        let (strip, rest) = split_title_strip(&region, grid.gutter);
        title_area = Some(strip);
        remap_areas(&mut content_areas, &region, &rest);
    }

    if spec.responsive {
        let declared = widest_band(&content_areas);
        let effective = breakpoint.adapt_columns(declared);
        if effective < declared {
            content_areas = reflow_areas(&content_areas, grid.gutter, effective);
        }
    }

    Ok(ResolvedLayout {
        grid,
        breakpoint,
        font_scale,
        title_area,
        arrangement: Arrangement::Areas(content_areas),
    })
}

fn template_for(kind: &LayoutKind) -> Result<TemplateGrid, LayoutError> {
    let template = match kind {
        LayoutKind::SingleColumn => templates::resolve(TemplateName::SingleColumn),
        LayoutKind::DoubleColumn => templates::resolve(TemplateName::DoubleColumn),
        LayoutKind::ThreeColumn => templates::resolve(TemplateName::ThreeColumn),
        LayoutKind::TitleContent => templates::resolve(TemplateName::TitleContent),
        LayoutKind::Template { name } => templates::resolve_name(name)?,
        LayoutKind::CustomGrid { columns, rows, areas } => {
            if *columns == 0 || *rows == 0 {
                return Err(LayoutError::InvalidGrid("custom grid needs columns and rows".into()));
            }
            // Column-major flow: leftmost areas fill first.
            let mut ordered: Vec<_> = areas.iter().map(|(n, a)| (n.clone(), *a)).collect();
            ordered.sort_by_key(|(name, area)| (area.col_start, area.row_start, name.clone()));
            TemplateGrid { columns: *columns, rows: *rows, areas: ordered }
        }
        LayoutKind::Flex { .. } => unreachable!("flex handled by the caller"),
    };
    Ok(template)
}

/// Carves a title strip off the top of a region.
fn split_title_strip(region: &AbsoluteBox, gutter: f64) -> (AbsoluteBox, AbsoluteBox) {
    let strip_height = region.height / 6.0;
    let strip = AbsoluteBox { height: strip_height, ..*region };
    let rest = AbsoluteBox {
        y: region.y + strip_height + gutter,
        height: (region.height - strip_height - gutter).max(0.0),
        ..*region
    };
    (strip, rest)
}

fn bounding_box(areas: &[ContentArea]) -> AbsoluteBox {
    let left = areas.iter().map(|a| a.rect.x).fold(f64::MAX, f64::min);
    let top = areas.iter().map(|a| a.rect.y).fold(f64::MAX, f64::min);
    let right = areas.iter().map(|a| a.rect.right()).fold(f64::MIN, f64::max);
    let bottom = areas.iter().map(|a| a.rect.bottom()).fold(f64::MIN, f64::max);
    AbsoluteBox { x: left, y: top, width: right - left, height: bottom - top }
}

/// Translates and scales areas from one vertical region into another.
fn remap_areas(areas: &mut [ContentArea], from: &AbsoluteBox, to: &AbsoluteBox) {
    let ratio = if from.height > 0.0 { to.height / from.height } else { 1.0 };
    for area in areas {
        area.rect.y = to.y + (area.rect.y - from.y) * ratio;
        area.rect.height *= ratio;
    }
}

/// The widest row band: how many areas sit side by side.
fn widest_band(areas: &[ContentArea]) -> usize {
    let mut bands: BTreeMap<(u64, u64), usize> = BTreeMap::new();
    for area in areas {
        let key = (area.rect.y.to_bits(), area.rect.height.to_bits());
        *bands.entry(key).or_default() += 1;
    }
    bands.values().copied().max().unwrap_or(1)
}

/// Redistributes areas into `columns` columns within their bounding region,
/// preserving order.
fn reflow_areas(areas: &[ContentArea], gutter: f64, columns: usize) -> Vec<ContentArea> {
    let region = bounding_box(areas);
    let rows = areas.len().div_ceil(columns);
    let cell_width = (region.width - gutter * (columns as f64 - 1.0)) / columns as f64;
    let cell_height = (region.height - gutter * (rows as f64 - 1.0)) / rows as f64;
    areas
        .iter()
        .enumerate()
        .map(|(index, area)| {
            let col = index % columns;
            let row = index / columns;
            ContentArea {
                name: area.name.clone(),
                rect: AbsoluteBox {
                    x: region.x + col as f64 * (cell_width + gutter),
                    y: region.y + row as f64 * (cell_height + gutter),
                    width: cell_width,
                    height: cell_height,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::metrics::STANDARD_SLIDE;

    fn areas_of(layout: &ResolvedLayout) -> &[ContentArea] {
        match &layout.arrangement {
            Arrangement::Areas(areas) => areas,
            Arrangement::Flex { .. } => panic!("expected areas"),
        }
    }

    #[test]
    fn default_layout_is_single_column() {
        let layout =
            resolve_layout(&LayoutSpec::default(), STANDARD_SLIDE, None, true).expect("resolution failed");
        assert!(layout.title_area.is_some());
        assert_eq!(areas_of(&layout).len(), 1);
        assert_eq!(layout.font_scale, 1.0);
    }

    #[test]
    fn double_column_keeps_two_areas_on_wide_slides() {
        let spec = LayoutSpec { kind: LayoutKind::DoubleColumn, responsive: true, breakpoint: None };
        let layout = resolve_layout(&spec, STANDARD_SLIDE, None, true).unwrap();
        let areas = areas_of(&layout);
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].rect.y, areas[1].rect.y);
        assert!(areas[1].rect.x > areas[0].rect.x);
    }

    #[test]
    fn double_column_collapses_on_narrow_slides() {
        let spec = LayoutSpec { kind: LayoutKind::DoubleColumn, responsive: true, breakpoint: None };
        let slide = SlideDimensions { width: 400.0, height: 540.0 };
        let layout = resolve_layout(&spec, slide, None, true).unwrap();
        assert_eq!(layout.breakpoint, Breakpoint::Xs);
        let areas = areas_of(&layout);
        assert_eq!(areas.len(), 2);
        // Stacked: same x, one below the other.
        assert_eq!(areas[0].rect.x, areas[1].rect.x);
        assert!(areas[1].rect.y > areas[0].rect.y);
    }

    #[test]
    fn three_column_becomes_two_on_small_slides() {
        let spec = LayoutSpec { kind: LayoutKind::ThreeColumn, responsive: true, breakpoint: None };
        let slide = SlideDimensions { width: 700.0, height: 540.0 };
        let layout = resolve_layout(&spec, slide, None, false).unwrap();
        assert_eq!(layout.breakpoint, Breakpoint::Sm);
        let areas = areas_of(&layout);
        assert_eq!(areas.len(), 3);
        // Two in the first band, one in the second.
        assert_eq!(areas[0].rect.y, areas[1].rect.y);
        assert!(areas[2].rect.y > areas[0].rect.y);
    }

    #[test]
    fn non_responsive_layout_ignores_width() {
        let spec = LayoutSpec { kind: LayoutKind::DoubleColumn, responsive: false, breakpoint: None };
        let slide = SlideDimensions { width: 400.0, height: 540.0 };
        let layout = resolve_layout(&spec, slide, None, false).unwrap();
        let areas = areas_of(&layout);
        assert_eq!(areas[0].rect.y, areas[1].rect.y);
    }

    #[test]
    fn custom_grid_orders_column_major() {
        let mut areas = BTreeMap::new();
        areas.insert("zz-first".into(), GridArea::new(0, 0, 2, 2));
        areas.insert("aa-second".into(), GridArea::new(0, 2, 2, 4));
        let spec = LayoutSpec {
            kind: LayoutKind::CustomGrid { columns: 4, rows: 2, areas },
            responsive: false,
            breakpoint: None,
        };
        let layout = resolve_layout(&spec, STANDARD_SLIDE, None, false).unwrap();
        let areas = areas_of(&layout);
        // The leftmost area flows first regardless of name ordering.
        assert_eq!(areas[0].name, "zz-first");
        assert_eq!(areas[1].name, "aa-second");
    }

    #[test]
    fn slide_custom_areas_are_merged() {
        let mut extra = BTreeMap::new();
        extra.insert("badge".to_string(), GridArea::new(0, 10, 1, 12));
        let layout =
            resolve_layout(&LayoutSpec::default(), STANDARD_SLIDE, Some(&extra), false).unwrap();
        let areas = areas_of(&layout);
        assert!(areas.iter().any(|a| a.name == "badge"));
    }

    #[test]
    fn title_strip_is_synthesized_for_templates_without_one() {
        let spec = LayoutSpec::template(TemplateName::Dashboard);
        let layout = resolve_layout(&spec, STANDARD_SLIDE, None, true).unwrap();
        let title = layout.title_area.expect("no title area");
        for area in areas_of(&layout) {
            assert!(area.rect.y > title.y, "area '{}' overlaps the title", area.name);
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let spec = LayoutSpec { kind: LayoutKind::ThreeColumn, responsive: true, breakpoint: None };
        let slide = SlideDimensions { width: 700.0, height: 400.0 };
        let first = resolve_layout(&spec, slide, None, true).unwrap();
        let second = resolve_layout(&spec, slide, None, true).unwrap();
        assert_eq!(areas_of(&first).len(), areas_of(&second).len());
        for (a, b) in areas_of(&first).iter().zip(areas_of(&second)) {
            assert_eq!(a.rect, b.rect);
        }
    }

    #[test]
    fn unknown_template_name_errors() {
        let spec = LayoutSpec {
            kind: LayoutKind::Template { name: "mosaic".into() },
            responsive: false,
            breakpoint: None,
        };
        let err = resolve_layout(&spec, STANDARD_SLIDE, None, false).expect_err("resolution passed");
        assert!(matches!(err, LayoutError::UnknownTemplate(_)));
    }
}
