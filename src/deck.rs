//! The caller-facing deck description and the result it produces.

use crate::{
    chart::ChartOptions,
    design::{
        color::Color,
        metrics::ViewingDistance,
    },
    diagram::{DiagramDialect, DiagramStyle},
    layout::{grid::GridArea, LayoutSpec},
    theme::ThemePatch,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A declarative description of a deck to generate.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeckSpec {
    /// The deck title, also used as the presentation's document title.
    pub title: String,

    /// The slides, in presentation order.
    pub slides: Vec<SlideSpec>,

    /// The theme to style the deck with: a registered theme id, or a patch
    /// over the active theme.
    #[serde(default)]
    pub theme: Option<ThemeChoice>,

    /// The deck-wide layout; slides may override it.
    #[serde(default)]
    pub layout: Option<LayoutSpec>,

    #[serde(default)]
    pub options: DeckOptions,
}

/// Deck-wide generation options.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeckOptions {
    /// BCP 47 locale tag, recorded on the deck.
    #[serde(default)]
    pub locale: Option<String>,

    /// How far the audience sits from the screen.
    #[serde(default)]
    pub viewing_distance: Option<ViewingDistance>,

    /// Expected audience head count; used to infer viewing distance when one
    /// isn't given.
    #[serde(default)]
    pub audience_size: Option<u32>,
}

impl DeckOptions {
    /// The effective viewing distance: explicit, inferred from audience size,
    /// or medium.
    pub fn effective_distance(&self) -> ViewingDistance {
        if let Some(distance) = self.viewing_distance {
            return distance;
        }
        match self.audience_size {
            Some(size) if size > 50 => ViewingDistance::Far,
            Some(size) if size <= 10 => ViewingDistance::Close,
            Some(_) => ViewingDistance::Medium,
            None => ViewingDistance::Medium,
        }
    }
}

/// A theme reference: either the id of a registered theme or a patch applied
/// over the active theme.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ThemeChoice {
    Id(String),
    Override(ThemePatch),
}

/// One slide within a deck.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlideSpec {
    /// An optional slide title, placed in the layout's title area.
    #[serde(default)]
    pub title: Option<String>,

    /// Layout for this slide; overrides the deck-wide layout.
    #[serde(default)]
    pub layout: Option<LayoutSpec>,

    /// The content items, in placement order.
    #[serde(default)]
    pub content: Vec<ContentItem>,

    /// Extra named grid areas merged into the slide's layout.
    #[serde(default)]
    pub custom_areas: Option<BTreeMap<String, GridArea>>,
}

/// One piece of content on a slide.
///
/// The `kind` tag selects the variant; the seven text kinds share a payload
/// and differ only in how the theme resolves their style.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentItem {
    Text(TextItem),
    Title(TextItem),
    Heading(TextItem),
    Subheading(TextItem),
    Body(TextItem),
    Caption(TextItem),
    Footnote(TextItem),
    Image(ImageItem),
    Shape(ShapeItem),
    Table(TableItem),
    Chart(ChartItem),
    Diagram(DiagramItem),
}

impl ContentItem {
    /// The text kind, for the seven text variants.
    pub fn text_kind(&self) -> Option<TextKind> {
        let kind = match self {
            Self::Text(_) => TextKind::Text,
            Self::Title(_) => TextKind::Title,
            Self::Heading(_) => TextKind::Heading,
            Self::Subheading(_) => TextKind::Subheading,
            Self::Body(_) => TextKind::Body,
            Self::Caption(_) => TextKind::Caption,
            Self::Footnote(_) => TextKind::Footnote,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_text(&self) -> Option<&TextItem> {
        match self {
            Self::Text(item)
            | Self::Title(item)
            | Self::Heading(item)
            | Self::Subheading(item)
            | Self::Body(item)
            | Self::Caption(item)
            | Self::Footnote(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextItem> {
        match self {
            Self::Text(item)
            | Self::Title(item)
            | Self::Heading(item)
            | Self::Subheading(item)
            | Self::Body(item)
            | Self::Caption(item)
            | Self::Footnote(item) => Some(item),
            _ => None,
        }
    }

    /// The element kind this item produces on the slide.
    pub fn element_kind(&self) -> ElementKind {
        match self {
            Self::Text(_)
            | Self::Title(_)
            | Self::Heading(_)
            | Self::Subheading(_)
            | Self::Body(_)
            | Self::Caption(_)
            | Self::Footnote(_) => ElementKind::Text,
            Self::Image(_) => ElementKind::Image,
            Self::Shape(_) => ElementKind::Shape,
            Self::Table(_) => ElementKind::Table,
            Self::Chart(_) => ElementKind::Chart,
            Self::Diagram(_) => ElementKind::Diagram,
        }
    }

    /// The caller-pinned position, if any.
    pub fn position(&self) -> Option<&AbsoluteBox> {
        match self {
            Self::Text(item)
            | Self::Title(item)
            | Self::Heading(item)
            | Self::Subheading(item)
            | Self::Body(item)
            | Self::Caption(item)
            | Self::Footnote(item) => item.position.as_ref(),
            Self::Image(item) => item.position.as_ref(),
            Self::Shape(item) => item.position.as_ref(),
            Self::Table(item) => item.position.as_ref(),
            Self::Chart(item) => item.position.as_ref(),
            Self::Diagram(item) => item.position.as_ref(),
        }
    }
}

/// The hierarchy level of a piece of text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TextKind {
    Text,
    Title,
    Heading,
    Subheading,
    Body,
    Caption,
    Footnote,
}

/// The payload shared by all text kinds.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TextItem {
    pub content: String,

    /// Style overrides; unset fields resolve from the active theme.
    #[serde(default)]
    pub style: Option<TextStyle>,

    /// A caller-pinned box; skips layout assignment.
    #[serde(default)]
    pub position: Option<AbsoluteBox>,
}

/// Caller-provided text style overrides.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TextStyle {
    #[serde(default)]
    pub font_family: Option<String>,

    /// Font size in points; validated to the 14..=72 range.
    #[serde(default)]
    pub font_size: Option<f64>,

    #[serde(default)]
    pub bold: Option<bool>,

    #[serde(default)]
    pub italic: Option<bool>,

    #[serde(default)]
    pub color: Option<Color>,

    /// Line height as a ratio of the font size.
    #[serde(default)]
    pub line_height: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImageItem {
    pub source: ImageSource,

    /// Alternative text; its absence draws a warning.
    #[serde(default)]
    pub alt: Option<String>,

    #[serde(default)]
    pub position: Option<AbsoluteBox>,
}

/// An image either hosted elsewhere or inlined as bytes.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ImageSource {
    Url(String),
    Bytes {
        /// Base64-encoded image bytes.
        data: String,
        mime: String,
    },
}

impl ImageSource {
    /// The URL submitted upstream; inline bytes become a data URL since the
    /// system does not host media.
    pub fn as_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes { data, mime } => format!("data:{mime};base64,{data}"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeItem {
    pub shape: ShapeKind,

    #[serde(default)]
    pub fill: Option<Color>,

    #[serde(default)]
    pub position: Option<AbsoluteBox>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    RoundedRectangle,
    Ellipse,
    Triangle,
    Diamond,
    Arrow,
    Chevron,
    Line,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableItem {
    pub headers: Vec<String>,

    pub rows: Vec<Vec<CellValue>>,

    #[serde(default)]
    pub style: Option<TableStyle>,

    #[serde(default)]
    pub position: Option<AbsoluteBox>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableStyle {
    /// Alternate row shading using the theme's surface color.
    #[serde(default)]
    pub banded_rows: Option<bool>,

    #[serde(default)]
    pub header_fill: Option<Color>,
}

/// A single table or chart cell.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The numeric value, coercing unambiguous strings like `"1,234.5"`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => {
                let stripped: String = text.trim().chars().filter(|c| *c != ',').collect();
                if stripped.is_empty() { None } else { stripped.parse().ok() }
            }
            Self::Null => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Number(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    format!("{}", *value as i64)
                } else {
                    value.to_string()
                }
            }
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChartItem {
    /// Checked against the chart-type whitelist when the chart is built, so
    /// an unknown type skips the element rather than failing the deck.
    pub chart_type: String,

    /// Header row followed by data rows.
    pub data: Vec<Vec<CellValue>>,

    #[serde(default)]
    pub options: Option<ChartOptions>,

    #[serde(default)]
    pub position: Option<AbsoluteBox>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiagramItem {
    /// The diagram source text, at most 16 KiB.
    pub source: String,

    pub dialect: DiagramDialect,

    #[serde(default)]
    pub style: Option<DiagramStyle>,

    #[serde(default)]
    pub position: Option<AbsoluteBox>,
}

/// A rectangle on a slide, in points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AbsoluteBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl AbsoluteBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// The kind of element created on a slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
    Text,
    Image,
    Shape,
    Table,
    Chart,
    Diagram,
}

/// What a `generate` call produced.
#[derive(Clone, Debug, Serialize)]
pub struct DeckResult {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub slides: Vec<SlideResult>,

    pub warnings: Vec<DeckWarning>,

    pub cancelled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: String,
}

impl DeckResult {
    /// A fully-fatal result: nothing was created upstream.
    pub fn failure(error: impl Into<String>, created_at: String) -> Self {
        Self {
            ok: false,
            deck_id: None,
            url: None,
            slides: Vec::new(),
            warnings: Vec::new(),
            cancelled: false,
            error: Some(error.into()),
            created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SlideResult {
    pub slide_id: String,
    pub index: usize,
    pub elements: Vec<ElementResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ElementResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,

    pub kind: ElementKind,

    pub resolved_box: AbsoluteBox,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A non-fatal problem recorded while generating.
#[derive(Clone, Debug, Serialize)]
pub struct DeckWarning {
    pub code: WarningCode,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WarningCode {
    Validation,
    Layout,
    ChartType,
    ChartData,
    DiagramTooLarge,
    DiagramRenderer,
    UpstreamTransient,
    UpstreamPermanent,
    RateLimited,
    MissingAltText,
    LongContent,
    FontSizeClamped,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_item_kind_tags() {
        let item: ContentItem =
            serde_yaml::from_str("kind: title\ncontent: Hello World").expect("parse failed");
        assert_eq!(item.text_kind(), Some(TextKind::Title));
        assert_eq!(item.element_kind(), ElementKind::Text);

        let item: ContentItem = serde_yaml::from_str(
            "kind: diagram\nsource: \"graph TD; A-->B;\"\ndialect: mermaid",
        )
        .expect("parse failed");
        assert_eq!(item.element_kind(), ElementKind::Diagram);
    }

    #[test]
    fn image_source_forms() {
        let url: ImageSource = serde_json::from_str(r#""https://example.com/a.png""#).unwrap();
        assert_eq!(url.as_url(), "https://example.com/a.png");

        let bytes: ImageSource =
            serde_json::from_str(r#"{"data": "aGk=", "mime": "image/png"}"#).unwrap();
        assert_eq!(bytes.as_url(), "data:image/png;base64,aGk=");
    }

    #[test]
    fn cell_value_coercion() {
        assert_eq!(CellValue::Text("1,234.5".into()).as_number(), Some(1234.5));
        assert_eq!(CellValue::Text("n/a".into()).as_number(), None);
        assert_eq!(CellValue::Number(3.0).as_number(), Some(3.0));
        assert!(CellValue::Null.is_null());

        let parsed: CellValue = serde_json::from_str("null").unwrap();
        assert!(parsed.is_null());
    }

    #[test]
    fn audience_size_infers_distance() {
        let far = DeckOptions { audience_size: Some(200), ..Default::default() };
        assert_eq!(far.effective_distance(), ViewingDistance::Far);

        let close = DeckOptions { audience_size: Some(5), ..Default::default() };
        assert_eq!(close.effective_distance(), ViewingDistance::Close);

        let explicit = DeckOptions {
            audience_size: Some(200),
            viewing_distance: Some(ViewingDistance::Close),
            ..Default::default()
        };
        assert_eq!(explicit.effective_distance(), ViewingDistance::Close);
    }

    #[test]
    fn deck_spec_round_trip() {
        let yaml = r#"
title: Quarterly Review
slides:
  - title: Agenda
    content:
      - kind: body
        content: Welcome
      - kind: image
        source: https://example.com/pic.png
        alt: a picture
layout:
  kind: double_column
  responsive: true
"#;
        let spec: DeckSpec = serde_yaml::from_str(yaml).expect("parse failed");
        assert_eq!(spec.title, "Quarterly Review");
        assert_eq!(spec.slides.len(), 1);
        assert_eq!(spec.slides[0].content.len(), 2);
        let json = serde_json::to_string(&spec).unwrap();
        let back: DeckSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.slides[0].title.as_deref(), Some("Agenda"));
    }
}
