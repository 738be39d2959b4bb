//! Validation and sanitisation of caller input.
//!
//! Everything callers hand the engine passes through here before any
//! upstream call; downstream components treat validated values as trusted.

use crate::{
    config::LimitsConfig,
    deck::{ContentItem, DeckSpec, SlideSpec, WarningCode},
    deck::AbsoluteBox,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use itertools::Itertools;
use serde::Serialize;

const MAX_TITLE_LEN: usize = 200;
const MAX_TABLE_CELLS: usize = 400;
const MAX_CHART_HEADERS: usize = 20;
const LONG_CONTENT_THRESHOLD: usize = 1000;
const LONG_CHART_THRESHOLD: usize = 1000;

/// A fatal problem with a specific field.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// A non-fatal anomaly worth surfacing.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub code: WarningCode,
    pub message: String,
}

/// A sanitised value plus the warnings gathered while producing it.
#[derive(Clone, Debug)]
pub struct Validated<T> {
    pub value: T,
    pub warnings: Vec<ValidationWarning>,
}

/// Validation failed; nothing was sanitised.
#[derive(Debug, thiserror::Error)]
#[error("validation failed: {}", summary(.errors))]
pub struct ValidationFailure {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

fn summary(errors: &[ValidationError]) -> String {
    let mut rendered =
        errors.iter().take(3).map(|e| format!("{}: {}", e.field, e.message)).join("; ");
    if errors.len() > 3 {
        rendered.push_str(&format!(" (+{} more)", errors.len() - 3));
    }
    rendered
}

/// The report shape returned by the caller-facing `validate` operation.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitised: Option<DeckSpec>,
}

pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Validates and sanitises a whole deck spec.
    pub fn validate_deck(&self, mut spec: DeckSpec) -> Result<Validated<DeckSpec>, ValidationFailure> {
        let mut ctx = Context::default();

        spec.title = sanitize_text(&spec.title).trim().to_string();
        if spec.title.is_empty() {
            ctx.error("title", "must not be empty");
        } else if spec.title.chars().count() > MAX_TITLE_LEN {
            ctx.error("title", format!("must be at most {MAX_TITLE_LEN} characters"));
        }

        if spec.slides.is_empty() {
            ctx.error("slides", "deck needs at least one slide");
        } else if spec.slides.len() > self.limits.max_slides {
            ctx.error(
                "slides",
                format!("{} slides exceed the limit of {}", spec.slides.len(), self.limits.max_slides),
            );
        }

        for (index, slide) in spec.slides.iter_mut().enumerate() {
            self.check_slide(&mut ctx, &format!("slides[{index}]"), slide);
        }

        ctx.finish(spec)
    }

    /// Validates and sanitises a single slide, as used by `add_slide`.
    pub fn validate_slide(&self, mut spec: SlideSpec) -> Result<Validated<SlideSpec>, ValidationFailure> {
        let mut ctx = Context::default();
        self.check_slide(&mut ctx, "slide", &mut spec);
        ctx.finish(spec)
    }

    /// The `validate` surface operation: never fails, always reports.
    pub fn report(&self, spec: DeckSpec) -> ValidationReport {
        match self.validate_deck(spec) {
            Ok(validated) => ValidationReport {
                ok: true,
                errors: Vec::new(),
                warnings: validated.warnings,
                sanitised: Some(validated.value),
            },
            Err(failure) => ValidationReport {
                ok: false,
                errors: failure.errors,
                warnings: failure.warnings,
                sanitised: None,
            },
        }
    }

    fn check_slide(&self, ctx: &mut Context, field: &str, slide: &mut SlideSpec) {
        if let Some(title) = &slide.title {
            slide.title = Some(sanitize_text(title).trim().to_string());
        }
        if slide.content.len() > self.limits.max_content_items_per_slide {
            ctx.error(
                format!("{field}.content"),
                format!(
                    "{} items exceed the limit of {}",
                    slide.content.len(),
                    self.limits.max_content_items_per_slide
                ),
            );
        }
        for (index, item) in slide.content.iter_mut().enumerate() {
            self.check_item(ctx, &format!("{field}.content[{index}]"), item);
        }
    }

    fn check_item(&self, ctx: &mut Context, field: &str, item: &mut ContentItem) {
        if let Some(rect) = item.position() {
            check_box(ctx, &format!("{field}.position"), rect);
        }
        let text_kind = item.text_kind();
        if let Some(text) = item.as_text_mut() {
            text.content = sanitize_text(&text.content);
            if text.content.chars().count() > self.limits.max_text_len {
                ctx.error(
                    format!("{field}.content"),
                    format!("text exceeds the limit of {} characters", self.limits.max_text_len),
                );
            } else if text.content.chars().count() > LONG_CONTENT_THRESHOLD {
                ctx.warn(
                    format!("{field}.content"),
                    WarningCode::LongContent,
                    "long text content may be truncated or unreadable on a slide",
                );
            }
            if let Some(size) = text.style.as_ref().and_then(|s| s.font_size) {
                if !(14.0..=72.0).contains(&size) {
                    ctx.error(
                        format!("{field}.style.font_size"),
                        format!("{size}pt is outside the allowed 14..=72 range"),
                    );
                } else if let Some(kind) = text_kind {
                    let floor = crate::design::metrics::accessibility_minimum(kind);
                    if size < floor {
                        ctx.warn(
                            format!("{field}.style.font_size"),
                            WarningCode::FontSizeClamped,
                            format!("{size}pt is below the {floor}pt minimum for {kind} text and will be raised"),
                        );
                    }
                }
            }
            return;
        }
        match item {
            ContentItem::Image(image) => {
                match &image.source {
                    crate::deck::ImageSource::Url(url) => {
                        if !has_allowed_scheme(url) {
                            ctx.error(
                                format!("{field}.source"),
                                "URL scheme must be http, https or data",
                            );
                        }
                    }
                    crate::deck::ImageSource::Bytes { data, .. } => {
                        if BASE64.decode(data).is_err() {
                            ctx.error(format!("{field}.source"), "image bytes are not valid base64");
                        }
                    }
                }
                if image.alt.as_deref().map(str::trim).unwrap_or("").is_empty() {
                    ctx.warn(
                        format!("{field}.alt"),
                        WarningCode::MissingAltText,
                        "image has no alternative text",
                    );
                }
            }
            ContentItem::Table(table) => {
                if table.headers.is_empty() {
                    ctx.error(format!("{field}.headers"), "table needs at least one header");
                }
                let cells = table.rows.len() * table.headers.len().max(1);
                if cells > MAX_TABLE_CELLS {
                    ctx.error(
                        format!("{field}.rows"),
                        format!("{cells} cells exceed the limit of {MAX_TABLE_CELLS}"),
                    );
                }
                for (row_index, row) in table.rows.iter().enumerate() {
                    if row.len() != table.headers.len() {
                        ctx.error(
                            format!("{field}.rows[{row_index}]"),
                            format!("has {} cells, expected {}", row.len(), table.headers.len()),
                        );
                    }
                }
                table.headers = table.headers.iter().map(|h| sanitize_text(h)).collect();
            }
            ContentItem::Chart(chart) => {
                let Some(headers) = chart.data.first() else {
                    ctx.error(format!("{field}.data"), "chart data needs a header row");
                    return;
                };
                if headers.is_empty() || headers.len() > MAX_CHART_HEADERS {
                    ctx.error(
                        format!("{field}.data[0]"),
                        format!("header count must be within 1..={MAX_CHART_HEADERS}"),
                    );
                }
                let data_rows = chart.data.len() - 1;
                if data_rows > self.limits.max_chart_rows {
                    ctx.error(
                        format!("{field}.data"),
                        format!(
                            "{data_rows} rows exceed the limit of {}",
                            self.limits.max_chart_rows
                        ),
                    );
                } else if data_rows > LONG_CHART_THRESHOLD {
                    ctx.warn(
                        format!("{field}.data"),
                        WarningCode::ChartData,
                        format!("{data_rows} data points may render slowly"),
                    );
                }
            }
            ContentItem::Diagram(diagram) => {
                if diagram.source.trim().is_empty() {
                    ctx.error(format!("{field}.source"), "diagram source must not be empty");
                } else if diagram.source.len() > self.limits.max_diagram_source_bytes {
                    ctx.error(
                        format!("{field}.source"),
                        format!(
                            "{} bytes exceed the limit of {}",
                            diagram.source.len(),
                            self.limits.max_diagram_source_bytes
                        ),
                    );
                }
            }
            // Shape enums are enforced by deserialisation.
            _ => {}
        }
    }
}

fn check_box(ctx: &mut Context, field: &str, rect: &AbsoluteBox) {
    let values = [rect.x, rect.y, rect.width, rect.height];
    if values.iter().any(|v| !v.is_finite()) {
        ctx.error(field, "position values must be finite");
        return;
    }
    if rect.x < 0.0 || rect.y < 0.0 {
        ctx.error(field, "position must not be negative");
    }
    if rect.width <= 0.0 || rect.height <= 0.0 {
        ctx.error(field, "width and height must be positive");
    }
}

fn has_allowed_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// Strips HTML tags and decodes the standard entities.
pub fn sanitize_text(input: &str) -> String {
    let mut stripped = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    decode_entities(&stripped)
}

fn decode_entities(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';').filter(|end| *end <= 10) {
            Some(end) => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(decoded) => output.push(decoded),
                    None => output.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                output.push('&');
                rest = &tail[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(decimal) = entity.strip_prefix('#') {
                decimal.parse().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

#[derive(Default)]
struct Context {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
}

impl Context {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError { field: field.into(), message: message.into() });
    }

    fn warn(&mut self, field: impl Into<String>, code: WarningCode, message: impl Into<String>) {
        self.warnings.push(ValidationWarning { field: field.into(), code, message: message.into() });
    }

    fn finish<T>(self, value: T) -> Result<Validated<T>, ValidationFailure> {
        if self.errors.is_empty() {
            Ok(Validated { value, warnings: self.warnings })
        } else {
            Err(ValidationFailure { errors: self.errors, warnings: self.warnings })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::deck::{ImageItem, ImageSource, SlideSpec, TextItem, TextStyle};
    use rstest::rstest;

    fn validator() -> Validator {
        Validator::new(LimitsConfig::default())
    }

    fn deck(slides: Vec<SlideSpec>) -> DeckSpec {
        DeckSpec { title: "Deck".into(), slides, theme: None, layout: None, options: Default::default() }
    }

    fn text_slide(content: &str) -> SlideSpec {
        SlideSpec {
            content: vec![crate::deck::ContentItem::Body(TextItem {
                content: content.into(),
                style: None,
                position: None,
            })],
            ..Default::default()
        }
    }

    #[test]
    fn minimal_deck_is_valid() {
        let validated = validator().validate_deck(deck(vec![text_slide("hello")])).expect("invalid");
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn empty_title_is_fatal() {
        let mut spec = deck(vec![text_slide("hello")]);
        spec.title = "   ".into();
        let failure = validator().validate_deck(spec).expect_err("valid");
        assert_eq!(failure.errors[0].field, "title");
    }

    #[test]
    fn slide_count_boundary() {
        let limit = LimitsConfig::default().max_slides;
        let at_limit = deck((0..limit).map(|_| text_slide("x")).collect());
        assert!(validator().validate_deck(at_limit).is_ok());

        let over = deck((0..limit + 1).map(|_| text_slide("x")).collect());
        assert!(validator().validate_deck(over).is_err());
    }

    #[test]
    fn html_is_stripped_and_entities_decoded() {
        let validated = validator()
            .validate_deck(deck(vec![text_slide("<b>bold</b> &amp; <i>brave&#33;</i>")]))
            .expect("invalid");
        let item = &validated.value.slides[0].content[0];
        assert_eq!(item.as_text().unwrap().content, "bold & brave!");
    }

    #[rstest]
    #[case::http("http://example.com/a.png", true)]
    #[case::https("https://example.com/a.png", true)]
    #[case::data("data:image/png;base64,aGk=", true)]
    #[case::ftp("ftp://example.com/a.png", false)]
    #[case::javascript("javascript:alert(1)", false)]
    fn image_url_schemes(#[case] url: &str, #[case] ok: bool) {
        let slide = SlideSpec {
            content: vec![crate::deck::ContentItem::Image(ImageItem {
                source: ImageSource::Url(url.into()),
                alt: Some("alt".into()),
                position: None,
            })],
            ..Default::default()
        };
        let result = validator().validate_deck(deck(vec![slide]));
        assert_eq!(result.is_ok(), ok, "url {url}");
    }

    #[test]
    fn missing_alt_text_is_a_warning() {
        let slide = SlideSpec {
            content: vec![crate::deck::ContentItem::Image(ImageItem {
                source: ImageSource::Url("https://example.com/a.png".into()),
                alt: None,
                position: None,
            })],
            ..Default::default()
        };
        let validated = validator().validate_deck(deck(vec![slide])).expect("invalid");
        assert_eq!(validated.warnings.len(), 1);
        assert_eq!(validated.warnings[0].code, WarningCode::MissingAltText);
    }

    #[test]
    fn long_text_warns_but_passes() {
        let validated =
            validator().validate_deck(deck(vec![text_slide(&"a".repeat(2000))])).expect("invalid");
        assert_eq!(validated.warnings[0].code, WarningCode::LongContent);
    }

    #[test]
    fn font_size_out_of_range_is_fatal() {
        let slide = SlideSpec {
            content: vec![crate::deck::ContentItem::Body(TextItem {
                content: "x".into(),
                style: Some(TextStyle { font_size: Some(100.0), ..Default::default() }),
                position: None,
            })],
            ..Default::default()
        };
        let failure = validator().validate_deck(deck(vec![slide])).expect_err("valid");
        assert!(failure.errors[0].field.ends_with("font_size"));
    }

    #[test]
    fn font_size_below_the_accessibility_floor_warns() {
        let slide = SlideSpec {
            content: vec![crate::deck::ContentItem::Title(TextItem {
                content: "tiny title".into(),
                style: Some(TextStyle { font_size: Some(20.0), ..Default::default() }),
                position: None,
            })],
            ..Default::default()
        };
        let validated = validator().validate_deck(deck(vec![slide])).expect("invalid");
        assert_eq!(validated.warnings[0].code, WarningCode::FontSizeClamped);
    }

    #[test]
    fn empty_slide_content_is_allowed() {
        let slide = SlideSpec::default();
        assert!(validator().validate_deck(deck(vec![slide])).is_ok());
    }

    #[test]
    fn report_shape_for_invalid_input() {
        let mut spec = deck(vec![text_slide("hi")]);
        spec.title = String::new();
        let report = validator().report(spec);
        assert!(!report.ok);
        assert!(!report.errors.is_empty());
        assert!(report.sanitised.is_none());
    }

    #[rstest]
    #[case("no entities", "no entities")]
    #[case("&unknown;", "&unknown;")]
    #[case("a &lt; b &gt; c", "a < b > c")]
    #[case("&#x41;&#66;", "AB")]
    #[case("tail &", "tail &")]
    fn entity_decoding(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_text(input), expected);
    }
}
