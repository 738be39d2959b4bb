//! Per-kind dispatch from content items to upstream element operations.

use crate::{
    api::ElementOp,
    chart::{ChartArtifact, ChartBuilder, ChartError},
    deck::{AbsoluteBox, CellValue, ContentItem, TableStyle, TextKind, WarningCode},
    diagram::{DiagramError, DiagramRenderer},
    theme::{resolve::ResolveContext, Theme},
};

/// What building one content item produced.
pub(crate) enum BuiltElement {
    /// A single insertable operation.
    Op(ElementOp),

    /// A table: one insert followed by per-cell fills.
    Table {
        rect: AbsoluteBox,
        headers: Vec<String>,
        rows: Vec<Vec<CellValue>>,
        style: Option<TableStyle>,
    },

    /// The item cannot be built; the slide continues without it.
    Skip { code: WarningCode, message: String },
}

/// Everything element building needs besides the item itself.
pub(crate) struct ElementContext<'a> {
    pub theme: &'a Theme,
    pub resolve: ResolveContext,
    pub charts: &'a ChartBuilder,
    pub renderer: &'a DiagramRenderer,
}

/// Builds the upstream operation for one placed item. Chart and diagram
/// items may render through the diagram endpoint here; everything else is
/// pure.
pub(crate) fn build_element(item: &ContentItem, rect: AbsoluteBox, ctx: &ElementContext<'_>) -> BuiltElement {
    if let (Some(kind), Some(text)) = (item.text_kind(), item.as_text()) {
        let mut resolve = ctx.resolve;
        resolve.content_len = text.content.chars().count();
        let style = ctx.theme.resolve_style(kind, text.style.as_ref(), &resolve);
        return BuiltElement::Op(ElementOp::TextBox { text: text.content.clone(), rect, style });
    }
    match item {
        ContentItem::Image(image) => {
            BuiltElement::Op(ElementOp::Image { url: image.source.as_url(), rect })
        }
        ContentItem::Shape(shape) => BuiltElement::Op(ElementOp::Shape {
            shape: shape.shape,
            rect,
            fill: shape.fill.or(Some(ctx.theme.palette.accent)),
        }),
        ContentItem::Table(table) => BuiltElement::Table {
            rect,
            headers: table.headers.clone(),
            rows: table.rows.clone(),
            style: table.style.clone(),
        },
        ContentItem::Chart(chart) => match ctx.charts.build(chart, ctx.theme, ctx.renderer) {
            Ok(ChartArtifact::Spec(spec)) => BuiltElement::Op(ElementOp::Chart { spec, rect }),
            Ok(ChartArtifact::Image(image)) => {
                BuiltElement::Op(ElementOp::Image { url: image.as_data_url(), rect })
            }
            Err(error) => BuiltElement::Skip { code: chart_warning(&error), message: error.to_string() },
        },
        ContentItem::Diagram(diagram) => {
            let style = diagram.style.clone().unwrap_or_default();
            match ctx.renderer.render(&diagram.source, diagram.dialect, &style) {
                Ok(image) => BuiltElement::Op(ElementOp::Image { url: image.as_data_url(), rect }),
                Err(error) => {
                    BuiltElement::Skip { code: diagram_warning(&error), message: error.to_string() }
                }
            }
        }
        // Text kinds were handled above.
        _ => unreachable!("text item fell through dispatch"),
    }
}

/// The style used to fill one table cell.
pub(crate) fn table_cell_style(
    ctx: &ElementContext<'_>,
    header: bool,
    content_len: usize,
) -> crate::theme::resolve::ResolvedTextStyle {
    let mut resolve = ctx.resolve;
    resolve.content_len = content_len;
    let kind = if header { TextKind::Caption } else { TextKind::Body };
    let mut style = ctx.theme.resolve_style(kind, None, &resolve);
    if header {
        style.bold = true;
        style.color = ctx.theme.palette.text;
    }
    style
}

fn chart_warning(error: &ChartError) -> WarningCode {
    match error {
        ChartError::UnknownType(_) => WarningCode::ChartType,
        ChartError::Data(_) => WarningCode::ChartData,
        ChartError::Render(e) => diagram_warning(e),
    }
}

fn diagram_warning(error: &DiagramError) -> WarningCode {
    match error {
        DiagramError::SourceTooLarge { .. } => WarningCode::DiagramTooLarge,
        _ => WarningCode::DiagramRenderer,
    }
}
