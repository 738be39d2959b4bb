//! Turning tabular data into chart artifacts.
//!
//! Depending on upstream capability a chart becomes either a native chart
//! spec or an image rendered through the diagram endpoint contract.

use crate::{
    deck::{CellValue, ChartItem},
    design::color::Color,
    diagram::{DiagramError, DiagramRenderer, RenderedImage},
    theme::Theme,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{str::FromStr, sync::Arc};

/// The closed set of chart types.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Column,
    Line,
    Area,
    Pie,
    Scatter,
    Table,
    Combo,
    Gauge,
    Radar,
    Timeline,
    Bubble,
    Candlestick,
    Histogram,
    Treemap,
    Waterfall,
}

/// Caller-facing chart options; unknown keys fail deserialisation.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChartOptions {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub x_axis: Option<String>,

    #[serde(default)]
    pub y_axis: Option<String>,

    #[serde(default)]
    pub legend: Option<bool>,

    #[serde(default)]
    pub stacked: Option<bool>,

    /// Series colors; defaults to the theme palette.
    #[serde(default)]
    pub colors: Option<Vec<Color>>,
}

/// What a chart build produces.
#[derive(Clone, Debug)]
pub enum ChartArtifact {
    /// A native chart spec for an upstream that supports charts.
    Spec(serde_json::Value),
    /// A rendered image for everyone else.
    Image(Arc<RenderedImage>),
}

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("unknown chart type '{0}'")]
    UnknownType(String),

    #[error("chart data: {0}")]
    Data(String),

    #[error(transparent)]
    Render(#[from] DiagramError),
}

pub struct ChartBuilder {
    supports_charts: bool,
    max_rows: usize,
}

impl ChartBuilder {
    pub fn new(supports_charts: bool, max_rows: usize) -> Self {
        Self { supports_charts, max_rows }
    }

    /// Validates the data, applies theme colors and produces the artifact.
    pub fn build(
        &self,
        item: &ChartItem,
        theme: &Theme,
        renderer: &DiagramRenderer,
    ) -> Result<ChartArtifact, ChartError> {
        let kind = ChartKind::from_str(&item.chart_type)
            .map_err(|_| ChartError::UnknownType(item.chart_type.clone()))?;
        let table = ChartTable::from_rows(&item.data, self.max_rows)?;
        let options = item.options.clone().unwrap_or_default();
        let spec = chart_spec(kind, &table, &options, theme);
        if self.supports_charts {
            Ok(ChartArtifact::Spec(spec))
        } else {
            Ok(ChartArtifact::Image(renderer.render_chart(&spec)?))
        }
    }
}

/// Validated, coerced chart data: a header row and uniform data rows.
struct ChartTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl ChartTable {
    fn from_rows(data: &[Vec<CellValue>], max_rows: usize) -> Result<Self, ChartError> {
        let Some(header_row) = data.first() else {
            return Err(ChartError::Data("missing header row".into()));
        };
        if header_row.is_empty() {
            return Err(ChartError::Data("header row is empty".into()));
        }
        let headers: Vec<String> = header_row.iter().map(CellValue::display).collect();
        if headers.iter().any(|h| h.trim().is_empty()) {
            return Err(ChartError::Data("headers must not be blank".into()));
        }

        let data_rows = &data[1..];
        if data_rows.len() > max_rows {
            return Err(ChartError::Data(format!(
                "{} rows exceed the limit of {max_rows}",
                data_rows.len()
            )));
        }
        let mut rows = Vec::with_capacity(data_rows.len());
        for (index, row) in data_rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(ChartError::Data(format!(
                    "row {index} has {} cells, expected {}",
                    row.len(),
                    headers.len()
                )));
            }
            rows.push(row.iter().map(coerce).collect());
        }
        Ok(Self { headers, rows })
    }
}

/// Numeric strings become numbers; everything else stays as is. Nulls
/// render as gaps downstream.
fn coerce(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Text(_) => match cell.as_number() {
            Some(value) => CellValue::Number(value),
            None => cell.clone(),
        },
        other => other.clone(),
    }
}

fn chart_spec(
    kind: ChartKind,
    table: &ChartTable,
    options: &ChartOptions,
    theme: &Theme,
) -> serde_json::Value {
    let palette = series_colors(options, theme);
    let categories: Vec<serde_json::Value> =
        table.rows.iter().map(|row| cell_json(&row[0])).collect();
    let series: Vec<serde_json::Value> = table
        .headers
        .iter()
        .enumerate()
        .skip(if table.headers.len() > 1 { 1 } else { 0 })
        .map(|(column, name)| {
            let values: Vec<serde_json::Value> =
                table.rows.iter().map(|row| cell_json(&row[column])).collect();
            let color = palette[(column.max(1) - 1) % palette.len()];
            json!({
                "name": name,
                "color": color.to_string(),
                "values": values,
            })
        })
        .collect();
    json!({
        "type": kind.to_string(),
        "title": options.title,
        "legend": options.legend.unwrap_or(true),
        "stacked": options.stacked.unwrap_or(false),
        "axes": {
            "x": options.x_axis.clone().unwrap_or_else(|| table.headers[0].clone()),
            "y": options.y_axis,
        },
        "background": theme.palette.background.to_string(),
        "categories": categories,
        "series": series,
    })
}

fn cell_json(cell: &CellValue) -> serde_json::Value {
    match cell {
        CellValue::Null => serde_json::Value::Null,
        CellValue::Number(value) => json!(value),
        CellValue::Text(text) => json!(text),
    }
}

fn series_colors(options: &ChartOptions, theme: &Theme) -> Vec<Color> {
    if let Some(colors) = &options.colors {
        if !colors.is_empty() {
            return colors.clone();
        }
    }
    vec![
        theme.palette.primary,
        theme.palette.secondary,
        theme.palette.accent,
        theme.palette.semantic.info,
        theme.palette.semantic.success,
        theme.palette.semantic.warning,
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::DiagramConfig, theme::registry::builtin_themes};
    use rstest::rstest;

    fn theme() -> Theme {
        builtin_themes().into_iter().next().unwrap()
    }

    fn renderer() -> DiagramRenderer {
        DiagramRenderer::new(&DiagramConfig::default(), 16 * 1024)
    }

    fn builder() -> ChartBuilder {
        ChartBuilder::new(true, 10_000)
    }

    fn chart(chart_type: &str, data: Vec<Vec<CellValue>>) -> ChartItem {
        ChartItem { chart_type: chart_type.into(), data, options: None, position: None }
    }

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::Text(c.to_string())).collect()
    }

    #[rstest]
    #[case("bar")]
    #[case("column")]
    #[case("line")]
    #[case("pie")]
    #[case("candlestick")]
    #[case("waterfall")]
    fn whitelisted_types_build(#[case] chart_type: &str) {
        let item = chart(chart_type, vec![row(&["label", "value"]), row(&["a", "1"])]);
        let artifact = builder().build(&item, &theme(), &renderer()).expect("build failed");
        let ChartArtifact::Spec(spec) = artifact else { panic!("expected a spec") };
        assert_eq!(spec["type"], chart_type);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let item = chart("hologram", vec![row(&["a", "b"]), row(&["1", "2"])]);
        let err = builder().build(&item, &theme(), &renderer()).expect_err("build succeeded");
        assert!(matches!(err, ChartError::UnknownType(name) if name == "hologram"));
    }

    #[test]
    fn missing_header_row_is_rejected() {
        let item = chart("bar", vec![]);
        let err = builder().build(&item, &theme(), &renderer()).expect_err("build succeeded");
        assert!(matches!(err, ChartError::Data(_)));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let item = chart("bar", vec![row(&["a", "b"]), row(&["1"])]);
        let err = builder().build(&item, &theme(), &renderer()).expect_err("build succeeded");
        assert!(matches!(err, ChartError::Data(message) if message.contains("row 0")));
    }

    #[test]
    fn row_limit_is_enforced() {
        let mut data = vec![row(&["x", "y"])];
        data.extend((0..11).map(|_| row(&["a", "1"])));
        let item = chart("line", data);
        let small = ChartBuilder::new(true, 10);
        let err = small.build(&item, &theme(), &renderer()).expect_err("build succeeded");
        assert!(matches!(err, ChartError::Data(_)));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let item = chart(
            "line",
            vec![
                row(&["month", "revenue"]),
                vec![CellValue::Text("jan".into()), CellValue::Text("1,200.5".into())],
                vec![CellValue::Text("feb".into()), CellValue::Null],
            ],
        );
        let artifact = builder().build(&item, &theme(), &renderer()).unwrap();
        let ChartArtifact::Spec(spec) = artifact else { panic!("expected a spec") };
        assert_eq!(spec["series"][0]["values"][0], 1200.5);
        assert!(spec["series"][0]["values"][1].is_null());
    }

    #[test]
    fn theme_palette_colors_series_by_default() {
        let theme = theme();
        let item = chart(
            "bar",
            vec![row(&["q", "a", "b"]), row(&["q1", "1", "2"])],
        );
        let ChartArtifact::Spec(spec) = builder().build(&item, &theme, &renderer()).unwrap() else {
            panic!("expected a spec")
        };
        assert_eq!(spec["series"][0]["color"], theme.palette.primary.to_string());
        assert_eq!(spec["series"][1]["color"], theme.palette.secondary.to_string());
    }

    #[test]
    fn explicit_colors_override_the_palette() {
        let item = ChartItem {
            chart_type: "bar".into(),
            data: vec![row(&["q", "a"]), row(&["q1", "1"])],
            options: Some(ChartOptions {
                colors: Some(vec!["#123456".parse().unwrap()]),
                ..Default::default()
            }),
            position: None,
        };
        let ChartArtifact::Spec(spec) = builder().build(&item, &theme(), &renderer()).unwrap() else {
            panic!("expected a spec")
        };
        assert_eq!(spec["series"][0]["color"], "#123456");
    }

    #[test]
    fn image_path_requires_an_endpoint() {
        let image_builder = ChartBuilder::new(false, 10_000);
        let item = chart("bar", vec![row(&["a", "b"]), row(&["1", "2"])]);
        let err = image_builder.build(&item, &theme(), &renderer()).expect_err("build succeeded");
        assert!(matches!(err, ChartError::Render(DiagramError::Unconfigured)));
    }
}
