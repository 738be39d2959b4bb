//! The column grid a slide's content area is carved into.

use super::LayoutError;
use crate::{
    deck::AbsoluteBox,
    design::metrics::{round_half_even, Margins, SlideDimensions},
};
use serde::{Deserialize, Serialize};

/// Space between adjacent columns and rows, in points.
pub const DEFAULT_GUTTER: f64 = 16.0;

/// Default number of grid columns.
pub const DEFAULT_COLUMNS: usize = 12;

/// A named rectangular region within a grid, `start` inclusive, `end`
/// exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GridArea {
    pub row_start: usize,
    pub col_start: usize,
    pub row_end: usize,
    pub col_end: usize,
}

impl GridArea {
    pub fn new(row_start: usize, col_start: usize, row_end: usize, col_end: usize) -> Self {
        Self { row_start, col_start, row_end, col_end }
    }
}

/// Grid geometry derived from slide dimensions and margins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    pub width: f64,
    pub height: f64,
    pub margins: Margins,
    pub columns: usize,
    pub gutter: f64,
    pub column_width: f64,
    pub content_width: f64,
    pub content_height: f64,
}

impl Grid {
    pub fn new(
        slide: SlideDimensions,
        margins: Margins,
        columns: usize,
        gutter: f64,
    ) -> Result<Self, LayoutError> {
        if columns == 0 {
            return Err(LayoutError::InvalidGrid("column count must be positive".into()));
        }
        let content_width = slide.width - margins.left - margins.right;
        let content_height = slide.height - margins.top - margins.bottom;
        if content_width <= 0.0 || content_height <= 0.0 {
            return Err(LayoutError::InvalidGrid(format!(
                "margins leave no content area on a {}x{} slide",
                slide.width, slide.height
            )));
        }
        let column_width = (content_width - gutter * (columns as f64 - 1.0)) / columns as f64;
        if column_width <= 0.0 {
            return Err(LayoutError::InvalidGrid(format!(
                "{columns} columns with a {gutter}pt gutter do not fit in {content_width}pt"
            )));
        }
        Ok(Self {
            width: slide.width,
            height: slide.height,
            margins,
            columns,
            gutter,
            column_width,
            content_width,
            content_height,
        })
    }

    /// Horizontal offset and extent of a run of columns.
    ///
    /// Edges round half-to-even; a span that reaches the last column lands
    /// exactly on `margins.left + content_width`, absorbing any rounding
    /// remainder.
    pub fn column_span(&self, start_col: usize, span_cols: usize) -> Result<Span, LayoutError> {
        if span_cols == 0 || start_col + span_cols > self.columns {
            return Err(LayoutError::InvalidGrid(format!(
                "column span {start_col}+{span_cols} exceeds {} columns",
                self.columns
            )));
        }
        let step = self.column_width + self.gutter;
        let left = round_half_even(self.margins.left + start_col as f64 * step);
        let right = if start_col + span_cols == self.columns {
            round_half_even(self.margins.left + self.content_width)
        } else {
            round_half_even(self.margins.left + (start_col + span_cols) as f64 * step - self.gutter)
        };
        Ok(Span { offset: left, extent: right - left })
    }

    /// Vertical offset and extent of a run of rows, given the total row
    /// count in play.
    pub fn row_span(&self, start_row: usize, span_rows: usize, total_rows: usize) -> Result<Span, LayoutError> {
        if total_rows == 0 || span_rows == 0 || start_row + span_rows > total_rows {
            return Err(LayoutError::InvalidGrid(format!(
                "row span {start_row}+{span_rows} exceeds {total_rows} rows"
            )));
        }
        let row_height = (self.content_height - self.gutter * (total_rows as f64 - 1.0)) / total_rows as f64;
        if row_height <= 0.0 {
            return Err(LayoutError::InvalidGrid(format!(
                "{total_rows} rows with a {}pt gutter do not fit in {}pt",
                self.gutter, self.content_height
            )));
        }
        let step = row_height + self.gutter;
        let top = round_half_even(self.margins.top + start_row as f64 * step);
        let bottom = if start_row + span_rows == total_rows {
            round_half_even(self.margins.top + self.content_height)
        } else {
            round_half_even(self.margins.top + (start_row + span_rows) as f64 * step - self.gutter)
        };
        Ok(Span { offset: top, extent: bottom - top })
    }

    /// The box covered by a named area, validating it against the grid.
    pub fn area_box(&self, name: &str, area: &GridArea, total_rows: usize) -> Result<AbsoluteBox, LayoutError> {
        if area.col_end <= area.col_start || area.row_end <= area.row_start {
            return Err(LayoutError::InvalidArea {
                name: name.into(),
                reason: "area end must be after its start".into(),
            });
        }
        if area.col_end > self.columns || area.row_end > total_rows {
            return Err(LayoutError::InvalidArea {
                name: name.into(),
                reason: format!(
                    "area exceeds the {}x{total_rows} grid",
                    self.columns
                ),
            });
        }
        let horizontal = self.column_span(area.col_start, area.col_end - area.col_start)?;
        let vertical = self.row_span(area.row_start, area.row_end - area.row_start, total_rows)?;
        Ok(AbsoluteBox {
            x: horizontal.offset,
            y: vertical.offset,
            width: horizontal.extent,
            height: vertical.extent,
        })
    }
}

/// A one-dimensional offset/extent pair, in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Span {
    pub offset: f64,
    pub extent: f64,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::metrics::{responsive_margins, STANDARD_SLIDE};
    use rstest::rstest;

    fn grid(columns: usize) -> Grid {
        Grid::new(STANDARD_SLIDE, responsive_margins(STANDARD_SLIDE), columns, DEFAULT_GUTTER)
            .expect("grid construction failed")
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    #[case(7)]
    #[case(12)]
    fn full_row_lands_on_right_edge(#[case] columns: usize) {
        let grid = grid(columns);
        let span = grid.column_span(0, columns).unwrap();
        let expected_right = round_half_even(grid.margins.left + grid.content_width);
        assert_eq!(span.offset + span.extent, expected_right);
    }

    #[rstest]
    #[case(3)]
    #[case(7)]
    #[case(12)]
    fn columns_tile_the_content_width(#[case] columns: usize) {
        let grid = grid(columns);
        // c * columnWidth + (c - 1) * gutter == contentWidth.
        let total = columns as f64 * grid.column_width + (columns as f64 - 1.0) * grid.gutter;
        assert!((total - grid.content_width).abs() < 1e-9);

        // And the rounded cells tile without gaps: each cell starts where a
        // gutter after the previous one ends.
        let mut edge = None;
        for col in 0..columns {
            let span = grid.column_span(col, 1).unwrap();
            if let Some(previous_right) = edge {
                let gap: f64 = span.offset - previous_right;
                assert!((gap - grid.gutter).abs() <= 1.0, "gap was {gap}");
            }
            edge = Some(span.offset + span.extent);
        }
    }

    #[test]
    fn zero_columns_is_invalid() {
        let result = Grid::new(STANDARD_SLIDE, responsive_margins(STANDARD_SLIDE), 0, DEFAULT_GUTTER);
        assert!(matches!(result, Err(LayoutError::InvalidGrid(_))));
    }

    #[test]
    fn span_past_the_edge_is_invalid() {
        let grid = grid(12);
        assert!(grid.column_span(10, 3).is_err());
        assert!(grid.row_span(2, 2, 3).is_err());
    }

    #[test]
    fn area_boxes_respect_bounds() {
        let grid = grid(12);
        let area = GridArea::new(0, 0, 2, 6);
        let rect = grid.area_box("left", &area, 4).unwrap();
        assert_eq!(rect.x, round_half_even(grid.margins.left));
        assert!(rect.width > 0.0 && rect.height > 0.0);

        let out_of_bounds = GridArea::new(0, 0, 5, 6);
        assert!(matches!(
            grid.area_box("tall", &out_of_bounds, 4),
            Err(LayoutError::InvalidArea { .. })
        ));

        let inverted = GridArea::new(2, 2, 2, 4);
        assert!(grid.area_box("flat", &inverted, 4).is_err());
    }

    #[test]
    fn last_cell_absorbs_rounding_remainder() {
        // 7 columns over 876.8pt of content do not divide evenly.
        let grid = grid(7);
        let last = grid.column_span(6, 1).unwrap();
        let full = grid.column_span(0, 7).unwrap();
        assert_eq!(last.offset + last.extent, full.offset + full.extent);
    }
}
