//! A one-dimensional flex container with optional wrapping.

use crate::deck::AbsoluteBox;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexDirection {
    #[default]
    Row,
    Column,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Justify {
    #[default]
    Start,
    Center,
    End,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Start,
    Center,
    End,
    #[default]
    Stretch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Wrap {
    #[default]
    Nowrap,
    Wrap,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlexConfig {
    pub direction: FlexDirection,
    pub justify: Justify,
    pub align: Align,
    pub wrap: Wrap,
    pub gap: f64,
}

/// Main-axis sizing of one flex item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MainSize {
    Fixed(f64),
    Flex { grow: f64, shrink: f64, basis: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlexItem {
    pub main: MainSize,
    /// Intrinsic cross-axis extent; items without one fill their line.
    pub cross: Option<f64>,
}

impl FlexItem {
    pub fn flexible(basis: f64) -> Self {
        Self { main: MainSize::Flex { grow: 1.0, shrink: 1.0, basis }, cross: None }
    }

    pub fn fixed(size: f64) -> Self {
        Self { main: MainSize::Fixed(size), cross: None }
    }
}

/// Lays the items out inside the container, one box per item in input order.
///
/// With `nowrap`, an overfull line shrinks flexible items proportionally to
/// `shrink × basis`. With `wrap`, lines break greedily and share the cross
/// axis evenly.
pub fn arrange(config: &FlexConfig, container: AbsoluteBox, items: &[FlexItem]) -> Vec<AbsoluteBox> {
    if items.is_empty() {
        return Vec::new();
    }
    let (main_extent, cross_extent) = match config.direction {
        FlexDirection::Row => (container.width, container.height),
        FlexDirection::Column => (container.height, container.width),
    };

    let lines = break_lines(config, main_extent, items);
    let line_count = lines.len() as f64;
    let line_cross = ((cross_extent - config.gap * (line_count - 1.0)) / line_count).max(0.0);

    let mut boxes = vec![AbsoluteBox::default(); items.len()];
    let mut cross_offset = 0.0;
    for line in lines {
        let sizes = resolve_line(config, main_extent, items, &line);
        let used: f64 = sizes.iter().sum::<f64>() + config.gap * (line.len() as f64 - 1.0);
        let leftover = (main_extent - used).max(0.0);
        let (lead, extra_gap) = spacing(config.justify, leftover, line.len());

        let mut main_offset = lead;
        for (position, index) in line.iter().enumerate() {
            let main_size = sizes[position];
            let item_cross = items[*index].cross.unwrap_or(line_cross).min(line_cross);
            let cross_in_line = match config.align {
                Align::Start => 0.0,
                Align::Center => (line_cross - item_cross) / 2.0,
                Align::End => line_cross - item_cross,
                Align::Stretch => 0.0,
            };
            let item_cross = match config.align {
                Align::Stretch if items[*index].cross.is_none() => line_cross,
                _ => item_cross,
            };
            boxes[*index] = match config.direction {
                FlexDirection::Row => AbsoluteBox {
                    x: container.x + main_offset,
                    y: container.y + cross_offset + cross_in_line,
                    width: main_size,
                    height: item_cross,
                },
                FlexDirection::Column => AbsoluteBox {
                    x: container.x + cross_offset + cross_in_line,
                    y: container.y + main_offset,
                    width: item_cross,
                    height: main_size,
                },
            };
            main_offset += main_size + config.gap + extra_gap;
        }
        cross_offset += line_cross + config.gap;
    }
    boxes
}

fn hypothetical(item: &FlexItem) -> f64 {
    match item.main {
        MainSize::Fixed(size) => size,
        MainSize::Flex { basis, .. } => basis,
    }
}

fn break_lines(config: &FlexConfig, main_extent: f64, items: &[FlexItem]) -> Vec<Vec<usize>> {
    if config.wrap == Wrap::Nowrap {
        return vec![(0..items.len()).collect()];
    }
    let mut lines = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut used = 0.0;
    for (index, item) in items.iter().enumerate() {
        let size = hypothetical(item);
        let needed = if current.is_empty() { size } else { used + config.gap + size };
        if !current.is_empty() && needed > main_extent {
            lines.push(std::mem::take(&mut current));
            used = size;
        } else {
            used = needed;
        }
        current.push(index);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn resolve_line(config: &FlexConfig, main_extent: f64, items: &[FlexItem], line: &[usize]) -> Vec<f64> {
    let mut sizes: Vec<f64> = line.iter().map(|index| hypothetical(&items[*index])).collect();
    let gaps = config.gap * (line.len() as f64 - 1.0);
    let free = main_extent - sizes.iter().sum::<f64>() - gaps;
    if free > 0.0 {
        let total_grow: f64 = line
            .iter()
            .map(|index| match items[*index].main {
                MainSize::Flex { grow, .. } => grow,
                MainSize::Fixed(_) => 0.0,
            })
            .sum();
        if total_grow > 0.0 {
            for (position, index) in line.iter().enumerate() {
                if let MainSize::Flex { grow, .. } = items[*index].main {
                    sizes[position] += free * grow / total_grow;
                }
            }
        }
    } else if free < 0.0 {
        let total_weight: f64 = line
            .iter()
            .map(|index| match items[*index].main {
                MainSize::Flex { shrink, basis, .. } => shrink * basis,
                MainSize::Fixed(_) => 0.0,
            })
            .sum();
        if total_weight > 0.0 {
            for (position, index) in line.iter().enumerate() {
                if let MainSize::Flex { shrink, basis, .. } = items[*index].main {
                    sizes[position] = (sizes[position] + free * shrink * basis / total_weight).max(0.0);
                }
            }
        }
    }
    sizes
}

fn spacing(justify: Justify, leftover: f64, count: usize) -> (f64, f64) {
    let count = count as f64;
    match justify {
        Justify::Start => (0.0, 0.0),
        Justify::Center => (leftover / 2.0, 0.0),
        Justify::End => (leftover, 0.0),
        Justify::SpaceBetween => {
            if count > 1.0 { (0.0, leftover / (count - 1.0)) } else { (0.0, 0.0) }
        }
        Justify::SpaceAround => {
            let unit = leftover / count;
            (unit / 2.0, unit)
        }
        Justify::SpaceEvenly => {
            let unit = leftover / (count + 1.0);
            (unit, unit)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn container() -> AbsoluteBox {
        AbsoluteBox::new(40.0, 30.0, 600.0, 300.0)
    }

    fn config(direction: FlexDirection, justify: Justify, wrap: Wrap) -> FlexConfig {
        FlexConfig { direction, justify, align: Align::Stretch, wrap, gap: 10.0 }
    }

    #[test]
    fn equal_flex_items_share_the_row() {
        let config = config(FlexDirection::Row, Justify::Start, Wrap::Nowrap);
        let items = vec![FlexItem::flexible(100.0); 3];
        let boxes = arrange(&config, container(), &items);
        // 600 - 2 gaps = 580, split three ways.
        for rect in &boxes {
            assert!((rect.width - 580.0 / 3.0).abs() < 1e-9);
            assert_eq!(rect.height, 300.0);
        }
        assert_eq!(boxes[0].x, 40.0);
        assert!(boxes[1].x > boxes[0].x);
    }

    #[test]
    fn nowrap_overflow_shrinks_proportionally() {
        let config = config(FlexDirection::Row, Justify::Start, Wrap::Nowrap);
        let items = vec![FlexItem::flexible(400.0), FlexItem::flexible(400.0)];
        let boxes = arrange(&config, container(), &items);
        // 800 + gap does not fit in 600; both shrink equally.
        assert!((boxes[0].width - boxes[1].width).abs() < 1e-9);
        let total = boxes[0].width + boxes[1].width + 10.0;
        assert!((total - 600.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_items_do_not_shrink() {
        let config = config(FlexDirection::Row, Justify::Start, Wrap::Nowrap);
        let items = vec![FlexItem::fixed(200.0), FlexItem::flexible(500.0)];
        let boxes = arrange(&config, container(), &items);
        assert_eq!(boxes[0].width, 200.0);
        assert!(boxes[1].width < 500.0);
    }

    #[test]
    fn wrap_breaks_into_lines() {
        let config = config(FlexDirection::Row, Justify::Start, Wrap::Wrap);
        let items = vec![FlexItem::flexible(250.0); 3];
        let boxes = arrange(&config, container(), &items);
        // Two fit per line; the third wraps.
        assert_eq!(boxes[0].y, boxes[1].y);
        assert!(boxes[2].y > boxes[0].y);
        // Two lines share the cross axis.
        assert!((boxes[0].height - 145.0).abs() < 1e-9);
    }

    #[test]
    fn justify_center_offsets_the_lead() {
        let config = config(FlexDirection::Row, Justify::Center, Wrap::Nowrap);
        let items = vec![FlexItem::fixed(100.0), FlexItem::fixed(100.0)];
        let boxes = arrange(&config, container(), &items);
        // leftover = 600 - 210 = 390, lead 195.
        assert_eq!(boxes[0].x, 40.0 + 195.0);
    }

    #[test]
    fn space_between_pushes_items_apart() {
        let config = config(FlexDirection::Row, Justify::SpaceBetween, Wrap::Nowrap);
        let items = vec![FlexItem::fixed(100.0), FlexItem::fixed(100.0)];
        let boxes = arrange(&config, container(), &items);
        assert_eq!(boxes[0].x, 40.0);
        assert!((boxes[1].right() - 640.0).abs() < 1e-9);
    }

    #[test]
    fn column_direction_stacks_vertically() {
        let config = config(FlexDirection::Column, Justify::Start, Wrap::Nowrap);
        let items = vec![FlexItem::flexible(100.0); 2];
        let boxes = arrange(&config, container(), &items);
        assert_eq!(boxes[0].x, boxes[1].x);
        assert!(boxes[1].y > boxes[0].y);
        assert_eq!(boxes[0].width, 600.0);
    }

    #[test]
    fn arrangement_is_idempotent() {
        let config = config(FlexDirection::Row, Justify::SpaceEvenly, Wrap::Wrap);
        let items = vec![FlexItem::flexible(180.0); 5];
        assert_eq!(arrange(&config, container(), &items), arrange(&config, container(), &items));
    }
}
