//! Assignment of ordered content items to concrete boxes.

use super::{
    breakpoints::Breakpoint,
    flex::{self, FlexConfig, FlexDirection, FlexItem},
    grid::Grid,
};
use crate::deck::{AbsoluteBox, ContentItem};

/// The smallest vertical slot an item is given inside a stacked area, in
/// points. Bounds how many items fit before overflow starts a new slide.
const MIN_SLOT_HEIGHT: f64 = 96.0;

/// A layout resolved against one slide's dimensions.
#[derive(Clone, Debug)]
pub struct ResolvedLayout {
    pub grid: Grid,
    pub breakpoint: Breakpoint,
    /// Factor applied to the font baseline when styles resolve.
    pub font_scale: f64,
    /// Where the slide title goes, when the layout reserves room for one.
    pub title_area: Option<AbsoluteBox>,
    pub arrangement: Arrangement,
}

/// How content items are placed.
#[derive(Clone, Debug)]
pub enum Arrangement {
    /// Ordered named areas; each is a vertical stack of item slots.
    Areas(Vec<ContentArea>),
    /// One flex container covering the content region.
    Flex { config: FlexConfig, region: AbsoluteBox },
}

#[derive(Clone, Debug)]
pub struct ContentArea {
    pub name: String,
    pub rect: AbsoluteBox,
}

impl ContentArea {
    /// How many stacked items this area takes before overflowing.
    fn capacity(&self, gutter: f64) -> usize {
        let slots = ((self.rect.height + gutter) / (MIN_SLOT_HEIGHT + gutter)).floor() as usize;
        slots.max(1)
    }
}

/// One item's page and box.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedItem {
    /// Index into the original content slice.
    pub index: usize,
    pub rect: AbsoluteBox,
}

/// Boxes for every item, split into pages. Page 0 is the slide itself;
/// later pages are continuation slides with the same layout.
#[derive(Clone, Debug, Default)]
pub struct PlacementPlan {
    pub pages: Vec<Vec<PlacedItem>>,
}

impl ResolvedLayout {
    /// Assigns a box to every content item, in order.
    ///
    /// Caller-pinned positions are authoritative and consume no slot. When
    /// the items exceed the areas' capacity, the overflow continues on a new
    /// page with the same layout.
    pub fn plan(&self, items: &[ContentItem]) -> PlacementPlan {
        match &self.arrangement {
            Arrangement::Areas(areas) => self.plan_areas(areas, items),
            Arrangement::Flex { config, region } => plan_flex(config, *region, items),
        }
    }

    fn plan_areas(&self, areas: &[ContentArea], items: &[ContentItem]) -> PlacementPlan {
        let gutter = self.grid.gutter;
        let page_capacity: usize = areas.iter().map(|area| area.capacity(gutter)).sum();

        // First pass: decide page and area for every item.
        let mut pages: Vec<Vec<Placement>> = vec![Vec::new()];
        let mut flowed_on_page = 0;
        for (index, item) in items.iter().enumerate() {
            if let Some(rect) = item.position() {
                pages.last_mut().expect("no page").push(Placement::Pinned { index, rect: *rect });
                continue;
            }
            if flowed_on_page == page_capacity {
                pages.push(Vec::new());
                flowed_on_page = 0;
            }
            let area = area_for_slot(areas, gutter, flowed_on_page);
            pages.last_mut().expect("no page").push(Placement::Flowed { index, area });
            flowed_on_page += 1;
        }

        // Second pass: per page, stack each area's items evenly.
        let mut plan = PlacementPlan::default();
        for page in pages {
            let mut area_counts = vec![0usize; areas.len()];
            for placement in &page {
                if let Placement::Flowed { area, .. } = placement {
                    area_counts[*area] += 1;
                }
            }
            let mut area_used = vec![0usize; areas.len()];
            let mut placed = Vec::with_capacity(page.len());
            for placement in page {
                match placement {
                    Placement::Pinned { index, rect } => placed.push(PlacedItem { index, rect }),
                    Placement::Flowed { index, area } => {
                        let rect = slot_box(
                            &areas[area].rect,
                            gutter,
                            area_used[area],
                            area_counts[area],
                        );
                        area_used[area] += 1;
                        placed.push(PlacedItem { index, rect });
                    }
                }
            }
            plan.pages.push(placed);
        }
        plan
    }
}

enum Placement {
    Pinned { index: usize, rect: AbsoluteBox },
    Flowed { index: usize, area: usize },
}

/// Which area the n-th flowed item of a page lands in.
fn area_for_slot(areas: &[ContentArea], gutter: f64, slot: usize) -> usize {
    let mut remaining = slot;
    for (index, area) in areas.iter().enumerate() {
        let capacity = area.capacity(gutter);
        if remaining < capacity {
            return index;
        }
        remaining -= capacity;
    }
    areas.len() - 1
}

/// The n-th of `count` stacked slots within an area.
fn slot_box(area: &AbsoluteBox, gutter: f64, slot: usize, count: usize) -> AbsoluteBox {
    let count = count.max(1) as f64;
    let height = (area.height - gutter * (count - 1.0)) / count;
    AbsoluteBox {
        x: area.x,
        y: area.y + slot as f64 * (height + gutter),
        width: area.width,
        height,
    }
}

fn plan_flex(config: &FlexConfig, region: AbsoluteBox, items: &[ContentItem]) -> PlacementPlan {
    let flowed: Vec<usize> =
        (0..items.len()).filter(|index| items[*index].position().is_none()).collect();
    let main_extent = match config.direction {
        FlexDirection::Row => region.width,
        FlexDirection::Column => region.height,
    };
    let basis = if flowed.is_empty() {
        0.0
    } else {
        (main_extent - config.gap * (flowed.len() as f64 - 1.0)) / flowed.len() as f64
    };
    let flex_items: Vec<FlexItem> = flowed.iter().map(|_| FlexItem::flexible(basis)).collect();
    let boxes = flex::arrange(config, region, &flex_items);

    let mut placed = Vec::with_capacity(items.len());
    let mut flowed_boxes = boxes.into_iter();
    for (index, item) in items.iter().enumerate() {
        let rect = match item.position() {
            Some(rect) => *rect,
            None => flowed_boxes.next().expect("flex arrangement lost an item"),
        };
        placed.push(PlacedItem { index, rect });
    }
    PlacementPlan { pages: vec![placed] }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        deck::{ContentItem, TextItem},
        design::metrics::{SlideDimensions, STANDARD_SLIDE},
        layout::{resolve_layout, LayoutKind, LayoutSpec},
    };

    fn text_item() -> ContentItem {
        ContentItem::Body(TextItem { content: "hello".into(), style: None, position: None })
    }

    fn pinned_item(x: f64, y: f64) -> ContentItem {
        ContentItem::Body(TextItem {
            content: "pinned".into(),
            style: None,
            position: Some(AbsoluteBox::new(x, y, 100.0, 50.0)),
        })
    }

    fn single_column() -> ResolvedLayout {
        resolve_layout(&LayoutSpec::default(), STANDARD_SLIDE, None, true).unwrap()
    }

    #[test]
    fn items_stack_within_the_content_area() {
        let layout = single_column();
        let items = vec![text_item(), text_item(), text_item()];
        let plan = layout.plan(&items);
        assert_eq!(plan.pages.len(), 1);
        let page = &plan.pages[0];
        assert_eq!(page.len(), 3);
        assert!(page[0].rect.y < page[1].rect.y);
        assert!(page[1].rect.y < page[2].rect.y);
        // All share the column's x and width.
        assert!(page.iter().all(|p| p.rect.x == page[0].rect.x));
    }

    #[test]
    fn pinned_positions_are_authoritative() {
        let layout = single_column();
        let items = vec![text_item(), pinned_item(500.0, 400.0), text_item()];
        let plan = layout.plan(&items);
        let page = &plan.pages[0];
        assert_eq!(page[1].rect, AbsoluteBox::new(500.0, 400.0, 100.0, 50.0));
        // The pinned item consumed no slot: flowed items split the area in two.
        assert_eq!(page[0].rect.width, page[2].rect.width);
    }

    #[test]
    fn overflow_starts_a_new_page() {
        let layout = single_column();
        let capacity = match &layout.arrangement {
            Arrangement::Areas(areas) => areas[0].capacity(layout.grid.gutter),
            _ => unreachable!(),
        };
        let items: Vec<_> = (0..capacity + 2).map(|_| text_item()).collect();
        let plan = layout.plan(&items);
        assert_eq!(plan.pages.len(), 2);
        assert_eq!(plan.pages[0].len(), capacity);
        assert_eq!(plan.pages[1].len(), 2);
        // Continuation pages keep item order.
        assert_eq!(plan.pages[1][0].index, capacity);
    }

    #[test]
    fn double_column_fills_left_then_right() {
        let spec = LayoutSpec { kind: LayoutKind::DoubleColumn, responsive: false, breakpoint: None };
        let layout = resolve_layout(&spec, STANDARD_SLIDE, None, true).unwrap();
        let (left_capacity, right_x) = match &layout.arrangement {
            Arrangement::Areas(areas) => (areas[0].capacity(layout.grid.gutter), areas[1].rect.x),
            _ => unreachable!(),
        };
        let items: Vec<_> = (0..left_capacity + 1).map(|_| text_item()).collect();
        let plan = layout.plan(&items);
        let page = &plan.pages[0];
        assert_eq!(page.last().unwrap().rect.x, right_x);
    }

    #[test]
    fn narrow_responsive_slide_aligns_to_left_margin() {
        let spec = LayoutSpec { kind: LayoutKind::DoubleColumn, responsive: true, breakpoint: None };
        let slide = SlideDimensions { width: 400.0, height: 540.0 };
        let layout = resolve_layout(&spec, slide, None, false).unwrap();
        let items = vec![text_item(), text_item(), text_item()];
        let plan = layout.plan(&items);
        let left_edge = crate::design::metrics::round_half_even(layout.grid.margins.left);
        for placed in &plan.pages[0] {
            assert_eq!(placed.rect.x, left_edge);
        }
    }

    #[test]
    fn flex_spreads_items_over_the_region() {
        let spec = LayoutSpec {
            kind: LayoutKind::Flex {
                direction: Default::default(),
                justify: Default::default(),
                align: Default::default(),
                wrap: Default::default(),
            },
            responsive: false,
            breakpoint: None,
        };
        let layout = resolve_layout(&spec, STANDARD_SLIDE, None, false).unwrap();
        let items = vec![text_item(), text_item(), text_item(), text_item()];
        let plan = layout.plan(&items);
        assert_eq!(plan.pages.len(), 1);
        let page = &plan.pages[0];
        assert_eq!(page.len(), 4);
        let mut x = -1.0;
        for placed in page {
            assert!(placed.rect.x > x);
            x = placed.rect.x;
        }
    }

    #[test]
    fn planning_is_idempotent() {
        let layout = single_column();
        let items = vec![text_item(), pinned_item(10.0, 10.0), text_item(), text_item()];
        let first = layout.plan(&items);
        let second = layout.plan(&items);
        assert_eq!(first.pages.len(), second.pages.len());
        for (a, b) in first.pages.iter().zip(&second.pages) {
            assert_eq!(a, b);
        }
    }
}
