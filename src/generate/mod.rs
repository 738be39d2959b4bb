//! The orchestrator: consumes a validated deck spec and drives the upstream
//! API slide by slide.

mod elements;

use crate::{
    api::{
        rest::RestTransport, ApiClient, ApiError, CallBudget, CancelToken, ElementOp, SlideHandle,
        SlideTransport,
    },
    chart::ChartBuilder,
    config::Config,
    deck::{
        DeckResult, DeckSpec, DeckWarning, ElementResult, SlideResult, SlideSpec, TextKind,
        ThemeChoice, WarningCode,
    },
    diagram::DiagramRenderer,
    layout::{resolve_layout, LayoutKind, LayoutSpec, PlacedItem, ResolvedLayout},
    theme::{registry::ThemeRegistry, resolve::ResolveContext, Theme, ThemeError},
    validate::{ValidationFailure, ValidationReport, ValidationWarning, Validator},
};
use elements::{build_element, table_cell_style, BuiltElement, ElementContext};
use log::{info, warn};
use serde::Serialize;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const EVENT_CAPACITY: usize = 100;

type TransportFactory =
    Arc<dyn Fn(CallBudget) -> Result<Arc<dyn SlideTransport>, ApiError> + Send + Sync>;

/// Options for one `generate` call.
#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
    /// Overall wall-clock budget; propagates to every upstream call.
    pub deadline: Option<Duration>,

    /// Cooperative cancellation; trip it to stop issuing new calls.
    pub cancel: CancelToken,

    /// Overrides `layout.parallelism_per_slide`.
    pub parallelism: Option<usize>,
}

/// Result of re-styling an existing deck.
#[derive(Clone, Debug, Serialize)]
pub struct AppliedTheme {
    pub slides_touched: usize,
}

/// A point-in-time view of the engine for the health surface.
#[derive(Clone, Debug, Serialize)]
pub struct Health {
    pub status: String,
    pub recent_errors: Vec<String>,
    pub recent_warnings: Vec<String>,
    pub active_theme_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error(transparent)]
    Upstream(#[from] ApiError),

    #[error("deck '{0}' not found")]
    DeckNotFound(String),
}

enum EventLevel {
    Warning,
    Error,
}

struct Event {
    level: EventLevel,
    message: String,
}

/// The deck generation engine.
///
/// Holds the long-lived pieces (theme registry, diagram cache, config); each
/// `generate` call gets its own API client and rate counters.
pub struct DeckGenerator {
    config: Config,
    themes: Arc<ThemeRegistry>,
    renderer: DiagramRenderer,
    charts: ChartBuilder,
    validator: Validator,
    transport: TransportFactory,
    events: Mutex<VecDeque<Event>>,
}

impl DeckGenerator {
    /// An engine talking to the REST upstream from the config.
    pub fn new(config: Config) -> Result<Self, GenerateError> {
        let upstream = config.upstream.clone();
        let factory: TransportFactory = Arc::new(move |budget| {
            RestTransport::new(&upstream, budget).map(|t| Arc::new(t) as Arc<dyn SlideTransport>)
        });
        Self::with_factory(config, factory)
    }

    /// An engine over a caller-provided transport.
    pub fn with_transport(config: Config, transport: Arc<dyn SlideTransport>) -> Result<Self, GenerateError> {
        let factory: TransportFactory = Arc::new(move |_| Ok(transport.clone()));
        Self::with_factory(config, factory)
    }

    fn with_factory(config: Config, transport: TransportFactory) -> Result<Self, GenerateError> {
        let themes = ThemeRegistry::new();
        for directory in &config.theme.builtins {
            let loaded = themes.load_from(directory)?;
            info!("seeded {loaded} themes from {}", directory.display());
        }
        themes.set_active(&config.theme.default_id)?;
        let renderer = DiagramRenderer::new(&config.diagram, config.limits.max_diagram_source_bytes);
        let charts = ChartBuilder::new(config.upstream.supports_charts, config.limits.max_chart_rows);
        let validator = Validator::new(config.limits);
        Ok(Self {
            config,
            themes: Arc::new(themes),
            renderer,
            charts,
            validator,
            transport,
            events: Mutex::new(VecDeque::new()),
        })
    }

    /// The theme registry backing `registerTheme`, `listThemes` and friends.
    pub fn themes(&self) -> &ThemeRegistry {
        &self.themes
    }

    /// The caller-facing validation surface.
    pub fn validate(&self, spec: DeckSpec) -> ValidationReport {
        self.validator.report(spec)
    }

    pub fn health(&self) -> Health {
        let events = self.events.lock().expect("lock poisoned");
        let recent_errors: Vec<String> = events
            .iter()
            .filter(|e| matches!(e.level, EventLevel::Error))
            .map(|e| e.message.clone())
            .collect();
        let recent_warnings: Vec<String> = events
            .iter()
            .filter(|e| matches!(e.level, EventLevel::Warning))
            .map(|e| e.message.clone())
            .collect();
        Health {
            status: if recent_errors.is_empty() { "ok".into() } else { "degraded".into() },
            recent_errors,
            recent_warnings,
            active_theme_id: self.themes.active_id(),
        }
    }

    /// Generates a whole deck. Always returns a `DeckResult`; per-element
    /// failures land in `warnings` and the element's `error` field.
    pub fn generate(&self, spec: DeckSpec, options: GenerateOptions) -> DeckResult {
        let created_at = now_utc();
        let validated = match self.validator.validate_deck(spec) {
            Ok(validated) => validated,
            Err(failure) => {
                self.record(EventLevel::Error, failure.to_string());
                let mut result = DeckResult::failure(failure.to_string(), created_at);
                result.warnings = map_validation_warnings(&failure.warnings);
                return result;
            }
        };
        let mut warnings = map_validation_warnings(&validated.warnings);
        let spec = validated.value;

        let theme = match self.resolve_theme(spec.theme.as_ref()) {
            Ok(theme) => theme,
            Err(error) => {
                self.record(EventLevel::Error, error.to_string());
                return DeckResult::failure(error.to_string(), created_at);
            }
        };

        let budget = CallBudget {
            deadline: options.deadline.map(|d| Instant::now() + d),
            cancel: options.cancel.clone(),
        };
        let client = match self.client(budget.clone()) {
            Ok(client) => client,
            Err(error) => return DeckResult::failure(error.to_string(), created_at),
        };

        let deck = match client.create_deck(&spec.title) {
            Ok(deck) => deck,
            Err(error) => {
                self.record(EventLevel::Error, format!("create_deck: {error}"));
                let mut result = DeckResult::failure(error.to_string(), created_at);
                result.cancelled = matches!(error, ApiError::Cancelled | ApiError::DeadlineExceeded);
                return result;
            }
        };
        info!("created deck {} for '{}'", deck.deck_id, spec.title);

        let distance = spec.options.effective_distance();
        let parallelism = options
            .parallelism
            .unwrap_or(self.config.layout.parallelism_per_slide)
            .max(1);
        let mut slide_results = Vec::new();
        let mut cancelled = false;

        'slides: for (slide_index, slide) in spec.slides.iter().enumerate() {
            if budget.check().is_err() {
                cancelled = true;
                break;
            }
            let layout_spec = slide
                .layout
                .clone()
                .or_else(|| spec.layout.clone())
                .unwrap_or_else(|| self.default_layout());
            let resolved = match resolve_layout(
                &layout_spec,
                self.config.layout.standard_slide,
                slide.custom_areas.as_ref(),
                slide.title.is_some(),
            ) {
                Ok(resolved) => resolved,
                Err(error) => {
                    self.push_warning(
                        &mut warnings,
                        WarningCode::Layout,
                        format!("slide skipped: {error}"),
                        Some(slide_index),
                        None,
                    );
                    continue;
                }
            };
            let plan = resolved.plan(&slide.content);
            let context = ElementContext {
                theme: &theme,
                resolve: ResolveContext {
                    slide: self.config.layout.standard_slide,
                    distance,
                    font_scale: resolved.font_scale,
                    content_len: 0,
                },
                charts: &self.charts,
                renderer: &self.renderer,
            };
            let hint = layout_hint(&layout_spec);

            for (page_index, page) in plan.pages.iter().enumerate() {
                let handle = match client.append_slide(&deck.deck_id, Some(&hint)) {
                    Ok(handle) => handle,
                    Err(ApiError::Cancelled | ApiError::DeadlineExceeded) => {
                        cancelled = true;
                        break 'slides;
                    }
                    Err(error @ ApiError::RateLimited { .. }) => {
                        self.push_warning(
                            &mut warnings,
                            WarningCode::RateLimited,
                            format!("aborting remaining slides: {error}"),
                            Some(slide_index),
                            None,
                        );
                        break 'slides;
                    }
                    Err(error) => {
                        self.push_warning(
                            &mut warnings,
                            upstream_warning(&error),
                            format!("slide skipped: {error}"),
                            Some(slide_index),
                            None,
                        );
                        continue 'slides;
                    }
                };

                let title = if page_index == 0 { slide.title.as_deref() } else { None };
                let elements = self.create_elements(
                    &client,
                    &handle,
                    slide,
                    page,
                    title,
                    &resolved,
                    &context,
                    parallelism,
                    &mut warnings,
                    slide_index,
                );
                slide_results.push(SlideResult {
                    slide_id: handle.slide_id,
                    index: handle.index,
                    elements,
                });
                if budget.check().is_err() {
                    cancelled = true;
                    break 'slides;
                }
            }
        }

        let ok = cancelled || !slide_results.is_empty();
        if !ok {
            self.record(EventLevel::Error, "every slide failed".to_string());
        }
        DeckResult {
            ok,
            deck_id: Some(deck.deck_id),
            url: Some(deck.url),
            slides: slide_results,
            warnings,
            cancelled,
            error: if ok { None } else { Some("every slide failed".into()) },
            created_at,
        }
    }

    /// Appends one slide to an existing deck, styled by the active theme.
    pub fn add_slide(&self, deck_id: &str, spec: SlideSpec) -> Result<SlideHandle, GenerateError> {
        let validated = self.validator.validate_slide(spec)?;
        let slide = validated.value;
        let client = self.client(CallBudget::default())?;
        client.get_deck_info(deck_id).map_err(|e| not_found(deck_id, e))?;

        let theme = self.themes.active();
        let layout_spec = slide.layout.clone().unwrap_or_else(|| self.default_layout());
        let resolved = resolve_layout(
            &layout_spec,
            self.config.layout.standard_slide,
            slide.custom_areas.as_ref(),
            slide.title.is_some(),
        )
        .map_err(|error| ValidationFailure {
            errors: vec![crate::validate::ValidationError {
                field: "layout".into(),
                message: error.to_string(),
            }],
            warnings: Vec::new(),
        })?;
        let plan = resolved.plan(&slide.content);
        let context = ElementContext {
            theme: &theme,
            resolve: ResolveContext {
                slide: self.config.layout.standard_slide,
                distance: Default::default(),
                font_scale: resolved.font_scale,
                content_len: 0,
            },
            charts: &self.charts,
            renderer: &self.renderer,
        };
        let hint = layout_hint(&layout_spec);

        let mut warnings = Vec::new();
        let mut first = None;
        for (page_index, page) in plan.pages.iter().enumerate() {
            let handle = client.append_slide(deck_id, Some(&hint))?;
            let title = if page_index == 0 { slide.title.as_deref() } else { None };
            self.create_elements(
                &client,
                &handle,
                &slide,
                page,
                title,
                &resolved,
                &context,
                self.config.layout.parallelism_per_slide,
                &mut warnings,
                handle.index,
            );
            first.get_or_insert(handle);
        }
        Ok(first.expect("plan produced no pages"))
    }

    /// Re-styles every text element of an existing deck with a theme.
    pub fn apply_theme(&self, deck_id: &str, theme_id: &str) -> Result<AppliedTheme, GenerateError> {
        let theme = self.themes.get(theme_id)?;
        let client = self.client(CallBudget::default())?;
        let info = client.get_deck_info(deck_id).map_err(|e| not_found(deck_id, e))?;

        let style = theme.resolve_style(
            TextKind::Body,
            None,
            &ResolveContext { slide: self.config.layout.standard_slide, ..Default::default() },
        );
        let mut slides_touched = 0;
        for slide in &info.slides {
            let mut touched = false;
            for element in &slide.elements {
                if element.kind != "text" {
                    continue;
                }
                match client.update_text_style(&slide.slide_id, &element.element_id, &style) {
                    Ok(()) => touched = true,
                    Err(error) => {
                        self.record(
                            EventLevel::Warning,
                            format!("restyle {}/{}: {error}", slide.slide_id, element.element_id),
                        );
                    }
                }
            }
            if touched {
                slides_touched += 1;
            }
        }
        Ok(AppliedTheme { slides_touched })
    }

    /// Creates the title and content elements of one upstream slide.
    ///
    /// Uses one batched request when the transport supports it; otherwise a
    /// bounded fan-out of individual inserts, issued in content order.
    #[allow(clippy::too_many_arguments)]
    fn create_elements(
        &self,
        client: &ApiClient,
        handle: &SlideHandle,
        slide: &SlideSpec,
        page: &[PlacedItem],
        title: Option<&str>,
        resolved: &ResolvedLayout,
        context: &ElementContext<'_>,
        parallelism: usize,
        warnings: &mut Vec<DeckWarning>,
        slide_index: usize,
    ) -> Vec<ElementResult> {
        let mut results = Vec::new();

        if let (Some(title), Some(area)) = (title, resolved.title_area) {
            if !title.is_empty() {
                let mut resolve = context.resolve;
                resolve.content_len = title.chars().count();
                let style = context.theme.resolve_style(TextKind::Title, None, &resolve);
                let op = ElementOp::TextBox { text: title.to_string(), rect: area, style };
                results.push(self.insert_one(
                    client,
                    handle,
                    crate::deck::ElementKind::Text,
                    area,
                    Built::Single(op),
                    warnings,
                    slide_index,
                    None,
                    context,
                ));
            }
        }

        if client.supports_batching() {
            results.extend(self.create_batched(client, handle, slide, page, context, warnings, slide_index));
        } else {
            results.extend(self.create_parallel(
                client,
                handle,
                slide,
                page,
                context,
                parallelism,
                warnings,
                slide_index,
            ));
        }
        results
    }

    /// Batch path: build every op up front, submit once, fan table fills out
    /// afterwards.
    fn create_batched(
        &self,
        client: &ApiClient,
        handle: &SlideHandle,
        slide: &SlideSpec,
        page: &[PlacedItem],
        context: &ElementContext<'_>,
        warnings: &mut Vec<DeckWarning>,
        slide_index: usize,
    ) -> Vec<ElementResult> {
        let mut results: Vec<Option<ElementResult>> = vec![None; page.len()];
        let mut batch: Vec<(usize, ElementOp)> = Vec::new();
        let mut tables: Vec<(usize, Built)> = Vec::new();

        for (position, placed) in page.iter().enumerate() {
            let item = &slide.content[placed.index];
            match build_element(item, placed.rect, context) {
                BuiltElement::Op(op) => batch.push((position, op)),
                BuiltElement::Table { rect, headers, rows, style } => {
                    tables.push((position, Built::Table { rect, headers, rows, style }));
                }
                BuiltElement::Skip { code, message } => {
                    self.push_warning(warnings, code, message.clone(), Some(slide_index), Some(placed.index));
                    results[position] = Some(ElementResult {
                        element_id: None,
                        kind: item.element_kind(),
                        resolved_box: placed.rect,
                        error: Some(message),
                    });
                }
            }
        }

        let ops: Vec<ElementOp> = batch.iter().map(|(_, op)| op.clone()).collect();
        for ((position, _), outcome) in batch.iter().zip(client.insert_elements(&handle.slide_id, &ops)) {
            let placed = &page[*position];
            let item = &slide.content[placed.index];
            results[*position] = Some(self.finish_insert(
                item.element_kind(),
                placed.rect,
                outcome,
                warnings,
                slide_index,
                Some(placed.index),
            ));
        }

        for (position, table) in tables {
            let placed = &page[position];
            let item = &slide.content[placed.index];
            results[position] = Some(self.insert_one(
                client,
                handle,
                item.element_kind(),
                placed.rect,
                table,
                warnings,
                slide_index,
                Some(placed.index),
                context,
            ));
        }

        results.into_iter().flatten().collect()
    }

    /// Fan-out path: a bounded pool of workers pulls items in order and
    /// inserts them individually.
    #[allow(clippy::too_many_arguments)]
    fn create_parallel(
        &self,
        client: &ApiClient,
        handle: &SlideHandle,
        slide: &SlideSpec,
        page: &[PlacedItem],
        context: &ElementContext<'_>,
        parallelism: usize,
        warnings: &mut Vec<DeckWarning>,
        slide_index: usize,
    ) -> Vec<ElementResult> {
        let queue: Mutex<VecDeque<usize>> = Mutex::new((0..page.len()).collect());
        let slots: Vec<Mutex<Option<(ElementResult, Option<DeckWarning>)>>> =
            (0..page.len()).map(|_| Mutex::new(None)).collect();

        let workers = parallelism.min(page.len().max(1));
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let position = {
                        let mut queue = queue.lock().expect("lock poisoned");
                        match queue.pop_front() {
                            Some(position) => position,
                            None => break,
                        }
                    };
                    let placed = &page[position];
                    let item = &slide.content[placed.index];
                    let (result, warning) = self.insert_item(client, handle, item, placed, context);
                    *slots[position].lock().expect("lock poisoned") = Some((result, warning));
                });
            }
        });

        let mut results = Vec::with_capacity(page.len());
        for slot in slots {
            let (result, warning) = slot
                .into_inner()
                .expect("lock poisoned")
                .expect("worker left a slot empty");
            if let Some(warning) = warning {
                let mut warning = warning;
                warning.slide_index = Some(slide_index);
                self.record(EventLevel::Warning, warning.message.clone());
                warnings.push(warning);
            }
            results.push(result);
        }
        results
    }

    /// Builds and inserts one item; used by the fan-out workers, so the
    /// warning travels back by value instead of borrowing the shared list.
    fn insert_item(
        &self,
        client: &ApiClient,
        handle: &SlideHandle,
        item: &crate::deck::ContentItem,
        placed: &PlacedItem,
        context: &ElementContext<'_>,
    ) -> (ElementResult, Option<DeckWarning>) {
        let kind = item.element_kind();
        match build_element(item, placed.rect, context) {
            BuiltElement::Skip { code, message } => (
                ElementResult {
                    element_id: None,
                    kind,
                    resolved_box: placed.rect,
                    error: Some(message.clone()),
                },
                Some(DeckWarning { code, message, slide_index: None, item_index: Some(placed.index) }),
            ),
            BuiltElement::Op(op) => {
                let outcome = client.insert_element(&handle.slide_id, &op);
                self.finish_insert_quiet(kind, placed.rect, outcome, placed.index)
            }
            BuiltElement::Table { rect, headers, rows, style } => {
                let outcome = self.insert_table(client, handle, rect, &headers, &rows, style.as_ref(), context);
                self.finish_insert_quiet(kind, placed.rect, outcome, placed.index)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_one(
        &self,
        client: &ApiClient,
        handle: &SlideHandle,
        kind: crate::deck::ElementKind,
        rect: crate::deck::AbsoluteBox,
        built: Built,
        warnings: &mut Vec<DeckWarning>,
        slide_index: usize,
        item_index: Option<usize>,
        context: &ElementContext<'_>,
    ) -> ElementResult {
        let outcome = match built {
            Built::Single(op) => client.insert_element(&handle.slide_id, &op),
            Built::Table { rect, headers, rows, style } => {
                self.insert_table(client, handle, rect, &headers, &rows, style.as_ref(), context)
            }
        };
        self.finish_insert(kind, rect, outcome, warnings, slide_index, item_index)
    }

    /// Inserts the table element, then fills header and data cells.
    fn insert_table(
        &self,
        client: &ApiClient,
        handle: &SlideHandle,
        rect: crate::deck::AbsoluteBox,
        headers: &[String],
        rows: &[Vec<crate::deck::CellValue>],
        _style: Option<&crate::deck::TableStyle>,
        context: &ElementContext<'_>,
    ) -> Result<String, ApiError> {
        let op = ElementOp::Table { rect, rows: rows.len() + 1, cols: headers.len() };
        let table_id = client.insert_element(&handle.slide_id, &op)?;
        for (col, header) in headers.iter().enumerate() {
            let style = table_cell_style(context, true, header.chars().count());
            client.fill_table_cell(&handle.slide_id, &table_id, 0, col, header, &style)?;
        }
        for (row_index, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                let text = cell.display();
                let style = table_cell_style(context, false, text.chars().count());
                client.fill_table_cell(&handle.slide_id, &table_id, row_index + 1, col, &text, &style)?;
            }
        }
        Ok(table_id)
    }

    fn finish_insert(
        &self,
        kind: crate::deck::ElementKind,
        rect: crate::deck::AbsoluteBox,
        outcome: Result<String, ApiError>,
        warnings: &mut Vec<DeckWarning>,
        slide_index: usize,
        item_index: Option<usize>,
    ) -> ElementResult {
        let (result, warning) = self.finish_insert_quiet(kind, rect, outcome, item_index.unwrap_or(0));
        if let Some(mut warning) = warning {
            warning.slide_index = Some(slide_index);
            warning.item_index = item_index;
            self.record(EventLevel::Warning, warning.message.clone());
            warnings.push(warning);
        }
        result
    }

    fn finish_insert_quiet(
        &self,
        kind: crate::deck::ElementKind,
        rect: crate::deck::AbsoluteBox,
        outcome: Result<String, ApiError>,
        item_index: usize,
    ) -> (ElementResult, Option<DeckWarning>) {
        match outcome {
            Ok(element_id) => {
                if self.config.observability.emit_element_events {
                    info!("created {kind} element {element_id}");
                }
                (
                    ElementResult { element_id: Some(element_id), kind, resolved_box: rect, error: None },
                    None,
                )
            }
            Err(error) => {
                warn!("element insert failed: {error}");
                // Cancellation is reported once at the deck level, not per
                // element.
                let warning = if matches!(error, ApiError::Cancelled | ApiError::DeadlineExceeded) {
                    None
                } else {
                    Some(DeckWarning {
                        code: upstream_warning(&error),
                        message: format!("element skipped: {error}"),
                        slide_index: None,
                        item_index: Some(item_index),
                    })
                };
                (
                    ElementResult {
                        element_id: None,
                        kind,
                        resolved_box: rect,
                        error: Some(error.to_string()),
                    },
                    warning,
                )
            }
        }
    }

    fn resolve_theme(&self, choice: Option<&ThemeChoice>) -> Result<Theme, ThemeError> {
        match choice {
            None => Ok(self.themes.active()),
            Some(ThemeChoice::Id(id)) => self.themes.get(id),
            Some(ThemeChoice::Override(patch)) => {
                let theme = self.themes.active().apply_patch(patch)?;
                theme.validate()?;
                Ok(theme)
            }
        }
    }

    fn client(&self, budget: CallBudget) -> Result<ApiClient, ApiError> {
        let transport = (self.transport)(budget.clone())?;
        Ok(ApiClient::new(transport, &self.config.upstream, budget))
    }

    fn default_layout(&self) -> LayoutSpec {
        LayoutSpec {
            kind: LayoutKind::Template { name: self.config.layout.default_template.clone() },
            responsive: false,
            breakpoint: None,
        }
    }

    fn push_warning(
        &self,
        warnings: &mut Vec<DeckWarning>,
        code: WarningCode,
        message: String,
        slide_index: Option<usize>,
        item_index: Option<usize>,
    ) {
        self.record(EventLevel::Warning, message.clone());
        warnings.push(DeckWarning { code, message, slide_index, item_index });
    }

    fn record(&self, level: EventLevel, message: String) {
        let mut events = self.events.lock().expect("lock poisoned");
        if events.len() == EVENT_CAPACITY {
            events.pop_front();
        }
        events.push_back(Event { level, message });
    }
}

enum Built {
    Single(ElementOp),
    Table {
        rect: crate::deck::AbsoluteBox,
        headers: Vec<String>,
        rows: Vec<Vec<crate::deck::CellValue>>,
        style: Option<crate::deck::TableStyle>,
    },
}

fn upstream_warning(error: &ApiError) -> WarningCode {
    match error {
        ApiError::RateLimited { .. } => WarningCode::RateLimited,
        ApiError::Transient { .. } => WarningCode::UpstreamTransient,
        _ => WarningCode::UpstreamPermanent,
    }
}

fn not_found(deck_id: &str, error: ApiError) -> GenerateError {
    match &error {
        ApiError::Permanent { status: Some(404), .. } => GenerateError::DeckNotFound(deck_id.into()),
        _ => GenerateError::Upstream(error),
    }
}

fn layout_hint(spec: &LayoutSpec) -> String {
    match &spec.kind {
        LayoutKind::SingleColumn => "single-column".into(),
        LayoutKind::DoubleColumn => "double-column".into(),
        LayoutKind::ThreeColumn => "three-column".into(),
        LayoutKind::TitleContent => "title-content".into(),
        LayoutKind::CustomGrid { .. } => "custom-grid".into(),
        LayoutKind::Flex { .. } => "flex".into(),
        LayoutKind::Template { name } => name.clone(),
    }
}

fn map_validation_warnings(warnings: &[ValidationWarning]) -> Vec<DeckWarning> {
    warnings
        .iter()
        .map(|warning| DeckWarning {
            code: warning.code,
            message: format!("{}: {}", warning.field, warning.message),
            slide_index: None,
            item_index: None,
        })
        .collect()
}

fn now_utc() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        api::testing::MockTransport,
        deck::{CellValue, ChartItem, ContentItem, TableItem, TextItem},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn generator(transport: Arc<MockTransport>) -> DeckGenerator {
        DeckGenerator::with_transport(Config::default(), transport).expect("construction failed")
    }

    fn text(kind: &str, content: &str) -> ContentItem {
        let item = TextItem { content: content.into(), style: None, position: None };
        match kind {
            "title" => ContentItem::Title(item),
            "heading" => ContentItem::Heading(item),
            _ => ContentItem::Body(item),
        }
    }

    fn deck(slides: Vec<SlideSpec>) -> DeckSpec {
        DeckSpec { title: "Hello".into(), slides, theme: None, layout: None, options: Default::default() }
    }

    fn slide(content: Vec<ContentItem>) -> SlideSpec {
        SlideSpec { title: None, layout: None, content, custom_areas: None }
    }

    #[test]
    fn minimal_deck_produces_one_slide() {
        let transport = Arc::new(MockTransport::default());
        let generator = generator(transport.clone());
        let result = generator.generate(
            deck(vec![slide(vec![text("title", "Hello World")])]),
            GenerateOptions::default(),
        );
        assert!(result.ok, "{:?}", result.error);
        assert_eq!(result.slides.len(), 1);
        assert_eq!(result.slides[0].elements.len(), 1);
        assert!(result.slides[0].elements[0].element_id.is_some());

        // The title resolved at or above its accessibility floor, in the
        // active theme's text color.
        let state = transport.state.lock().unwrap();
        let ElementOp::TextBox { style, .. } = &state.ops[0] else { panic!("not a text box") };
        assert!(style.font_size >= 28);
        let theme = crate::theme::registry::builtin_themes().into_iter().next().unwrap();
        assert_eq!(style.color, theme.palette.text);
    }

    #[test]
    fn empty_slide_is_created_without_elements() {
        let generator = generator(Arc::new(MockTransport::default()));
        let result = generator.generate(deck(vec![slide(vec![])]), GenerateOptions::default());
        assert!(result.ok);
        assert_eq!(result.slides.len(), 1);
        assert!(result.slides[0].elements.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn unknown_chart_type_skips_the_element_only() {
        let generator = generator(Arc::new(MockTransport::default()));
        let chart = ContentItem::Chart(ChartItem {
            chart_type: "hologram".into(),
            data: vec![
                vec![CellValue::Text("a".into()), CellValue::Text("b".into())],
                vec![CellValue::Number(1.0), CellValue::Number(2.0)],
            ],
            options: None,
            position: None,
        });
        let result = generator.generate(
            deck(vec![slide(vec![text("body", "ok"), chart])]),
            GenerateOptions::default(),
        );
        assert!(result.ok);
        assert_eq!(result.slides.len(), 1);
        let elements = &result.slides[0].elements;
        assert_eq!(elements.len(), 2);
        assert!(elements[0].error.is_none());
        assert!(elements[1].error.is_some());
        assert!(result.warnings.iter().any(|w| w.code == WarningCode::ChartType));
    }

    #[test]
    fn validation_failure_has_no_side_effects() {
        let transport = Arc::new(MockTransport::default());
        let generator = generator(transport.clone());
        let mut spec = deck(vec![slide(vec![])]);
        spec.title = String::new();
        let result = generator.generate(spec, GenerateOptions::default());
        assert!(!result.ok);
        assert!(result.deck_id.is_none());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn create_deck_failure_is_fatal() {
        let transport = Arc::new(MockTransport::failing(
            "create_deck",
            vec![ApiError::Permanent { status: Some(400), message: "no".into() }],
        ));
        let generator = generator(transport);
        let result =
            generator.generate(deck(vec![slide(vec![])]), GenerateOptions::default());
        assert!(!result.ok);
        assert!(result.deck_id.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn failed_slide_is_skipped_and_the_next_continues() {
        let transport = Arc::new(MockTransport::failing(
            "append_slide",
            vec![ApiError::Permanent { status: Some(400), message: "bad layout".into() }],
        ));
        let generator = generator(transport);
        let result = generator.generate(
            deck(vec![slide(vec![text("body", "one")]), slide(vec![text("body", "two")])]),
            GenerateOptions::default(),
        );
        assert!(result.ok);
        assert_eq!(result.slides.len(), 1);
        assert!(result.warnings.iter().any(|w| w.code == WarningCode::UpstreamPermanent));
    }

    #[test]
    fn tables_create_cells_for_headers_and_rows() {
        let transport = Arc::new(MockTransport::default());
        let generator = generator(transport.clone());
        let table = ContentItem::Table(TableItem {
            headers: vec!["a".into(), "b".into()],
            rows: vec![
                vec![CellValue::Number(1.0), CellValue::Number(2.0)],
                vec![CellValue::Text("x".into()), CellValue::Null],
            ],
            style: None,
            position: None,
        });
        let result =
            generator.generate(deck(vec![slide(vec![table])]), GenerateOptions::default());
        assert!(result.ok);
        // 2 headers + 4 data cells.
        assert_eq!(transport.call_count("fill_table_cell"), 6);
    }

    #[test]
    fn cancellation_returns_a_partial_result() {
        struct CancelAfter {
            inner: MockTransport,
            cancel: CancelToken,
            after: usize,
            appends: AtomicUsize,
        }

        impl SlideTransport for CancelAfter {
            fn create_deck(&self, title: &str) -> Result<crate::api::DeckHandle, ApiError> {
                self.inner.create_deck(title)
            }

            fn append_slide(
                &self,
                deck_id: &str,
                hint: Option<&str>,
            ) -> Result<SlideHandle, ApiError> {
                let handle = self.inner.append_slide(deck_id, hint)?;
                if self.appends.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
                    self.cancel.cancel();
                }
                Ok(handle)
            }

            fn insert_element(&self, slide_id: &str, op: &ElementOp) -> Result<String, ApiError> {
                self.inner.insert_element(slide_id, op)
            }

            fn fill_table_cell(
                &self,
                slide_id: &str,
                table_id: &str,
                row: usize,
                col: usize,
                text: &str,
                style: &crate::theme::resolve::ResolvedTextStyle,
            ) -> Result<(), ApiError> {
                self.inner.fill_table_cell(slide_id, table_id, row, col, text, style)
            }

            fn update_text_style(
                &self,
                slide_id: &str,
                element_id: &str,
                style: &crate::theme::resolve::ResolvedTextStyle,
            ) -> Result<(), ApiError> {
                self.inner.update_text_style(slide_id, element_id, style)
            }

            fn set_title(&self, deck_id: &str, title: &str) -> Result<(), ApiError> {
                self.inner.set_title(deck_id, title)
            }

            fn get_deck_info(&self, deck_id: &str) -> Result<crate::api::DeckInfo, ApiError> {
                self.inner.get_deck_info(deck_id)
            }
        }

        let cancel = CancelToken::new();
        let transport = Arc::new(CancelAfter {
            inner: MockTransport::default(),
            cancel: cancel.clone(),
            after: 4,
            appends: AtomicUsize::new(0),
        });
        let generator =
            DeckGenerator::with_transport(Config::default(), transport).expect("construction failed");
        let slides = (0..10).map(|_| slide(vec![])).collect();
        let result = generator.generate(
            deck(slides),
            GenerateOptions { cancel, ..Default::default() },
        );
        assert!(result.cancelled);
        assert_eq!(result.slides.len(), 4);
        // No slide 5 ids in the result.
        assert!(result.slides.iter().all(|s| s.index < 4));
    }

    #[test]
    fn rate_limit_exhaustion_aborts_remaining_slides() {
        let errors = (0..6)
            .map(|_| ApiError::RateLimited {
                message: "429".into(),
                retry_after: Some(Duration::from_millis(1)),
            })
            .collect();
        let transport = Arc::new(MockTransport::failing("append_slide", errors));
        let generator = generator(transport);
        let result = generator.generate(
            deck(vec![slide(vec![]), slide(vec![]), slide(vec![])]),
            GenerateOptions::default(),
        );
        assert!(result.warnings.iter().any(|w| w.code == WarningCode::RateLimited));
        // The first slide exhausted its retries and aborted the rest.
        assert!(result.slides.is_empty());
        assert!(!result.ok);
    }

    #[test]
    fn theme_override_with_bad_contrast_fails_up_front() {
        let transport = Arc::new(MockTransport::default());
        let generator = generator(transport.clone());
        let patch: crate::theme::ThemePatch = serde_json::from_str(
            r##"{"palette": {"text": "#888888", "background": "#ffffff"}}"##,
        )
        .unwrap();
        let mut spec = deck(vec![slide(vec![])]);
        spec.theme = Some(ThemeChoice::Override(patch));
        let result = generator.generate(spec, GenerateOptions::default());
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("contrast"));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn add_slide_to_missing_deck_errors() {
        let transport = Arc::new(MockTransport::failing(
            "get_deck_info",
            vec![ApiError::Permanent { status: Some(404), message: "gone".into() }],
        ));
        let generator = generator(transport);
        let error = generator
            .add_slide("deck-404", slide(vec![text("body", "late addition")]))
            .expect_err("add succeeded");
        assert!(matches!(error, GenerateError::DeckNotFound(id) if id == "deck-404"));
    }

    #[test]
    fn add_slide_appends_and_returns_the_handle() {
        let transport = Arc::new(MockTransport::default());
        let generator = generator(transport.clone());
        let handle = generator
            .add_slide("deck-1", slide(vec![text("body", "late addition")]))
            .expect("add failed");
        assert_eq!(handle.index, 0);
        assert_eq!(transport.call_count("append_slide"), 1);
        assert_eq!(transport.call_count("insert_element"), 1);
    }

    #[test]
    fn apply_theme_touches_text_elements() {
        let transport = Arc::new(MockTransport::default());
        let generator = generator(transport.clone());
        // Seed the mock with a deck of two slides and an element.
        generator.generate(
            deck(vec![slide(vec![text("body", "a")]), slide(vec![text("body", "b")])]),
            GenerateOptions::default(),
        );
        let applied = generator.apply_theme("deck-1", "midnight").expect("apply failed");
        assert_eq!(applied.slides_touched, 2);
    }

    #[test]
    fn apply_theme_with_unknown_theme_errors() {
        let generator = generator(Arc::new(MockTransport::default()));
        let error = generator.apply_theme("deck-1", "nonexistent").expect_err("apply succeeded");
        assert!(matches!(error, GenerateError::Theme(ThemeError::NotFound(_))));
    }

    #[test]
    fn health_reflects_recent_warnings() {
        let transport = Arc::new(MockTransport::failing(
            "append_slide",
            vec![ApiError::Permanent { status: Some(400), message: "bad".into() }],
        ));
        let warned = generator(transport);
        warned.generate(deck(vec![slide(vec![])]), GenerateOptions::default());
        let health = warned.health();
        // A skipped slide is a warning, not an error, so the engine stays ok.
        assert_eq!(health.status, "ok");
        assert!(!health.recent_warnings.is_empty());
        assert_eq!(health.active_theme_id, "default");

        // A fully failed generation records an error and degrades the status.
        let failing = generator(Arc::new(MockTransport::failing(
            "create_deck",
            vec![ApiError::Permanent { status: Some(500), message: "down".into() }],
        )));
        failing.generate(deck(vec![slide(vec![])]), GenerateOptions::default());
        assert_eq!(failing.health().status, "degraded");
    }

    #[test]
    fn long_slides_overflow_onto_continuation_slides() {
        let transport = Arc::new(MockTransport::default());
        let generator = generator(transport.clone());
        let items: Vec<ContentItem> = (0..8).map(|i| text("body", &format!("item {i}"))).collect();
        let result = generator.generate(deck(vec![slide(items)]), GenerateOptions::default());
        assert!(result.ok);
        assert!(result.slides.len() > 1, "expected overflow to create extra slides");
        let total: usize = result.slides.iter().map(|s| s.elements.len()).sum();
        assert_eq!(total, 8);
    }
}
