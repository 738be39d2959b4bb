//! The upstream presentation API: transport trait, error taxonomy and the
//! retry/rate-aware client the orchestrator talks to.

pub mod rate;
pub mod rest;
pub mod retry;

use crate::{
    config::UpstreamConfig,
    deck::{AbsoluteBox, ShapeKind},
    design::color::Color,
    theme::resolve::ResolvedTextStyle,
};
use log::{debug, warn};
use rate::RateTracker;
use retry::{RetryPolicy, Sleeper, ThreadSleeper};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

/// A created deck.
#[derive(Clone, Debug)]
pub struct DeckHandle {
    pub deck_id: String,
    pub url: String,
}

/// A created slide.
#[derive(Clone, Debug)]
pub struct SlideHandle {
    pub slide_id: String,
    pub index: usize,
}

/// What the upstream knows about an existing deck.
#[derive(Clone, Debug)]
pub struct DeckInfo {
    pub deck_id: String,
    pub title: String,
    pub url: String,
    pub slides: Vec<SlideInfo>,
}

#[derive(Clone, Debug)]
pub struct SlideInfo {
    pub slide_id: String,
    pub index: usize,
    pub elements: Vec<ElementInfo>,
}

#[derive(Clone, Debug)]
pub struct ElementInfo {
    pub element_id: String,
    pub kind: String,
}

/// One element-level mutation on a slide.
#[derive(Clone, Debug)]
pub enum ElementOp {
    TextBox { text: String, rect: AbsoluteBox, style: ResolvedTextStyle },
    Image { url: String, rect: AbsoluteBox },
    Shape { shape: ShapeKind, rect: AbsoluteBox, fill: Option<Color> },
    Table { rect: AbsoluteBox, rows: usize, cols: usize },
    Chart { spec: serde_json::Value, rect: AbsoluteBox },
}

/// An error from the upstream API, already classified for retry purposes.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transient upstream failure: {message}")]
    Transient { message: String },

    #[error("rate limited: {message}")]
    RateLimited { message: String, retry_after: Option<Duration> },

    #[error("upstream rejected the request: {message}")]
    Permanent { status: Option<u16>, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ApiError {
    /// Classifies an HTTP status plus body message.
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        let lowered = message.to_ascii_lowercase();
        match status {
            429 => Self::RateLimited { message, retry_after },
            401 | 403 => Self::Auth(message),
            _ if status >= 500 => Self::Transient { message },
            _ if lowered.contains("rate limit") || lowered.contains("quota exceeded") => {
                Self::Transient { message }
            }
            _ => Self::Permanent { status: Some(status), message },
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }
}

/// Raw upstream operations. The REST implementation and the test mocks both
/// live behind this seam; retry, rate limiting and batching sit on top.
pub trait SlideTransport: Send + Sync {
    fn create_deck(&self, title: &str) -> Result<DeckHandle, ApiError>;

    fn append_slide(&self, deck_id: &str, layout_hint: Option<&str>) -> Result<SlideHandle, ApiError>;

    fn insert_element(&self, slide_id: &str, op: &ElementOp) -> Result<String, ApiError>;

    /// Inserts several elements in one request. Only called when
    /// [`SlideTransport::supports_batching`] says so.
    fn insert_batch(&self, slide_id: &str, ops: &[ElementOp]) -> Result<Vec<Result<String, ApiError>>, ApiError> {
        Ok(ops.iter().map(|op| self.insert_element(slide_id, op)).collect())
    }

    fn fill_table_cell(
        &self,
        slide_id: &str,
        table_id: &str,
        row: usize,
        col: usize,
        text: &str,
        style: &ResolvedTextStyle,
    ) -> Result<(), ApiError>;

    fn update_text_style(
        &self,
        slide_id: &str,
        element_id: &str,
        style: &ResolvedTextStyle,
    ) -> Result<(), ApiError>;

    fn set_title(&self, deck_id: &str, title: &str) -> Result<(), ApiError>;

    fn get_deck_info(&self, deck_id: &str) -> Result<DeckInfo, ApiError>;

    /// Re-establishes credentials after an auth failure. The default has
    /// nothing to refresh.
    fn refresh_auth(&self) -> Result<(), ApiError> {
        Ok(())
    }

    fn supports_batching(&self) -> bool {
        false
    }
}

/// Cooperative cancellation flag shared between a caller and an in-flight
/// generation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The time and cancellation budget of one generation call.
#[derive(Clone, Debug, Default)]
pub struct CallBudget {
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
}

/// Per-call timeouts never drop below this, even with little budget left.
const MIN_CALL_TIMEOUT: Duration = Duration::from_secs(2);

impl CallBudget {
    /// Remaining budget as a per-call timeout, floored at two seconds.
    pub fn per_call_timeout(&self, default: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                remaining.max(MIN_CALL_TIMEOUT).min(default.max(MIN_CALL_TIMEOUT))
            }
            None => default,
        }
    }

    pub fn check(&self) -> Result<(), ApiError> {
        if self.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ApiError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

/// The client the orchestrator drives: one per `generate` call, owning its
/// own rate counters.
pub struct ApiClient {
    transport: Arc<dyn SlideTransport>,
    retry: RetryPolicy,
    rate: Mutex<RateTracker>,
    budget: CallBudget,
    max_batch_size: usize,
    sleeper: Box<dyn Sleeper>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn SlideTransport>, config: &UpstreamConfig, budget: CallBudget) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            rate: Mutex::new(RateTracker::new(config.per_minute_limit, config.per_day_limit)),
            budget,
            max_batch_size: config.max_batch_size.max(1),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    pub fn supports_batching(&self) -> bool {
        self.transport.supports_batching()
    }

    pub fn create_deck(&self, title: &str) -> Result<DeckHandle, ApiError> {
        self.execute("create_deck", || self.transport.create_deck(title))
    }

    pub fn append_slide(&self, deck_id: &str, layout_hint: Option<&str>) -> Result<SlideHandle, ApiError> {
        self.execute("append_slide", || self.transport.append_slide(deck_id, layout_hint))
    }

    pub fn insert_element(&self, slide_id: &str, op: &ElementOp) -> Result<String, ApiError> {
        self.execute("insert_element", || self.transport.insert_element(slide_id, op))
    }

    /// Inserts a run of elements, batching when the transport supports it.
    /// One failing element never fails its siblings.
    pub fn insert_elements(&self, slide_id: &str, ops: &[ElementOp]) -> Vec<Result<String, ApiError>> {
        if !self.transport.supports_batching() {
            return ops.iter().map(|op| self.insert_element(slide_id, op)).collect();
        }
        let mut results = Vec::with_capacity(ops.len());
        for chunk in ops.chunks(self.max_batch_size) {
            match self.execute("insert_batch", || self.transport.insert_batch(slide_id, chunk)) {
                Ok(chunk_results) => results.extend(chunk_results),
                Err(error) => {
                    warn!("batch insert failed, falling back per element: {error}");
                    results.extend(chunk.iter().map(|op| self.insert_element(slide_id, op)));
                }
            }
        }
        results
    }

    pub fn fill_table_cell(
        &self,
        slide_id: &str,
        table_id: &str,
        row: usize,
        col: usize,
        text: &str,
        style: &ResolvedTextStyle,
    ) -> Result<(), ApiError> {
        self.execute("fill_table_cell", || {
            self.transport.fill_table_cell(slide_id, table_id, row, col, text, style)
        })
    }

    pub fn update_text_style(
        &self,
        slide_id: &str,
        element_id: &str,
        style: &ResolvedTextStyle,
    ) -> Result<(), ApiError> {
        self.execute("update_text_style", || {
            self.transport.update_text_style(slide_id, element_id, style)
        })
    }

    pub fn set_title(&self, deck_id: &str, title: &str) -> Result<(), ApiError> {
        self.execute("set_title", || self.transport.set_title(deck_id, title))
    }

    pub fn get_deck_info(&self, deck_id: &str) -> Result<DeckInfo, ApiError> {
        self.execute("get_deck_info", || self.transport.get_deck_info(deck_id))
    }

    /// Runs one logical operation with rate guarding, retry/backoff and a
    /// single re-auth attempt.
    fn execute<T>(&self, operation: &str, call: impl Fn() -> Result<T, ApiError>) -> Result<T, ApiError> {
        let mut attempt = 0;
        let mut reauthed = false;
        loop {
            self.budget.check()?;
            if let Some(pause) = self.rate.lock().expect("lock poisoned").before_call(Instant::now()) {
                debug!("{operation}: pausing {pause:?} to stay under the rate limit");
                self.sleeper.sleep(pause);
                self.budget.check()?;
            }
            let result = call();
            self.rate.lock().expect("lock poisoned").record(Instant::now());
            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            match &error {
                ApiError::Auth(_) if !reauthed => {
                    warn!("{operation}: auth failed, re-authenticating once");
                    self.transport.refresh_auth()?;
                    reauthed = true;
                }
                _ if error.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = match &error {
                        ApiError::RateLimited { retry_after: Some(hint), .. } => *hint,
                        _ => self.retry.delay(attempt),
                    };
                    warn!("{operation}: attempt {} failed ({error}), retrying in {delay:?}", attempt + 1);
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                _ => return Err(error),
            }
        }
    }
}
