//! Sliding-window rate awareness for the upstream API.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Pause inserted between calls when usage approaches a limit.
const NEAR_LIMIT_PAUSE: Duration = Duration::from_millis(200);

/// Fraction of a limit at which the tracker starts slowing calls down.
const NEAR_LIMIT_RATIO: f64 = 0.9;

/// Tracks calls in a one-minute sliding window and a rolling day.
///
/// Owned by a single client instance, so counts are never shared across
/// concurrent generations.
#[derive(Debug)]
pub struct RateTracker {
    per_minute_limit: u32,
    per_day_limit: u32,
    minute_window: Duration,
    day_window: Duration,
    minute_events: VecDeque<Instant>,
    day_events: VecDeque<Instant>,
}

impl RateTracker {
    pub fn new(per_minute_limit: u32, per_day_limit: u32) -> Self {
        Self::with_windows(
            per_minute_limit,
            per_day_limit,
            Duration::from_secs(60),
            Duration::from_secs(24 * 60 * 60),
        )
    }

    pub(crate) fn with_windows(
        per_minute_limit: u32,
        per_day_limit: u32,
        minute_window: Duration,
        day_window: Duration,
    ) -> Self {
        Self {
            per_minute_limit: per_minute_limit.max(1),
            per_day_limit: per_day_limit.max(1),
            minute_window,
            day_window,
            minute_events: VecDeque::new(),
            day_events: VecDeque::new(),
        }
    }

    /// The pause required before the next call may go out.
    ///
    /// At the limit this blocks until the oldest call leaves the window, so
    /// the window count never exceeds the configured maximum. Within 10% of
    /// a limit it asks for a small fixed pause.
    pub fn before_call(&mut self, now: Instant) -> Option<Duration> {
        self.prune(now);
        let minute_wait = window_wait(
            &self.minute_events,
            self.per_minute_limit,
            self.minute_window,
            now,
        );
        let day_wait = window_wait(&self.day_events, self.per_day_limit, self.day_window, now);
        match (minute_wait, day_wait) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or_default().max(b.unwrap_or_default())),
        }
    }

    /// Records one issued call.
    pub fn record(&mut self, now: Instant) {
        self.minute_events.push_back(now);
        self.day_events.push_back(now);
    }

    /// Calls currently inside the one-minute window.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.minute_events.len()
    }

    fn prune(&mut self, now: Instant) {
        prune_window(&mut self.minute_events, self.minute_window, now);
        prune_window(&mut self.day_events, self.day_window, now);
    }
}

fn prune_window(events: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(oldest) = events.front() {
        if now.duration_since(*oldest) >= window {
            events.pop_front();
        } else {
            break;
        }
    }
}

fn window_wait(
    events: &VecDeque<Instant>,
    limit: u32,
    window: Duration,
    now: Instant,
) -> Option<Duration> {
    let count = events.len() as u32;
    if count >= limit {
        let oldest = events.front().expect("count positive but no events");
        return Some(window.saturating_sub(now.duration_since(*oldest)));
    }
    if f64::from(count) >= f64::from(limit) * NEAR_LIMIT_RATIO {
        return Some(NEAR_LIMIT_PAUSE);
    }
    None
}
