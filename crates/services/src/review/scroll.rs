use std::time::{Duration, Instant};

/// Items revealed per page on the saved-questions list.
pub const SAVED_PAGE_SIZE: usize = 3;

/// Items revealed per page on the wrong-answers list.
pub const WRONG_PAGE_SIZE: usize = 5;

/// Quiet period after the last scroll event before the trigger is evaluated.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(100);

/// Distance from the bottom of the content at which the next page is loaded.
pub const LOAD_TRIGGER_OFFSET: f64 = 1300.0;

/// Incrementally revealed window over a list of `len` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewWindow {
    page_size: usize,
    visible: usize,
}

impl ReviewWindow {
    /// Window showing the first page of `len` items.
    #[must_use]
    pub fn new(len: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            visible: page_size.min(len),
        }
    }

    #[must_use]
    pub fn visible(&self) -> usize {
        self.visible
    }

    #[must_use]
    pub fn has_more(&self, len: usize) -> bool {
        self.visible < len
    }

    /// Reveal one more page, capped at `len`. Returns the number of new items.
    pub fn grow(&mut self, len: usize) -> usize {
        let before = self.visible;
        self.visible = (self.visible + self.page_size).min(len);
        self.visible - before
    }

    /// Keep the window consistent after the list shrank.
    pub fn clamp(&mut self, len: usize) {
        self.visible = self.visible.min(len);
    }
}

/// Scroll position reported by the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_y: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ScrollMetrics {
    #[must_use]
    pub fn near_bottom(&self) -> bool {
        self.scroll_y + self.viewport_height >= self.content_height - LOAD_TRIGGER_OFFSET
    }
}

/// Trailing-edge debounced "load more" trigger.
///
/// Scroll events only record the latest position; `poll` fires once the
/// events have been quiet for `SCROLL_DEBOUNCE` and the position is close
/// enough to the bottom. A detached trigger ignores everything.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    debounce: Duration,
    latest: Option<(ScrollMetrics, Instant)>,
    attached: bool,
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            debounce: SCROLL_DEBOUNCE,
            latest: None,
            attached: true,
        }
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics, at: Instant) {
        if self.attached {
            self.latest = Some((metrics, at));
        }
    }

    /// Returns `true` when a debounced scroll event asks for the next page.
    /// Each recorded event fires at most once.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some((metrics, at)) = self.latest else {
            return false;
        };
        if now.saturating_duration_since(at) < self.debounce {
            return false;
        }
        self.latest = None;
        metrics.near_bottom()
    }

    /// When the pending event becomes eligible, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.latest.map(|(_, at)| at + self.debounce)
    }

    /// Stop listening. Pending events are discarded.
    pub fn detach(&mut self) {
        self.attached = false;
        self.latest = None;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(scroll_y: f64) -> ScrollMetrics {
        ScrollMetrics {
            scroll_y,
            viewport_height: 800.0,
            content_height: 4000.0,
        }
    }

    #[test]
    fn window_grows_by_page_until_capped() {
        let mut window = ReviewWindow::new(12, WRONG_PAGE_SIZE);
        assert_eq!(window.visible(), 5);
        assert_eq!(window.grow(12), 5);
        assert_eq!(window.grow(12), 2);
        assert!(!window.has_more(12));
        assert_eq!(window.grow(12), 0);

        window.clamp(3);
        assert_eq!(window.visible(), 3);
        assert_eq!(ReviewWindow::new(2, SAVED_PAGE_SIZE).visible(), 2);
        assert_eq!(ReviewWindow::new(7, 0).visible(), 1);
    }

    #[test]
    fn near_bottom_uses_trigger_offset() {
        assert!(!metrics(1800.0).near_bottom());
        assert!(metrics(1900.0).near_bottom());
    }

    #[test]
    fn trigger_fires_only_after_quiet_period() {
        let start = Instant::now();
        let mut trigger = ScrollTrigger::new();
        trigger.on_scroll(metrics(100.0), start);
        trigger.on_scroll(metrics(2500.0), start + Duration::from_millis(60));

        assert!(!trigger.poll(start + Duration::from_millis(120)));
        assert_eq!(trigger.deadline(), Some(start + Duration::from_millis(160)));
        assert!(trigger.poll(start + Duration::from_millis(160)));
        assert!(!trigger.poll(start + Duration::from_millis(400)));
    }

    #[test]
    fn far_from_bottom_does_not_fire() {
        let start = Instant::now();
        let mut trigger = ScrollTrigger::new();
        trigger.on_scroll(metrics(0.0), start);
        assert!(!trigger.poll(start + SCROLL_DEBOUNCE));
        assert_eq!(trigger.deadline(), None);
    }

    #[test]
    fn detached_trigger_ignores_events() {
        let start = Instant::now();
        let mut trigger = ScrollTrigger::new();
        trigger.on_scroll(metrics(3000.0), start);
        trigger.detach();
        trigger.on_scroll(metrics(3000.0), start);
        assert!(!trigger.poll(start + Duration::from_secs(1)));
        assert!(!trigger.is_attached());
    }
}
