#![forbid(unsafe_code)]

//! Scroll-anchored loading of older log pages.
//!
//! When the viewport is pinned at the very top and older pages exist, a
//! scroll event asks for the next older page. Prepending records pushes the
//! visible content down, so before the fetch the loader remembers which
//! record sat at the top of the viewport and how far from the viewport edge
//! it was; after the merge it moves the scroll offset so that record lands
//! at the same distance again.
//!
//! The loader only tracks geometry. Whether a fetch may be issued comes in as
//! a [`LoadGate`], normally built from the
//! [`LogFetchController`](crate::controller::LogFetchController).
//!
//! # Follow mode
//!
//! Like a terminal log pane, the viewer starts in follow mode: after a
//! refresh the view jumps to the newest record at the bottom. Scrolling
//! away from the bottom leaves follow mode; [`scroll_to_bottom`] re-enters
//! it.
//!
//! [`scroll_to_bottom`]: ScrollAnchoredLoader::scroll_to_bottom

use std::fmt;

use crate::controller::LogFetchController;
use crate::layout::RowLayout;
use crate::record::LogRecord;

/// Whether an older-page fetch may start, plus the flags the load-more
/// indicator depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadGate {
    pub has_more: bool,
    pub in_flight: bool,
    /// All preconditions for issuing a load-older hold.
    pub can_load: bool,
}

impl From<&LogFetchController> for LoadGate {
    fn from(ctl: &LogFetchController) -> Self {
        let state = ctl.pagination();
        Self {
            has_more: state.has_more,
            in_flight: state.in_flight,
            can_load: ctl.can_load_older(),
        }
    }
}

/// Result of a scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTrigger {
    /// Nothing to do.
    Idle,
    /// The caller should issue a load-older fetch.
    LoadOlder,
}

/// The record used as visual reference across a prepend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollAnchor {
    pub id: String,
    /// Index in the visible list when captured.
    pub index: usize,
    /// Distance of the record's top edge below the viewport top.
    pub offset: u32,
}

/// The anchor record was not in the visible list after the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorLost {
    pub id: String,
}

impl fmt::Display for AnchorLost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scroll anchor {:?} not found after merge", self.id)
    }
}

impl std::error::Error for AnchorLost {}

/// Scroll state for the log list plus the pending anchor of an in-flight
/// load-older.
#[derive(Debug, Clone)]
pub struct ScrollAnchoredLoader {
    scroll_top: u32,
    viewport_height: u32,
    follow: bool,
    indicator: bool,
    pending: Option<ScrollAnchor>,
}

impl Default for ScrollAnchoredLoader {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ScrollAnchoredLoader {
    #[must_use]
    pub fn new(viewport_height: u32) -> Self {
        Self {
            scroll_top: 0,
            viewport_height,
            follow: true,
            indicator: false,
            pending: None,
        }
    }

    /// Back to the initial state, keeping the viewport height.
    pub fn reset(&mut self) {
        *self = Self::new(self.viewport_height);
    }

    /// Handle a scroll event at `scroll_top`.
    ///
    /// Fires [`ScrollTrigger::LoadOlder`] only at offset 0 with the gate open,
    /// capturing the anchor first. The load-more indicator is re-evaluated on
    /// every call.
    pub fn on_scroll(
        &mut self,
        scroll_top: u32,
        visible: &[&LogRecord],
        layout: &RowLayout,
        gate: LoadGate,
    ) -> ScrollTrigger {
        self.scroll_top = scroll_top.min(layout.max_scroll(self.viewport_height));
        self.follow = self.scroll_top >= layout.max_scroll(self.viewport_height);

        let at_top = self.scroll_top == 0;
        self.indicator = at_top && gate.has_more && !gate.in_flight;

        if !at_top || !gate.can_load {
            return ScrollTrigger::Idle;
        }
        self.pending = self.capture(visible, layout);
        tracing::trace!(anchor = ?self.pending.as_ref().map(|a| &a.id), "load older triggered");
        ScrollTrigger::LoadOlder
    }

    fn capture(&self, visible: &[&LogRecord], layout: &RowLayout) -> Option<ScrollAnchor> {
        let index = layout.first_at_or_below(self.scroll_top)?;
        let record = visible.get(index)?;
        let top = layout.top_of(index)?;
        Some(ScrollAnchor {
            id: record.id.clone(),
            index,
            offset: top - self.scroll_top,
        })
    }

    /// Re-position after older records were merged.
    ///
    /// `prepended_visible` is how many of the prepended records pass the
    /// current filter; it turns the captured index into a lookup hint.
    /// Returns the new scroll offset, or `Ok(None)` when nothing was pending.
    /// On [`AnchorLost`] the scroll offset is left unchanged.
    pub fn restore(
        &mut self,
        visible: &[&LogRecord],
        layout: &RowLayout,
        prepended_visible: usize,
    ) -> Result<Option<u32>, AnchorLost> {
        let Some(anchor) = self.pending.take() else {
            return Ok(None);
        };

        let hint = anchor.index + prepended_visible;
        let index = match visible.get(hint) {
            Some(record) if record.id == anchor.id => Some(hint),
            _ => visible.iter().position(|r| r.id == anchor.id),
        };
        let Some(top) = index.and_then(|i| layout.top_of(i)) else {
            tracing::debug!(anchor = %anchor.id, "scroll anchor lost");
            return Err(AnchorLost { id: anchor.id });
        };

        self.scroll_top = top
            .saturating_sub(anchor.offset)
            .min(layout.max_scroll(self.viewport_height));
        self.follow = false;
        Ok(Some(self.scroll_top))
    }

    /// Drop the pending anchor (the fetch failed or was discarded).
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_top = 0;
        self.follow = false;
    }

    /// Jump to the newest record and enter follow mode.
    pub fn scroll_to_bottom(&mut self, layout: &RowLayout) {
        self.scroll_top = layout.max_scroll(self.viewport_height);
        self.follow = true;
    }

    /// Re-apply follow mode and clamp after the content changed.
    pub fn relayout(&mut self, layout: &RowLayout) {
        let max = layout.max_scroll(self.viewport_height);
        self.scroll_top = if self.follow { max } else { self.scroll_top.min(max) };
    }

    pub fn set_viewport_height(&mut self, height: u32, layout: &RowLayout) {
        self.viewport_height = height;
        self.relayout(layout);
    }

    /// Viewport-relative top edge of visible row `index`.
    #[must_use]
    pub fn offset_of(&self, index: usize, layout: &RowLayout) -> Option<i64> {
        layout
            .top_of(index)
            .map(|top| i64::from(top) - i64::from(self.scroll_top))
    }

    #[must_use]
    pub fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    #[must_use]
    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    #[must_use]
    pub fn is_following(&self) -> bool {
        self.follow
    }

    /// Whether the "scroll up to load more" indicator is shown.
    #[must_use]
    pub fn indicator_visible(&self) -> bool {
        self.indicator
    }

    #[must_use]
    pub fn pending_anchor(&self) -> Option<&ScrollAnchor> {
        self.pending.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;

    fn rec(name: &str) -> LogRecord {
        LogRecord::new("2024-01-01T00:00:00Z", name, LogLevel::Info)
    }

    fn open_gate() -> LoadGate {
        LoadGate {
            has_more: true,
            in_flight: false,
            can_load: true,
        }
    }

    fn refs(records: &[LogRecord]) -> Vec<&LogRecord> {
        records.iter().collect()
    }

    #[test]
    fn anchor_keeps_viewport_offset_across_prepend() {
        // Rows are 20 tall below a 40px top inset, so the first record sits
        // 40px below the viewport top when scrolled to 0.
        let before: Vec<LogRecord> = ["a", "b", "c", "d", "e", "f"].map(rec).to_vec();
        let layout = RowLayout::from_heights([20; 6], 40, 0);
        let mut loader = ScrollAnchoredLoader::new(40);

        assert_eq!(
            loader.on_scroll(0, &refs(&before), &layout, open_gate()),
            ScrollTrigger::LoadOlder
        );
        let anchor = loader.pending_anchor().unwrap().clone();
        assert_eq!(anchor.id, before[0].id);
        assert_eq!(anchor.index, 0);
        assert_eq!(anchor.offset, 40);

        let older: Vec<LogRecord> = ["o1", "o2", "o3", "o4", "o5"].map(rec).to_vec();
        let after: Vec<LogRecord> = older.iter().chain(&before).cloned().collect();
        let layout = RowLayout::from_heights([20; 11], 40, 0);

        let scroll = loader.restore(&refs(&after), &layout, 5).unwrap();
        assert_eq!(scroll, Some(100));
        assert_eq!(loader.offset_of(5, &layout), Some(40));
        assert!(loader.pending_anchor().is_none());
    }

    #[test]
    fn capture_uses_first_row_at_or_below_viewport_top() {
        let records: Vec<LogRecord> = ["a", "b", "c"].map(rec).to_vec();
        let layout = RowLayout::from_heights([10, 10, 10], 6, 0);
        let mut loader = ScrollAnchoredLoader::new(10);
        loader.on_scroll(0, &refs(&records), &layout, open_gate());
        let anchor = loader.pending_anchor().unwrap();
        assert_eq!(anchor.index, 0);
        assert_eq!(anchor.offset, 6);
    }

    #[test]
    fn no_trigger_away_from_top_or_with_gate_closed() {
        let records: Vec<LogRecord> = ["a", "b", "c"].map(rec).to_vec();
        let layout = RowLayout::from_heights([10, 10, 10], 0, 0);
        let mut loader = ScrollAnchoredLoader::new(10);

        assert_eq!(
            loader.on_scroll(5, &refs(&records), &layout, open_gate()),
            ScrollTrigger::Idle
        );
        assert!(!loader.indicator_visible());

        let in_flight = LoadGate {
            has_more: true,
            in_flight: true,
            can_load: false,
        };
        assert_eq!(
            loader.on_scroll(0, &refs(&records), &layout, in_flight),
            ScrollTrigger::Idle
        );
        assert!(!loader.indicator_visible());
        assert!(loader.pending_anchor().is_none());
    }

    #[test]
    fn indicator_tracks_top_and_has_more() {
        let records: Vec<LogRecord> = ["a", "b"].map(rec).to_vec();
        let layout = RowLayout::from_heights([10, 10], 0, 0);
        let mut loader = ScrollAnchoredLoader::new(10);

        // At the ceiling: more exists but no fetch may start.
        let ceiling = LoadGate {
            has_more: true,
            in_flight: false,
            can_load: false,
        };
        loader.on_scroll(0, &refs(&records), &layout, ceiling);
        assert!(loader.indicator_visible());

        let exhausted = LoadGate::default();
        loader.on_scroll(0, &refs(&records), &layout, exhausted);
        assert!(!loader.indicator_visible());
    }

    #[test]
    fn lost_anchor_leaves_scroll_unchanged() {
        let records: Vec<LogRecord> = ["a", "b", "c"].map(rec).to_vec();
        let layout = RowLayout::from_heights([10, 10, 10], 0, 0);
        let mut loader = ScrollAnchoredLoader::new(10);
        loader.on_scroll(0, &refs(&records), &layout, open_gate());

        let replaced: Vec<LogRecord> = ["p", "q"].map(rec).to_vec();
        let err = loader
            .restore(&refs(&replaced), &RowLayout::from_heights([10, 10], 0, 0), 2)
            .unwrap_err();
        assert_eq!(err.id, records[0].id);
        assert_eq!(loader.scroll_top(), 0);
    }

    #[test]
    fn restore_falls_back_to_id_search() {
        let records: Vec<LogRecord> = ["a", "b"].map(rec).to_vec();
        let layout = RowLayout::from_heights([10, 10], 0, 0);
        let mut loader = ScrollAnchoredLoader::new(10);
        loader.on_scroll(0, &refs(&records), &layout, open_gate());

        // The hint claims three were prepended but only one was.
        let after: Vec<LogRecord> = ["o", "a", "b"].map(rec).to_vec();
        let layout = RowLayout::from_heights([10, 10, 10], 0, 0);
        assert_eq!(loader.restore(&refs(&after), &layout, 3), Ok(Some(10)));
    }

    #[test]
    fn restore_without_pending_is_noop() {
        let mut loader = ScrollAnchoredLoader::new(10);
        let layout = RowLayout::default();
        assert_eq!(loader.restore(&[], &layout, 0), Ok(None));
    }

    #[test]
    fn follow_mode_sticks_to_bottom() {
        let mut loader = ScrollAnchoredLoader::new(10);
        let layout = RowLayout::from_heights([10; 5], 0, 0);
        loader.relayout(&layout);
        assert_eq!(loader.scroll_top(), 40);
        assert!(loader.is_following());

        loader.on_scroll(20, &[], &layout, LoadGate::default());
        assert!(!loader.is_following());
        let grown = RowLayout::from_heights([10; 8], 0, 0);
        loader.relayout(&grown);
        assert_eq!(loader.scroll_top(), 20);

        loader.scroll_to_bottom(&grown);
        assert_eq!(loader.scroll_top(), 70);
        loader.scroll_to_top();
        assert_eq!(loader.scroll_top(), 0);
        assert!(!loader.is_following());
    }
}
