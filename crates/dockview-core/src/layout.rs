#![forbid(unsafe_code)]

//! Row geometry for the visible log records.
//!
//! The scroll anchor needs to know where each visible record starts.
//! [`RowLayout`] keeps prefix sums of row heights so `top_of` is O(1) and
//! `first_at_or_below` is a binary search. Units are whatever the renderer
//! uses (terminal rows, pixels); the layout never interprets them.

use unicode_width::UnicodeWidthChar;

use crate::record::LogRecord;

/// Measures the rendered height of one record.
pub trait RowMeasure {
    fn measure(&self, record: &LogRecord) -> u32;
}

/// Every record has the same height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRowHeight(pub u32);

impl RowMeasure for FixedRowHeight {
    fn measure(&self, _record: &LogRecord) -> u32 {
        self.0
    }
}

/// Height of a record whose message wraps at `width` columns, plus a fixed
/// number of header rows (timestamp and level badge).
///
/// Embedded newlines are preserved, each segment wraps independently, and
/// empty segments still take a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrappedRows {
    pub width: u32,
    pub header_rows: u32,
}

impl WrappedRows {
    #[must_use]
    pub fn new(width: u32, header_rows: u32) -> Self {
        Self {
            width: width.max(1),
            header_rows,
        }
    }
}

impl RowMeasure for WrappedRows {
    fn measure(&self, record: &LogRecord) -> u32 {
        let body = wrap_text(&record.message, self.width.max(1) as usize).len();
        self.header_rows
            .saturating_add(u32::try_from(body).unwrap_or(u32::MAX))
    }
}

/// Greedily wrap `text` at `width` display columns.
///
/// A glyph that does not fit starts a new row; wide glyphs are never split.
/// A glyph wider than `width` gets a row of its own.
#[must_use]
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for segment in text.split('\n') {
        let mut row = String::new();
        let mut used = 0;
        for ch in segment.chars() {
            let w = ch.width().unwrap_or(0);
            if used + w > width && !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                used = 0;
            }
            row.push(ch);
            used += w;
        }
        rows.push(row);
    }
    rows
}

/// Positions of a sequence of rows inside a scrollable viewport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowLayout {
    tops: Vec<u32>,
    heights: Vec<u32>,
    /// Bottom edge of the last row (or the top inset when empty).
    end: u32,
    inset: u32,
    gap: u32,
}

impl RowLayout {
    /// Lay out `records` top to bottom with `gap` between rows and `inset`
    /// padding above the first and below the last row.
    pub fn compute<'a, I>(records: I, measure: &dyn RowMeasure, inset: u32, gap: u32) -> Self
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let heights = records.into_iter().map(|r| measure.measure(r));
        Self::from_heights(heights, inset, gap)
    }

    /// Lay out rows with the given heights.
    pub fn from_heights(heights: impl IntoIterator<Item = u32>, inset: u32, gap: u32) -> Self {
        let mut tops = Vec::new();
        let mut sizes = Vec::new();
        let mut y = inset;
        for (i, h) in heights.into_iter().enumerate() {
            if i > 0 {
                y = y.saturating_add(gap);
            }
            tops.push(y);
            sizes.push(h);
            y = y.saturating_add(h);
        }
        Self {
            tops,
            heights: sizes,
            end: y,
            inset,
            gap,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tops.is_empty()
    }

    /// Top edge of row `index`.
    #[must_use]
    pub fn top_of(&self, index: usize) -> Option<u32> {
        self.tops.get(index).copied()
    }

    /// Height of row `index`.
    #[must_use]
    pub fn height_of(&self, index: usize) -> Option<u32> {
        self.heights.get(index).copied()
    }

    /// Total scrollable height including insets.
    #[must_use]
    pub fn content_height(&self) -> u32 {
        self.end.saturating_add(self.inset)
    }

    /// Largest scroll offset for a viewport of `viewport_height`.
    #[must_use]
    pub fn max_scroll(&self, viewport_height: u32) -> u32 {
        self.content_height().saturating_sub(viewport_height)
    }

    /// First row whose top edge is at or below `y`.
    #[must_use]
    pub fn first_at_or_below(&self, y: u32) -> Option<usize> {
        let idx = self.tops.partition_point(|&top| top < y);
        (idx < self.tops.len()).then_some(idx)
    }

    #[must_use]
    pub fn gap(&self) -> u32 {
        self.gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;

    fn rec(message: &str) -> LogRecord {
        LogRecord::new("t", message, LogLevel::Info)
    }

    #[test]
    fn fixed_rows_stack() {
        let layout = RowLayout::from_heights([10, 10, 10], 0, 0);
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.top_of(0), Some(0));
        assert_eq!(layout.top_of(2), Some(20));
        assert_eq!(layout.top_of(3), None);
        assert_eq!(layout.content_height(), 30);
    }

    #[test]
    fn gaps_and_insets() {
        let layout = RowLayout::from_heights([10, 20, 5], 4, 2);
        assert_eq!(layout.top_of(0), Some(4));
        assert_eq!(layout.top_of(1), Some(16));
        assert_eq!(layout.top_of(2), Some(38));
        assert_eq!(layout.height_of(1), Some(20));
        assert_eq!(layout.content_height(), 47);
        assert_eq!(layout.max_scroll(40), 7);
    }

    #[test]
    fn empty_layout() {
        let layout = RowLayout::from_heights(Vec::new(), 8, 2);
        assert!(layout.is_empty());
        assert_eq!(layout.content_height(), 16);
        assert_eq!(layout.first_at_or_below(0), None);
    }

    #[test]
    fn first_at_or_below_finds_fully_visible_row() {
        let layout = RowLayout::from_heights([10, 10, 10, 10], 0, 0);
        assert_eq!(layout.first_at_or_below(0), Some(0));
        assert_eq!(layout.first_at_or_below(5), Some(1));
        assert_eq!(layout.first_at_or_below(10), Some(1));
        assert_eq!(layout.first_at_or_below(31), None);
    }

    #[test]
    fn wrapped_rows_count_display_width() {
        let measure = WrappedRows::new(10, 1);
        assert_eq!(measure.measure(&rec("short")), 2);
        assert_eq!(measure.measure(&rec(&"x".repeat(25))), 4);
        assert_eq!(measure.measure(&rec("a\n\nb")), 4);
        // Wide glyphs take two columns each.
        assert_eq!(measure.measure(&rec(&"界".repeat(6))), 3);
    }

    #[test]
    fn wide_glyphs_at_odd_width_never_split() {
        assert_eq!(wrap_text("界界界", 3), vec!["界", "界", "界"]);
        assert_eq!(wrap_text("a界b", 2), vec!["a", "界", "b"]);
        assert_eq!(wrap_text("界", 1), vec!["界"]);
        assert_eq!(WrappedRows::new(3, 1).measure(&rec("界界界")), 4);
        assert_eq!(WrappedRows::new(5, 0).measure(&rec("界界界")), 2);
    }

    #[test]
    fn compute_uses_measure() {
        let records = [rec("a"), rec("b")];
        let layout = RowLayout::compute(&records, &FixedRowHeight(3), 0, 1);
        assert_eq!(layout.top_of(1), Some(4));
        assert_eq!(layout.content_height(), 7);
    }
}
