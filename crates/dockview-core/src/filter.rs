#![forbid(unsafe_code)]

//! Level filter over the log buffer.
//!
//! The filter is a pure view: it never mutates the buffer, and the visible
//! sequence is recomputed from the buffer on every call, in buffer order.

use std::fmt;

use crate::level::{LevelSet, LogLevel};
use crate::record::LogRecord;

/// "showing X/Y" counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    pub visible: usize,
    pub total: usize,
}

impl fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "showing {}/{}", self.visible, self.total)
    }
}

/// Which empty screen, if any, the log list should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// Records are visible.
    None,
    /// The buffer itself is empty.
    NoLogs,
    /// The buffer has records but the filter hides all of them.
    AllFiltered,
}

impl EmptyState {
    /// Placeholder text for the empty list.
    #[must_use]
    pub const fn message(self) -> Option<&'static str> {
        match self {
            EmptyState::None => None,
            EmptyState::NoLogs => Some("No logs"),
            EmptyState::AllFiltered => Some("No logs match the selected levels"),
        }
    }
}

/// Selected severities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelFilter {
    selected: LevelSet,
}

impl LevelFilter {
    /// A filter with every level selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_selected(selected: LevelSet) -> Self {
        Self { selected }
    }

    #[must_use]
    pub fn selected(&self) -> LevelSet {
        self.selected
    }

    #[must_use]
    pub fn is_selected(&self, level: LogLevel) -> bool {
        self.selected.includes(level)
    }

    /// Flip `level`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, level: LogLevel) -> bool {
        self.selected.toggle(level.bit());
        tracing::trace!(level = %level, selected = ?self.selected, "level filter toggled");
        self.is_selected(level)
    }

    /// Select all five levels.
    pub fn reset(&mut self) {
        self.selected = LevelSet::all();
    }

    /// Whether every level is selected.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.selected.is_all()
    }

    #[must_use]
    pub fn matches(&self, record: &LogRecord) -> bool {
        self.selected.includes(record.level)
    }

    /// Records passing the filter, in buffer order.
    pub fn visible<'a>(&self, records: &'a [LogRecord]) -> impl Iterator<Item = &'a LogRecord> {
        let selected = self.selected;
        records.iter().filter(move |r| selected.includes(r.level))
    }

    #[must_use]
    pub fn visible_count(&self, records: &[LogRecord]) -> usize {
        self.visible(records).count()
    }

    #[must_use]
    pub fn summary(&self, records: &[LogRecord]) -> FilterSummary {
        FilterSummary {
            visible: self.visible_count(records),
            total: records.len(),
        }
    }

    #[must_use]
    pub fn empty_state(&self, records: &[LogRecord]) -> EmptyState {
        if records.is_empty() {
            EmptyState::NoLogs
        } else if self.visible(records).next().is_none() {
            EmptyState::AllFiltered
        } else {
            EmptyState::None
        }
    }
}
