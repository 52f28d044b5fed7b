#![forbid(unsafe_code)]

//! Paged log retrieval for a single container.
//!
//! [`LogFetchController`] owns the ordered log buffer and the pagination
//! cursor for one dialog session. It never performs I/O on its own in the
//! split API: callers ask for a [`FetchTicket`], run the fetch wherever they
//! like, and hand the result back through [`LogFetchController::complete`].
//! The blocking [`refresh`](LogFetchController::refresh) and
//! [`load_older`](LogFetchController::load_older) wrap that cycle around a
//! [`LogSource`].
//!
//! # Invariants
//!
//! 1. The buffer is oldest-first. Refresh replaces it with page 1; load-older
//!    prepends the next older page.
//! 2. At most one fetch is outstanding. A second request while one is in
//!    flight is ignored, not queued.
//! 3. `current_page` never exceeds `max_pages`.
//! 4. Results are applied only if their ticket belongs to the current session
//!    generation and matches the outstanding ticket; anything else is
//!    discarded unapplied.
//! 5. A failed refresh leaves the buffer empty. A failed load-older leaves
//!    buffer and cursor untouched.
//!
//! # Seam de-duplication
//!
//! When new lines are written between two fetches, the source's page windows
//! shift and the older page repeats records already at the buffer head. The
//! longest suffix of the incoming page whose ids equal a prefix of the buffer
//! is dropped before prepending. The trimmed run is capped at the number of
//! entries the source gained since the previous fetch, so a source that did
//! not grow never loses lines to identical ids.

use crate::config::ViewerConfig;
use crate::record::{LogRecord, now_timestamp};
use crate::source::{FetchError, LogPage, LogSource, PageRequest};

/// Which operation a fetch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// Page 1, replaces the buffer.
    Refresh,
    /// The next older page, prepended.
    LoadOlder,
}

/// Identity of an issued fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    /// Session generation the fetch was issued under.
    pub generation: u64,
    pub kind: FetchKind,
    pub request: PageRequest,
}

/// Snapshot of the pagination cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// Page most recently merged; load-older requests `current_page + 1`.
    pub current_page: u32,
    /// Whether the source reported older pages.
    pub has_more: bool,
    /// Total reported by the last successful refresh.
    pub total_count: u64,
    /// Whether a fetch is outstanding.
    pub in_flight: bool,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: 1,
            has_more: true,
            total_count: 0,
            in_flight: false,
        }
    }
}

/// What [`LogFetchController::complete`] did with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Refresh succeeded; the buffer now holds `count` records.
    Replaced { count: usize },
    /// Load-older succeeded; `added` records were prepended after dropping
    /// `overlap` records already at the buffer head.
    Prepended { added: usize, overlap: usize },
    /// The fetch failed; the error is also kept as [`LogFetchController::last_error`].
    Failed(FetchError),
    /// The ticket was stale and its result was dropped.
    Discarded,
    /// No fetch was issued (guard closed, no target, or ceiling reached).
    Skipped,
}

/// Pagination state machine for one open log dialog.
#[derive(Debug, Clone)]
pub struct LogFetchController {
    page_size: u32,
    max_pages: u32,
    target: Option<String>,
    generation: u64,
    current_page: u32,
    has_more: bool,
    total_count: u64,
    /// Total reported by the last successful fetch of either kind; bounds
    /// the seam overlap.
    seen_total: u64,
    /// A refresh has succeeded in this session.
    loaded: bool,
    outstanding: Option<FetchTicket>,
    buffer: Vec<LogRecord>,
    last_error: Option<FetchError>,
    clock: fn() -> String,
}

impl LogFetchController {
    /// Create a controller using the page size and ceiling from `config`.
    #[must_use]
    pub fn new(config: &ViewerConfig) -> Self {
        Self::with_limits(config.page_size, config.max_pages)
    }

    /// Create a controller with explicit limits. Both are clamped to at least 1.
    #[must_use]
    pub fn with_limits(page_size: u32, max_pages: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            target: None,
            generation: 0,
            current_page: 1,
            has_more: true,
            total_count: 0,
            seen_total: 0,
            loaded: false,
            outstanding: None,
            buffer: Vec::new(),
            last_error: None,
            clock: now_timestamp,
        }
    }

    /// Replace the fallback clock used when normalizing timestamp-less lines.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    // ── Session lifecycle ────────────────────────────────────────────────

    /// Start a session for `container`.
    ///
    /// Resets pagination, clears the buffer and error, and invalidates any
    /// outstanding fetch.
    pub fn open(&mut self, container: impl Into<String>) {
        let container = container.into();
        self.reset_session();
        tracing::debug!(container = %container, generation = self.generation, "log session opened");
        self.target = Some(container);
    }

    /// End the session. Outstanding fetches become stale.
    pub fn close(&mut self) {
        self.reset_session();
        if let Some(container) = self.target.take() {
            tracing::debug!(container = %container, generation = self.generation, "log session closed");
        }
    }

    fn reset_session(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.current_page = 1;
        self.has_more = true;
        self.total_count = 0;
        self.seen_total = 0;
        self.loaded = false;
        self.outstanding = None;
        self.buffer.clear();
        self.last_error = None;
    }

    // ── Split fetch API ──────────────────────────────────────────────────

    /// Start a refresh: clear the buffer, reset the cursor to page 1, and
    /// return the page-1 ticket.
    ///
    /// Returns `None` without touching state when there is no target or a
    /// fetch is already in flight.
    pub fn begin_refresh(&mut self) -> Option<FetchTicket> {
        let container = self.target.clone()?;
        if self.outstanding.is_some() {
            tracing::trace!(container = %container, "refresh ignored, fetch in flight");
            return None;
        }

        self.buffer.clear();
        self.current_page = 1;
        self.has_more = true;
        self.loaded = false;
        self.last_error = None;
        Some(self.issue(FetchKind::Refresh, container, 1))
    }

    /// Start loading the next older page.
    ///
    /// Returns `None` when [`can_load_older`](Self::can_load_older) is false.
    pub fn begin_load_older(&mut self) -> Option<FetchTicket> {
        if !self.can_load_older() {
            return None;
        }
        let container = self.target.clone()?;
        self.last_error = None;
        let page = self.current_page + 1;
        Some(self.issue(FetchKind::LoadOlder, container, page))
    }

    fn issue(&mut self, kind: FetchKind, container: String, page: u32) -> FetchTicket {
        let ticket = FetchTicket {
            generation: self.generation,
            kind,
            request: PageRequest::new(container, page, self.page_size),
        };
        tracing::debug!(
            container = %ticket.request.container,
            page,
            kind = ?kind,
            generation = self.generation,
            "log fetch issued"
        );
        self.outstanding = Some(ticket.clone());
        ticket
    }

    /// Apply a fetch result.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<LogPage, FetchError>,
    ) -> MergeOutcome {
        if ticket.generation != self.generation || self.outstanding.as_ref() != Some(ticket) {
            tracing::debug!(
                container = %ticket.request.container,
                page = ticket.request.page,
                ticket_generation = ticket.generation,
                generation = self.generation,
                "stale log fetch discarded"
            );
            return MergeOutcome::Discarded;
        }
        self.outstanding = None;

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(
                    container = %ticket.request.container,
                    page = ticket.request.page,
                    error = %err,
                    "log fetch failed"
                );
                if ticket.kind == FetchKind::Refresh {
                    self.buffer.clear();
                }
                self.last_error = Some(err.clone());
                return MergeOutcome::Failed(err);
            }
        };

        let clock = self.clock;
        let has_more = page.has_more;
        let total = page.total;
        let records: Vec<LogRecord> = page
            .entries
            .into_iter()
            .map(|entry| LogRecord::from_entry_at(entry, clock))
            .collect();

        match ticket.kind {
            FetchKind::Refresh => {
                let count = records.len();
                self.buffer = records;
                self.current_page = ticket.request.page;
                self.total_count = total;
                self.seen_total = total;
                self.has_more = has_more;
                self.loaded = true;
                tracing::debug!(
                    container = %ticket.request.container,
                    count,
                    total,
                    has_more,
                    "log buffer replaced"
                );
                MergeOutcome::Replaced { count }
            }
            FetchKind::LoadOlder => {
                let gained = total.saturating_sub(self.seen_total);
                let (added, overlap) = self.prepend(records, gained);
                self.current_page = ticket.request.page.min(self.max_pages);
                self.seen_total = total;
                self.has_more = has_more;
                tracing::debug!(
                    container = %ticket.request.container,
                    page = self.current_page,
                    added,
                    overlap,
                    gained,
                    has_more,
                    "older logs prepended"
                );
                MergeOutcome::Prepended { added, overlap }
            }
        }
    }

    fn prepend(&mut self, mut older: Vec<LogRecord>, gained: u64) -> (usize, usize) {
        let limit = usize::try_from(gained).unwrap_or(usize::MAX);
        let overlap = seam_overlap(&older, &self.buffer, limit);
        older.truncate(older.len() - overlap);
        let added = older.len();
        self.buffer.splice(0..0, older);
        (added, overlap)
    }

    // ── Blocking API ─────────────────────────────────────────────────────

    /// Refresh `container` from `source`, re-opening the session first if
    /// `container` is not the current target.
    pub fn refresh(&mut self, container: &str, source: &dyn LogSource) -> MergeOutcome {
        if self.target.as_deref() != Some(container) {
            self.open(container);
        }
        match self.begin_refresh() {
            Some(ticket) => {
                let result = source.fetch_page(&ticket.request);
                self.complete(&ticket, result)
            }
            None => MergeOutcome::Skipped,
        }
    }

    /// Load the next older page of `container` from `source`.
    ///
    /// Skipped when `container` is not the current target.
    pub fn load_older(&mut self, container: &str, source: &dyn LogSource) -> MergeOutcome {
        if self.target.as_deref() != Some(container) {
            tracing::trace!(container, "load older ignored, not the open container");
            return MergeOutcome::Skipped;
        }
        match self.begin_load_older() {
            Some(ticket) => {
                let result = source.fetch_page(&ticket.request);
                self.complete(&ticket, result)
            }
            None => MergeOutcome::Skipped,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Whether a load-older would be issued right now.
    #[must_use]
    pub fn can_load_older(&self) -> bool {
        self.target.is_some()
            && self.loaded
            && self.outstanding.is_none()
            && self.has_more
            && !self.at_ceiling()
    }

    /// Whether the cursor reached the page ceiling.
    #[must_use]
    pub fn at_ceiling(&self) -> bool {
        self.current_page >= self.max_pages
    }

    /// The ordered buffer, oldest first.
    #[must_use]
    pub fn records(&self) -> &[LogRecord] {
        &self.buffer
    }

    #[must_use]
    pub fn pagination(&self) -> PaginationState {
        PaginationState {
            current_page: self.current_page,
            has_more: self.has_more,
            total_count: self.total_count,
            in_flight: self.outstanding.is_some(),
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.outstanding.is_some()
    }

    #[must_use]
    pub fn outstanding(&self) -> Option<&FetchTicket> {
        self.outstanding.as_ref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

/// Length of the longest suffix of `older`, at most `limit` long, whose ids
/// equal a prefix of `head`.
fn seam_overlap(older: &[LogRecord], head: &[LogRecord], limit: usize) -> usize {
    let max = older.len().min(head.len()).min(limit);
    (1..=max)
        .rev()
        .find(|&k| {
            older[older.len() - k..]
                .iter()
                .zip(&head[..k])
                .all(|(a, b)| a.id == b.id)
        })
        .unwrap_or(0)
}
