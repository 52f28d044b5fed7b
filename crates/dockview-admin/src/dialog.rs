#![forbid(unsafe_code)]

//! The container log dialog.
//!
//! Opening the dialog starts a session for one container and fetches its
//! newest page. Scrolling to the very top loads the next older page, and the
//! scroll offset is corrected so the row the user was looking at stays put.
//! Level chips filter the list without touching the buffer.
//!
//! Fetches run as background tasks; their results come back as
//! [`DialogMsg::PageLoaded`] and are applied (or discarded as stale) by the
//! [`LogFetchController`].

use std::fmt::Write as _;
use std::sync::Arc;

use dockview_core::{
    FetchError, FetchKind, FetchTicket, LevelFilter, LoadGate, LogFetchController, LogLevel,
    LogPage, LogRecord, LogSource, MergeOutcome, RowLayout, RowMeasure, ScrollAnchoredLoader,
    ScrollTrigger, ViewerConfig, WrappedRows, display_name, wrap_text,
};
use dockview_runtime::{Cmd, Model};

/// Default dialog size in terminal cells.
pub const DEFAULT_WIDTH: u32 = 100;
pub const DEFAULT_HEIGHT: u32 = 20;

/// Messages handled by [`LogDialog`].
#[derive(Debug)]
pub enum DialogMsg {
    /// Open the dialog for a container (re-opening starts a new session).
    Open(String),
    Close,
    Refresh,
    /// The list was scrolled to an absolute offset.
    Scrolled(u32),
    /// Relative scroll, clamped to the content.
    ScrollBy(i64),
    ScrollToTop,
    ScrollToBottom,
    Resized { width: u32, height: u32 },
    ToggleLevel(LogLevel),
    ResetLevels,
    /// A fetch finished.
    PageLoaded {
        ticket: FetchTicket,
        result: Result<LogPage, FetchError>,
    },
}

/// Log dialog state for one container at a time.
pub struct LogDialog {
    source: Arc<dyn LogSource>,
    controller: LogFetchController,
    loader: ScrollAnchoredLoader,
    filter: LevelFilter,
    initial_filter: LevelFilter,
    layout: RowLayout,
    width: u32,
    name_prefix: Option<String>,
    open: bool,
}

impl LogDialog {
    pub fn new(source: Arc<dyn LogSource>, config: &ViewerConfig) -> Self {
        Self {
            source,
            controller: LogFetchController::new(config),
            loader: ScrollAnchoredLoader::new(DEFAULT_HEIGHT),
            filter: LevelFilter::new(),
            initial_filter: LevelFilter::new(),
            layout: RowLayout::default(),
            width: DEFAULT_WIDTH,
            name_prefix: config.name_prefix.clone(),
            open: false,
        }
    }

    /// Level selection each session starts with.
    #[must_use]
    pub fn with_filter(mut self, filter: LevelFilter) -> Self {
        self.filter = filter;
        self.initial_filter = filter;
        self
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.loader = ScrollAnchoredLoader::new(height);
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn controller(&self) -> &LogFetchController {
        &self.controller
    }

    pub fn loader(&self) -> &ScrollAnchoredLoader {
        &self.loader
    }

    pub fn filter(&self) -> &LevelFilter {
        &self.filter
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// Records passing the level filter, oldest first.
    pub fn visible(&self) -> Vec<&LogRecord> {
        self.filter.visible(self.controller.records()).collect()
    }

    /// Container name as shown in the title.
    pub fn title(&self) -> Option<&str> {
        self.controller
            .target()
            .map(|name| display_name(name, self.name_prefix.as_deref()))
    }

    fn measure(&self) -> WrappedRows {
        WrappedRows::new(self.width, 1)
    }

    fn relayout(&mut self) {
        let measure = self.measure();
        let visible = self.filter.visible(self.controller.records());
        self.layout = RowLayout::compute(visible, &measure, 0, 0);
    }

    fn fetch(&self, ticket: FetchTicket) -> Cmd<DialogMsg> {
        let source = Arc::clone(&self.source);
        let name = match ticket.kind {
            FetchKind::Refresh => "log-refresh",
            FetchKind::LoadOlder => "log-load-older",
        };
        Cmd::task_named(name, move || {
            let result = source.fetch_page(&ticket.request);
            DialogMsg::PageLoaded { ticket, result }
        })
    }

    fn start_refresh(&mut self) -> Cmd<DialogMsg> {
        let Some(ticket) = self.controller.begin_refresh() else {
            return Cmd::none();
        };
        self.loader.reset();
        self.relayout();
        self.fetch(ticket)
    }

    fn on_scroll(&mut self, scroll_top: u32) -> Cmd<DialogMsg> {
        if !self.open {
            return Cmd::none();
        }
        let gate = LoadGate::from(&self.controller);
        let visible: Vec<&LogRecord> = self.filter.visible(self.controller.records()).collect();
        match self.loader.on_scroll(scroll_top, &visible, &self.layout, gate) {
            ScrollTrigger::Idle => Cmd::none(),
            ScrollTrigger::LoadOlder => match self.controller.begin_load_older() {
                Some(ticket) => self.fetch(ticket),
                None => {
                    self.loader.cancel_pending();
                    Cmd::none()
                }
            },
        }
    }

    fn on_page(
        &mut self,
        ticket: &FetchTicket,
        result: Result<LogPage, FetchError>,
    ) -> Cmd<DialogMsg> {
        match self.controller.complete(ticket, result) {
            MergeOutcome::Replaced { .. } => {
                self.relayout();
                self.loader.scroll_to_bottom(&self.layout);
            }
            MergeOutcome::Prepended { added, .. } => {
                let prepended_visible =
                    self.filter.visible_count(&self.controller.records()[..added]);
                self.relayout();
                let visible: Vec<&LogRecord> =
                    self.filter.visible(self.controller.records()).collect();
                if !matches!(
                    self.loader.restore(&visible, &self.layout, prepended_visible),
                    Ok(Some(_))
                ) {
                    self.loader.relayout(&self.layout);
                }
            }
            MergeOutcome::Failed(err) => {
                self.loader.cancel_pending();
                self.relayout();
                self.loader.relayout(&self.layout);
                return Cmd::log(format!("logs: {err}"));
            }
            MergeOutcome::Discarded | MergeOutcome::Skipped => {}
        }
        Cmd::none()
    }

    fn render_header(&self, out: &mut String) {
        let summary = self.filter.summary(self.controller.records());
        let state = self.controller.pagination();
        let _ = writeln!(
            out,
            "Logs: {}  {}  page {}/{}  total {}",
            self.title().unwrap_or("-"),
            summary,
            state.current_page,
            self.controller.max_pages(),
            state.total_count
        );

        let chips: Vec<String> = LogLevel::ALL
            .iter()
            .map(|level| {
                let mark = if self.filter.is_selected(*level) { 'x' } else { ' ' };
                format!("[{mark}] {}", level.badge())
            })
            .collect();
        let _ = writeln!(out, "{}", chips.join("  "));

        if let Some(err) = self.controller.last_error() {
            let _ = writeln!(out, "! {err}");
        } else if state.in_flight && self.controller.records().is_empty() {
            let _ = writeln!(out, "Loading...");
        } else if state.in_flight {
            let _ = writeln!(out, "Loading older logs...");
        } else if self.controller.at_ceiling() && state.has_more {
            let _ = writeln!(out, "Reached the {}-page limit", self.controller.max_pages());
        } else if self.loader.indicator_visible() {
            let _ = writeln!(out, "More logs above, scroll up to load");
        }
    }

    fn render_rows(&self, out: &mut String) {
        let top = self.loader.scroll_top();
        let bottom = top.saturating_add(self.loader.viewport_height());
        for (index, record) in self.filter.visible(self.controller.records()).enumerate() {
            let (Some(row_top), Some(height)) =
                (self.layout.top_of(index), self.layout.height_of(index))
            else {
                break;
            };
            if row_top >= bottom {
                break;
            }
            if row_top.saturating_add(height) <= top {
                continue;
            }
            for (offset, line) in record_rows(record, self.width, height).iter().enumerate() {
                let y = row_top.saturating_add(offset as u32);
                if (top..bottom).contains(&y) {
                    let _ = writeln!(out, "{line}");
                }
            }
        }
    }
}

/// Render one record as exactly `height` rows: a header row, then the
/// message wrapped at `width` display columns.
fn record_rows(record: &LogRecord, width: u32, height: u32) -> Vec<String> {
    let mut rows = vec![format!("{} {:<5}", record.timestamp, record.level_label())];
    rows.extend(wrap_text(&record.message, width.max(1) as usize));
    rows.resize(height as usize, String::new());
    rows
}

impl Model for LogDialog {
    type Message = DialogMsg;

    fn update(&mut self, msg: DialogMsg) -> Cmd<DialogMsg> {
        match msg {
            DialogMsg::Open(container) => {
                self.controller.open(container);
                self.loader.reset();
                self.filter = self.initial_filter;
                self.open = true;
                self.start_refresh()
            }
            DialogMsg::Close => {
                self.controller.close();
                self.loader.reset();
                self.filter = self.initial_filter;
                self.layout = RowLayout::default();
                self.open = false;
                Cmd::none()
            }
            DialogMsg::Refresh if self.open => self.start_refresh(),
            DialogMsg::Refresh => Cmd::none(),
            DialogMsg::Scrolled(y) => self.on_scroll(y),
            DialogMsg::ScrollBy(delta) => {
                let max = i64::from(self.layout.max_scroll(self.loader.viewport_height()));
                let y = (i64::from(self.loader.scroll_top()) + delta).clamp(0, max);
                self.on_scroll(u32::try_from(y).unwrap_or(0))
            }
            DialogMsg::ScrollToTop => self.on_scroll(0),
            DialogMsg::ScrollToBottom => {
                self.loader.scroll_to_bottom(&self.layout);
                Cmd::none()
            }
            DialogMsg::Resized { width, height } => {
                self.width = width.max(1);
                self.relayout();
                self.loader.set_viewport_height(height, &self.layout);
                Cmd::none()
            }
            DialogMsg::ToggleLevel(level) => {
                self.filter.toggle(level);
                self.relayout();
                self.loader.relayout(&self.layout);
                Cmd::none()
            }
            DialogMsg::ResetLevels => {
                self.filter.reset();
                self.relayout();
                self.loader.relayout(&self.layout);
                Cmd::none()
            }
            DialogMsg::PageLoaded { ticket, result } => self.on_page(&ticket, result),
        }
    }

    fn view(&self) -> String {
        if !self.open {
            return String::new();
        }
        let mut out = String::new();
        self.render_header(&mut out);
        let _ = writeln!(out, "{}", "-".repeat(self.width as usize));
        match self.filter.empty_state(self.controller.records()).message() {
            Some(message) if !self.controller.is_loading() => {
                let _ = writeln!(out, "{message}");
            }
            _ => self.render_rows(&mut out),
        }
        out.truncate(out.trim_end_matches('\n').len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockview_core::{LevelSet, RawEntry};

    #[test]
    fn wide_glyph_rows_are_never_truncated() {
        let record = LogRecord::new("t", "界界界", LogLevel::Info);
        let height = WrappedRows::new(3, 1).measure(&record);
        let rows = record_rows(&record, 3, height);
        assert_eq!(rows, vec!["t INFO ", "界", "界", "界"]);
    }

    #[test]
    fn record_rows_match_measured_height() {
        let record = LogRecord::new("2024-01-01T00:00:00Z", "x".repeat(25), LogLevel::Warn);
        let height = WrappedRows::new(10, 1).measure(&record);
        let rows = record_rows(&record, 10, height);
        assert_eq!(rows.len(), height as usize);
        assert_eq!(rows[0], "2024-01-01T00:00:00Z WARN ");
    }

    #[test]
    fn view_shows_empty_filter_state() {
        let source = dockview_core::MemorySource::new().with_container(
            "api",
            vec![RawEntry::new("2024-01-01T00:00:00Z", "boot", Some("info"))],
        );
        let mut dialog = LogDialog::new(Arc::new(source), &ViewerConfig::default())
            .with_filter(LevelFilter::with_selected(LevelSet::ERROR));
        let cmd = dialog.update(DialogMsg::Open("api".into()));
        let Cmd::Task(_, task) = cmd else {
            panic!("expected fetch task");
        };
        let msg = task();
        let _ = dialog.update(msg);
        let view = dialog.view();
        assert!(view.contains("showing 0/1"), "{view}");
        assert!(view.contains("No logs match the selected levels"), "{view}");
    }
}
