#![forbid(unsafe_code)]

//! Log page sources.
//!
//! A [`LogSource`] answers page requests for one container at a time. Page 1
//! is the newest block of `page_size` entries, page 2 the block before it, and
//! so on; entries inside a page are oldest first. The log viewer never
//! re-sorts inside a page.
//!
//! # Backends
//!
//! | Source | Backing | Use |
//! |--------|---------|-----|
//! | [`MemorySource`] | in-memory entries, injectable failures | tests, demos |
//! | [`LogDirSource`] | `<dir>/<container>.log` text files | CLI |
//!
//! # Failure Modes
//!
//! | Failure | Cause | Error |
//! |---------|-------|-------|
//! | page 0 or page size 0 | caller bug | [`FetchError::InvalidRequest`] |
//! | unknown container | missing entry or file | [`FetchError::NotFound`] |
//! | I/O failure | unreadable file | [`FetchError::Transport`] |
//! | bad response body | wire decode | [`FetchError::Decode`] |

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::record::RawEntry;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// A failed page fetch. Always retryable from the viewer's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network, HTTP, or file I/O failure.
    Transport(String),
    /// Response body could not be decoded.
    Decode(String),
    /// The request itself was invalid (page 0, bad container name).
    InvalidRequest(String),
    /// The source has no such container.
    NotFound(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "failed to fetch logs: {msg}"),
            FetchError::Decode(msg) => write!(f, "failed to decode log response: {msg}"),
            FetchError::InvalidRequest(msg) => write!(f, "invalid log request: {msg}"),
            FetchError::NotFound(name) => write!(f, "container not found: {name}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<io::Error> for FetchError {
    fn from(e: io::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters of a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub container: String,
    /// 1-based page number; 1 is the newest page.
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    #[must_use]
    pub fn new(container: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            container: container.into(),
            page,
            page_size,
        }
    }

    /// Reject requests no source can answer.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.page == 0 {
            return Err(FetchError::InvalidRequest("page numbers start at 1".into()));
        }
        if self.page_size == 0 {
            return Err(FetchError::InvalidRequest("page size must be positive".into()));
        }
        if self.container.is_empty() {
            return Err(FetchError::InvalidRequest("container name is empty".into()));
        }
        Ok(())
    }

    /// Index range of this page within `total` chronologically ordered
    /// entries, and whether older entries remain before it.
    #[must_use]
    pub fn window(&self, total: usize) -> (Range<usize>, bool) {
        let size = self.page_size as usize;
        let skipped = (self.page.saturating_sub(1) as usize).saturating_mul(size);
        let end = total.saturating_sub(skipped);
        let start = end.saturating_sub(size);
        (start..end, start > 0)
    }
}

/// One fetched page.
///
/// Deserializes from the endpoint's wire form:
/// `{"logs": [...], "total": 1234, "has_more": true}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    #[serde(rename = "logs", default)]
    pub entries: Vec<RawEntry>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
}

impl LogPage {
    /// Decode a response body.
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Slice a page out of chronologically ordered entries.
    #[must_use]
    pub fn slice(entries: &[RawEntry], request: &PageRequest) -> Self {
        let (range, has_more) = request.window(entries.len());
        Self {
            entries: entries[range].to_vec(),
            total: entries.len() as u64,
            has_more,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Source Trait
// ─────────────────────────────────────────────────────────────────────────────

/// The page-fetch collaborator behind the log viewer.
///
/// Implementations must be `Send + Sync`: fetches run on background tasks.
pub trait LogSource: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Fetch one page of logs.
    fn fetch_page(&self, request: &PageRequest) -> Result<LogPage, FetchError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Source
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory log source.
///
/// Entries can be appended while a viewer is paging (to model a live
/// container) and failures can be queued to exercise error paths.
#[derive(Debug, Default)]
pub struct MemorySource {
    containers: RwLock<HashMap<String, Vec<RawEntry>>>,
    failures: Mutex<VecDeque<FetchError>>,
    calls: AtomicUsize,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a container with chronologically ordered entries.
    #[must_use]
    pub fn with_container(self, name: impl Into<String>, entries: Vec<RawEntry>) -> Self {
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), entries);
        self
    }

    /// Append a newer entry to a container, creating it if needed.
    pub fn push(&self, container: &str, entry: RawEntry) {
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(container.to_string())
            .or_default()
            .push(entry);
    }

    /// Make the next fetch fail with `error`. Queued failures are consumed in
    /// order, one per fetch.
    pub fn fail_next(&self, error: FetchError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Number of fetches served, including failed ones.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LogSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch_page(&self, request: &PageRequest) -> Result<LogPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        request.validate()?;
        if let Some(err) = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Err(err);
        }

        let containers = self.containers.read().unwrap_or_else(PoisonError::into_inner);
        let entries = containers
            .get(&request.container)
            .ok_or_else(|| FetchError::NotFound(request.container.clone()))?;
        Ok(LogPage::slice(entries, request))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory Source
// ─────────────────────────────────────────────────────────────────────────────

/// Serves `<dir>/<container>.log`, one raw log line per entry.
///
/// The file is re-read on every fetch, so lines appended between fetches
/// shift older pages the same way a live endpoint does.
#[derive(Debug, Clone)]
pub struct LogDirSource {
    dir: PathBuf,
}

impl LogDirSource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, container: &str) -> Result<PathBuf, FetchError> {
        let valid = container
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !container.starts_with('.');
        if !valid {
            return Err(FetchError::InvalidRequest(format!(
                "container name {container:?} is not a plain file name"
            )));
        }
        Ok(self.dir.join(format!("{container}.log")))
    }
}

impl LogSource for LogDirSource {
    fn name(&self) -> &str {
        "log-dir"
    }

    fn fetch_page(&self, request: &PageRequest) -> Result<LogPage, FetchError> {
        request.validate()?;
        let path = self.path_for(&request.container)?;
        // Invalid UTF-8 is replaced per byte so one bad line never hides the file.
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(request.container.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let content = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let (range, has_more) = request.window(lines.len());
        Ok(LogPage {
            entries: lines[range].iter().map(|l| RawEntry::line(*l)).collect(),
            total: lines.len() as u64,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entries(n: usize) -> Vec<RawEntry> {
        (0..n)
            .map(|i| RawEntry::new(format!("t{i:03}"), format!("line {i}"), Some("info")))
            .collect()
    }

    #[test]
    fn window_pages_backward_from_newest() {
        let req = PageRequest::new("c", 1, 100);
        assert_eq!(req.window(250), (150..250, true));
        let req = PageRequest::new("c", 2, 100);
        assert_eq!(req.window(250), (50..150, true));
        let req = PageRequest::new("c", 3, 100);
        assert_eq!(req.window(250), (0..50, false));
        let req = PageRequest::new("c", 4, 100);
        assert_eq!(req.window(250), (0..0, false));
    }

    #[test]
    fn window_exact_multiple_has_no_more() {
        let req = PageRequest::new("c", 2, 100);
        assert_eq!(req.window(200), (0..100, false));
    }

    #[test]
    fn validate_rejects_page_zero() {
        let err = PageRequest::new("c", 0, 100).validate().unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
        assert!(PageRequest::new("c", 1, 0).validate().is_err());
        assert!(PageRequest::new("", 1, 10).validate().is_err());
    }

    #[test]
    fn memory_source_serves_pages() {
        let source = MemorySource::new().with_container("api", entries(5));
        let page = source.fetch_page(&PageRequest::new("api", 1, 2)).unwrap();
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        let messages: Vec<_> = page.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["line 3", "line 4"]);
    }

    #[test]
    fn memory_source_unknown_container() {
        let source = MemorySource::new();
        let err = source.fetch_page(&PageRequest::new("nope", 1, 10)).unwrap_err();
        assert_eq!(err, FetchError::NotFound("nope".into()));
        assert_eq!(err.to_string(), "container not found: nope");
    }

    #[test]
    fn memory_source_injected_failures_are_consumed() {
        let source = MemorySource::new().with_container("api", entries(1));
        source.fail_next(FetchError::Transport("boom".into()));
        let req = PageRequest::new("api", 1, 10);
        assert!(source.fetch_page(&req).is_err());
        assert!(source.fetch_page(&req).is_ok());
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn log_page_decodes_wire_form() {
        let body = r#"{"logs":[{"timestamp":"t","message":"m","level":"warn"}],"total":7,"has_more":true}"#;
        let page = LogPage::from_json(body).unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.total, 7);
        assert!(page.has_more);

        let page = LogPage::from_json("{}").unwrap();
        assert!(page.entries.is_empty());
        assert!(!page.has_more);

        let err = LogPage::from_json("not json").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn log_dir_source_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("worker.log")).unwrap();
        for i in 0..5 {
            writeln!(file, "2024-01-01 00:00:0{i} step {i}").unwrap();
        }
        writeln!(file).unwrap();

        let source = LogDirSource::new(dir.path());
        let page = source.fetch_page(&PageRequest::new("worker", 1, 3)).unwrap();
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        assert_eq!(page.entries[0].message, "2024-01-01 00:00:02 step 2");

        let page = source.fetch_page(&PageRequest::new("worker", 2, 3)).unwrap();
        assert_eq!(page.entries.len(), 2);
        assert!(!page.has_more);
    }

    #[test]
    fn log_dir_source_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("api.log"),
            b"2024-01-01 00:00:00 first\n2024-01-01 00:00:01 bad \xff byte\n2024-01-01 00:00:02 last\n",
        )
        .unwrap();

        let source = LogDirSource::new(dir.path());
        let page = source.fetch_page(&PageRequest::new("api", 1, 10)).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.entries[1].message, "2024-01-01 00:00:01 bad \u{fffd} byte");
        assert_eq!(page.entries[2].message, "2024-01-01 00:00:02 last");
    }

    #[test]
    fn log_dir_source_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let source = LogDirSource::new(dir.path());
        let err = source.fetch_page(&PageRequest::new("../etc", 1, 3)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
        let err = source.fetch_page(&PageRequest::new("missing", 1, 3)).unwrap_err();
        assert_eq!(err, FetchError::NotFound("missing".into()));
    }
}
