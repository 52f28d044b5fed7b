#![forbid(unsafe_code)]

//! Dockview Core
//!
//! State machines behind the container log viewer: paged backward log
//! retrieval, scroll-anchored loading, level filtering, and container status
//! classification. Nothing here blocks on a UI or a clock; the runtime crate
//! drives these types from its update loop.
//!
//! # Key Components
//!
//! - [`LogFetchController`] - Page cursor, in-flight guard, and ordered buffer
//! - [`ScrollAnchoredLoader`] - Top-of-list trigger and anchor restoration
//! - [`LevelFilter`] - Severity selection over the buffer
//! - [`RowLayout`] - Row positions for anchor math
//! - [`LogSource`] / [`SystemSource`] - Fetch collaborators
//! - [`ViewerConfig`] - Page size, ceiling, poll interval

pub mod anchor;
pub mod config;
pub mod controller;
pub mod filter;
pub mod layout;
pub mod level;
pub mod record;
pub mod source;
pub mod status;

pub use anchor::{AnchorLost, LoadGate, ScrollAnchor, ScrollAnchoredLoader, ScrollTrigger};
pub use config::{ConfigError, ViewerConfig};
pub use controller::{FetchKind, FetchTicket, LogFetchController, MergeOutcome, PaginationState};
pub use filter::{EmptyState, FilterSummary, LevelFilter};
pub use layout::{FixedRowHeight, RowLayout, RowMeasure, WrappedRows, wrap_text};
pub use level::{LevelSet, LogLevel};
pub use record::{LogRecord, RawEntry};
pub use source::{FetchError, LogDirSource, LogPage, LogSource, MemorySource, PageRequest};
pub use status::{
    ContainerStatus, MemorySystemSource, StatusIndicator, SystemFileSource, SystemSnapshot,
    SystemSource, display_name,
};
