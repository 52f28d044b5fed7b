#![forbid(unsafe_code)]

//! Dockview Admin
//!
//! The terminal front end: a container status board that polls on an
//! interval, and a log dialog with backward pagination, scroll anchoring,
//! and level filtering. Both are [`Model`](dockview_runtime::Model)s
//! composed into [`app::AppModel`] and driven by line commands.

pub mod app;
pub mod cli;
pub mod dialog;
pub mod logging;
pub mod runner;
pub mod status_board;

pub use app::{AppModel, AppMsg, Command, parse_command};
pub use dialog::{DialogMsg, LogDialog};
pub use status_board::{BoardMsg, STATUS_POLL_ID, StatusBoard};
