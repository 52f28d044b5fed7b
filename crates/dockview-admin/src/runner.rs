#![forbid(unsafe_code)]

//! Wiring for the `dockview` binary: sources, the interactive program, and
//! the non-interactive dump mode.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use dockview_core::{
    ConfigError, ContainerStatus, FetchError, LevelFilter, LogDirSource, LogFetchController,
    LogSource, MemorySystemSource, MergeOutcome, SystemFileSource, SystemSnapshot, SystemSource,
    ViewerConfig,
};
use dockview_runtime::{Program, ProgramConfig};

use crate::app::{AppModel, AppMsg};
use crate::cli::Opts;
use crate::dialog::{DialogMsg, LogDialog};
use crate::status_board::StatusBoard;

#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Fetch(FetchError),
    Io(io::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "{e}"),
            RunError::Fetch(e) => write!(f, "{e}"),
            RunError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(e) => Some(e),
            RunError::Fetch(e) => Some(e),
            RunError::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<FetchError> for RunError {
    fn from(e: FetchError) -> Self {
        RunError::Fetch(e)
    }
}

impl From<io::Error> for RunError {
    fn from(e: io::Error) -> Self {
        RunError::Io(e)
    }
}

/// Snapshot listing every `<name>.log` in `dir`, for running without a
/// system file. Status is unknown for all of them.
pub fn discover_containers(dir: &Path) -> io::Result<SystemSnapshot> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "log") {
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            } else {
                None
            }
        })
        .collect();
    names.sort();
    Ok(SystemSnapshot {
        components: names
            .into_iter()
            .map(|name| ContainerStatus::new(name, ""))
            .collect(),
    })
}

/// Load up to `pages` pages of `container` and write the records that pass
/// `filter` as JSON lines, oldest first. Returns how many were written.
pub fn dump_records(
    source: &dyn LogSource,
    config: &ViewerConfig,
    container: &str,
    pages: u32,
    filter: LevelFilter,
    out: &mut impl Write,
) -> Result<usize, RunError> {
    let mut controller = LogFetchController::new(config);
    if let MergeOutcome::Failed(err) = controller.refresh(container, source) {
        return Err(err.into());
    }
    for _ in 1..pages {
        if !controller.can_load_older() {
            break;
        }
        if let MergeOutcome::Failed(err) = controller.load_older(container, source) {
            return Err(err.into());
        }
    }
    tracing::info!(
        container,
        pages = controller.pagination().current_page,
        records = controller.records().len(),
        "dump loaded"
    );

    let mut written = 0;
    for record in filter.visible(controller.records()) {
        let line = serde_json::to_string(record).map_err(io::Error::other)?;
        writeln!(out, "{line}")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

/// Run the binary with parsed options.
pub fn run(opts: &Opts) -> Result<(), RunError> {
    let config = opts.viewer_config(|key| std::env::var(key).ok())?;
    let Some(log_dir) = opts.log_dir.as_deref() else {
        return Err(RunError::Config(ConfigError::Invalid {
            key: "log_dir",
            reason: "no log directory given".into(),
        }));
    };
    let logs: Arc<dyn LogSource> = Arc::new(LogDirSource::new(log_dir));
    let filter = opts.levels.map_or_else(LevelFilter::new, LevelFilter::with_selected);

    if opts.dump {
        let container = opts.container.as_deref().unwrap_or_default();
        let mut stdout = io::stdout().lock();
        dump_records(logs.as_ref(), &config, container, opts.pages, filter, &mut stdout)?;
        return Ok(());
    }

    let system: Arc<dyn SystemSource> = match &opts.system_file {
        Some(path) => Arc::new(SystemFileSource::new(path)),
        None => Arc::new(MemorySystemSource::new(discover_containers(log_dir)?)),
    };
    tracing::info!(
        log_dir = %log_dir.display(),
        page_size = config.page_size,
        max_pages = config.max_pages,
        "starting dockview"
    );

    let board = StatusBoard::new(system, &config);
    let dialog = LogDialog::new(logs, &config)
        .with_filter(filter)
        .with_size(opts.width, opts.height);
    let mut app = AppModel::new(board, dialog);
    if opts.container.is_some() {
        app = app.without_board();
    }

    let mut program = Program::new(app, ProgramConfig::default());
    let sender = program.sender();
    if let Some(container) = &opts.container {
        let _ = sender.send(AppMsg::Dialog(DialogMsg::Open(container.clone())));
    }
    thread::Builder::new()
        .name("dockview-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if sender.send(AppMsg::Command(line)).is_err() {
                    return;
                }
            }
            let _ = sender.send(AppMsg::Quit);
        })?;

    program.run()?;
    Ok(())
}
