#![forbid(unsafe_code)]

//! Tracing subscriber setup for the `dockview` binary.
//!
//! Logs go to stderr so they never interleave with the rendered view on
//! stdout.
//!
//! # Filter priority (highest to lowest)
//!
//! 1. `DOCKVIEW_LOG` (per-target directives, e.g. `dockview_core=debug,warn`)
//! 2. `RUST_LOG`
//! 3. CLI flags (`-v` → debug, `-q` → error)
//! 4. Default level: `info`

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Verbosity derived from CLI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are given.
    #[must_use]
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter directive string after applying the priority chain.
///
/// Unparseable env values fall through to the next source.
pub fn filter_directive(verbosity: Verbosity, env: impl Fn(&str) -> Option<String>) -> String {
    for var in ["DOCKVIEW_LOG", "RUST_LOG"] {
        if let Some(directives) = env(var).filter(|d| !d.trim().is_empty())
            && EnvFilter::try_new(&directives).is_ok()
        {
            return directives;
        }
    }
    let level = verbosity.default_level();
    if verbosity == Verbosity::Verbose {
        format!("{level},dockview_core=debug,dockview_runtime=debug,dockview_admin=debug")
    } else {
        level.to_string()
    }
}

/// Install the global subscriber.
///
/// Returns an error if one is already installed.
pub fn init_subscriber(
    verbosity: Verbosity,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directive = filter_directive(verbosity, |var| std::env::var(var).ok());
    let filter = EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_level().as_str()));
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text if verbosity == Verbosity::Verbose => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_ansi)
                    .with_timer(fmt::time::uptime()),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_ansi)
                    .without_time()
                    .compact(),
            )
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn verbosity_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::Normal.default_level(), Level::INFO);
    }

    #[test]
    fn project_var_beats_rust_log() {
        let directive = filter_directive(
            Verbosity::Normal,
            env(&[("DOCKVIEW_LOG", "dockview_core=trace"), ("RUST_LOG", "warn")]),
        );
        assert_eq!(directive, "dockview_core=trace");
    }

    #[test]
    fn falls_back_to_flags() {
        assert_eq!(filter_directive(Verbosity::Quiet, env(&[])), "ERROR");
        assert_eq!(filter_directive(Verbosity::Normal, env(&[("RUST_LOG", "  ")])), "INFO");
        assert!(filter_directive(Verbosity::Verbose, env(&[])).contains("dockview_core=debug"));
    }
}
