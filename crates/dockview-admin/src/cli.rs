#![forbid(unsafe_code)]

//! Command-line argument parsing for `dockview`.
//!
//! Parses args by hand. Environment variables (`DOCKVIEW_*`) supply
//! defaults; explicit flags override them.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process;

use dockview_core::{ConfigError, LevelSet, ViewerConfig};

use crate::logging::{LogFormat, Verbosity};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
dockview: container status board and paged log viewer

USAGE:
    dockview [OPTIONS]

OPTIONS:
    --log-dir=DIR        Directory of <container>.log files (required)
    --system=FILE        System snapshot JSON for the status board
    --container=NAME     Open this container's logs on start
    --config=FILE        JSON config file
    --page-size=N        Entries per page (default: 100)
    --max-pages=N        Page ceiling for backward loading (default: 50)
    --prefix=NAME        Deployment prefix stripped from container names
    --levels=LIST        Initially selected levels, e.g. error,warn
    --width=N            Dialog width in columns (default: 100)
    --height=N           Dialog height in rows (default: 20)
    --dump               Print records as JSON lines and exit
    --pages=N            Pages to load with --dump (default: 1)
    --log-json           Emit diagnostics as JSON
    --verbose, -v        Debug diagnostics
    --quiet, -q          Errors only
    --help, -h           Show this help message
    --version, -V        Show version

Commands are read from stdin one per line; type `help` for the list.

ENVIRONMENT VARIABLES:
    DOCKVIEW_LOG_DIR           Default for --log-dir
    DOCKVIEW_SYSTEM_FILE       Default for --system
    DOCKVIEW_CONTAINER         Default for --container
    DOCKVIEW_CONFIG            Default for --config
    DOCKVIEW_PAGE_SIZE, DOCKVIEW_MAX_PAGES, DOCKVIEW_POLL_INTERVAL_MS,
    DOCKVIEW_NAME_PREFIX       Config overrides
    DOCKVIEW_LOG               Diagnostic filter (overrides RUST_LOG)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub log_dir: Option<PathBuf>,
    pub system_file: Option<PathBuf>,
    pub container: Option<String>,
    pub config_file: Option<PathBuf>,
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
    pub prefix: Option<String>,
    pub levels: Option<LevelSet>,
    pub width: u32,
    pub height: u32,
    pub dump: bool,
    /// Pages to load in dump mode.
    pub pages: u32,
    pub verbosity: Verbosity,
    pub log_format: LogFormat,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            log_dir: None,
            system_file: None,
            container: None,
            config_file: None,
            page_size: None,
            max_pages: None,
            prefix: None,
            levels: None,
            width: crate::dialog::DEFAULT_WIDTH,
            height: crate::dialog::DEFAULT_HEIGHT,
            dump: false,
            pages: 1,
            verbosity: Verbosity::Normal,
            log_format: LogFormat::Text,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(Opts),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    InvalidValue { flag: &'static str, value: String },
    Unknown(String),
    Missing(&'static str),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidValue { flag, value } => write!(f, "Invalid {flag} value: {value}"),
            CliError::Unknown(arg) => write!(f, "Unknown argument: {arg}"),
            CliError::Missing(flag) => write!(f, "Missing required {flag}"),
        }
    }
}

impl std::error::Error for CliError {}

fn number<T: std::str::FromStr>(flag: &'static str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::InvalidValue {
        flag,
        value: value.to_string(),
    })
}

fn positive(flag: &'static str, value: &str) -> Result<u32, CliError> {
    match number::<u32>(flag, value)? {
        0 => Err(CliError::InvalidValue {
            flag,
            value: value.to_string(),
        }),
        n => Ok(n),
    }
}

impl Opts {
    /// Parse process arguments and environment, exiting on help, version,
    /// or error.
    pub fn parse() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        match Self::parse_from(&args, |key| env::var(key).ok()) {
            Ok(Invocation::Run(opts)) => opts,
            Ok(Invocation::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Invocation::Version) => {
                println!("dockview {VERSION}");
                process::exit(0);
            }
            Err(err) => {
                eprintln!("{err}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` (without the program name) over env defaults.
    pub fn parse_from(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Invocation, CliError> {
        let mut opts = Self::default();

        // Environment defaults first
        opts.log_dir = env("DOCKVIEW_LOG_DIR").map(PathBuf::from);
        opts.system_file = env("DOCKVIEW_SYSTEM_FILE").map(PathBuf::from);
        opts.container = env("DOCKVIEW_CONTAINER").filter(|c| !c.is_empty());
        opts.config_file = env("DOCKVIEW_CONFIG").map(PathBuf::from);

        let (mut verbose, mut quiet) = (false, false);
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Invocation::Help),
                "--version" | "-V" => return Ok(Invocation::Version),
                "--dump" => opts.dump = true,
                "--log-json" => opts.log_format = LogFormat::Json,
                "--verbose" | "-v" => verbose = true,
                "--quiet" | "-q" => quiet = true,
                other => {
                    let Some((flag, val)) = other.split_once('=') else {
                        return Err(CliError::Unknown(other.to_string()));
                    };
                    match flag {
                        "--log-dir" => opts.log_dir = Some(PathBuf::from(val)),
                        "--system" => opts.system_file = Some(PathBuf::from(val)),
                        "--container" => opts.container = Some(val.to_string()),
                        "--config" => opts.config_file = Some(PathBuf::from(val)),
                        "--page-size" => opts.page_size = Some(positive("--page-size", val)?),
                        "--max-pages" => opts.max_pages = Some(positive("--max-pages", val)?),
                        "--prefix" => opts.prefix = Some(val.to_string()),
                        "--levels" => {
                            opts.levels = Some(LevelSet::parse_list(val).map_err(|_| {
                                CliError::InvalidValue {
                                    flag: "--levels",
                                    value: val.to_string(),
                                }
                            })?);
                        }
                        "--width" => opts.width = positive("--width", val)?,
                        "--height" => opts.height = positive("--height", val)?,
                        "--pages" => opts.pages = positive("--pages", val)?,
                        _ => return Err(CliError::Unknown(other.to_string())),
                    }
                }
            }
        }
        opts.verbosity = Verbosity::from_flags(verbose, quiet);

        if opts.log_dir.is_none() {
            return Err(CliError::Missing("--log-dir"));
        }
        if opts.dump && opts.container.is_none() {
            return Err(CliError::Missing("--container (with --dump)"));
        }
        Ok(Invocation::Run(opts))
    }

    /// Layer config: defaults, then the config file, then `DOCKVIEW_*`
    /// variables, then flags.
    pub fn viewer_config(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ViewerConfig, ConfigError> {
        let base = match &self.config_file {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        let mut config = base.with_env_from(env)?;
        if let Some(n) = self.page_size {
            config.page_size = n;
        }
        if let Some(n) = self.max_pages {
            config.max_pages = n;
        }
        if let Some(prefix) = &self.prefix {
            config.name_prefix = Some(prefix.clone()).filter(|p| !p.is_empty());
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn run(list: &[&str]) -> Opts {
        match Opts::parse_from(&args(list), no_env) {
            Ok(Invocation::Run(opts)) => opts,
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn parses_flags() {
        let opts = run(&[
            "--log-dir=/var/logs",
            "--container=api",
            "--page-size=20",
            "--levels=error,warn",
            "--height=30",
            "-v",
        ]);
        assert_eq!(opts.log_dir, Some(PathBuf::from("/var/logs")));
        assert_eq!(opts.container.as_deref(), Some("api"));
        assert_eq!(opts.page_size, Some(20));
        assert_eq!(opts.levels, Some(LevelSet::ERROR | LevelSet::WARN));
        assert_eq!(opts.height, 30);
        assert_eq!(opts.verbosity, Verbosity::Verbose);
        assert_eq!(opts.width, crate::dialog::DEFAULT_WIDTH);
    }

    #[test]
    fn env_defaults_lose_to_flags() {
        let env = |key: &str| match key {
            "DOCKVIEW_LOG_DIR" => Some("/from/env".to_string()),
            "DOCKVIEW_CONTAINER" => Some("db".to_string()),
            _ => None,
        };
        let Ok(Invocation::Run(opts)) = Opts::parse_from(&args(&["--container=api"]), env) else {
            panic!("expected Run");
        };
        assert_eq!(opts.log_dir, Some(PathBuf::from("/from/env")));
        assert_eq!(opts.container.as_deref(), Some("api"));
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(Opts::parse_from(&args(&["--bogus", "-h"]), no_env), Err(CliError::Unknown("--bogus".into())));
        assert_eq!(Opts::parse_from(&args(&["-h"]), no_env), Ok(Invocation::Help));
        assert_eq!(Opts::parse_from(&args(&["-V"]), no_env), Ok(Invocation::Version));
    }

    #[test]
    fn rejects_bad_values() {
        let err = Opts::parse_from(&args(&["--log-dir=x", "--page-size=0"]), no_env).unwrap_err();
        assert_eq!(err.to_string(), "Invalid --page-size value: 0");
        assert!(Opts::parse_from(&args(&["--log-dir=x", "--levels=loud"]), no_env).is_err());
        assert_eq!(
            Opts::parse_from(&args(&[]), no_env),
            Err(CliError::Missing("--log-dir"))
        );
        assert!(Opts::parse_from(&args(&["--log-dir=x", "--dump"]), no_env).is_err());
    }

    #[test]
    fn config_layers_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"page_size": 10, "max_pages": 5, "name_prefix": "acme-"}}"#).unwrap();

        let mut opts = run(&["--log-dir=x", "--max-pages=7"]);
        opts.config_file = Some(file.path().to_path_buf());
        let env = |key: &str| (key == "DOCKVIEW_PAGE_SIZE").then(|| "25".to_string());
        let config = opts.viewer_config(env).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.max_pages, 7);
        assert_eq!(config.name_prefix.as_deref(), Some("acme-"));
    }

    #[test]
    fn help_text_lists_flags() {
        assert!(!VERSION.is_empty());
        assert!(HELP_TEXT.contains("--log-dir"));
        assert!(HELP_TEXT.contains("DOCKVIEW_LOG"));
    }
}
