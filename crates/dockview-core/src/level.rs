#![forbid(unsafe_code)]

//! Log severity levels and the selection set used by the level filter.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Severity of a normalized log record.
///
/// `Undefined` is a real member of the domain: records whose source carried
/// no recognizable severity land here instead of being guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Undefined,
}

impl LogLevel {
    /// All levels in filter-chip order.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Undefined,
    ];

    /// Classify a severity label.
    ///
    /// Matching is ASCII case-insensitive and ignores surrounding whitespace.
    /// `warning` is accepted for `warn`. Anything else is `Undefined`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("error") {
            Self::Error
        } else if label.eq_ignore_ascii_case("warn") || label.eq_ignore_ascii_case("warning") {
            Self::Warn
        } else if label.eq_ignore_ascii_case("info") {
            Self::Info
        } else if label.eq_ignore_ascii_case("debug") {
            Self::Debug
        } else {
            Self::Undefined
        }
    }

    /// Lowercase name, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Undefined => "undefined",
        }
    }

    /// Short uppercase badge text.
    #[must_use]
    pub const fn badge(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Undefined => "UNDEF",
        }
    }

    /// The single-member set for this level.
    #[must_use]
    pub const fn bit(self) -> LevelSet {
        match self {
            Self::Error => LevelSet::ERROR,
            Self::Warn => LevelSet::WARN,
            Self::Info => LevelSet::INFO,
            Self::Debug => LevelSet::DEBUG,
            Self::Undefined => LevelSet::UNDEFINED,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// A set of selected severities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LevelSet: u8 {
        const ERROR = 0b0000_0001;
        const WARN = 0b0000_0010;
        const INFO = 0b0000_0100;
        const DEBUG = 0b0000_1000;
        const UNDEFINED = 0b0001_0000;
    }
}

impl Default for LevelSet {
    fn default() -> Self {
        Self::all()
    }
}

impl LevelSet {
    /// Whether `level` is selected.
    #[inline]
    #[must_use]
    pub fn includes(self, level: LogLevel) -> bool {
        self.contains(level.bit())
    }

    /// Parse a comma-separated list of level names (`"error,warn"`).
    ///
    /// Unknown names are returned as the error.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let mut set = Self::empty();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let level = match part.to_ascii_lowercase().as_str() {
                "undefined" | "undef" => LogLevel::Undefined,
                other => match LogLevel::from_label(other) {
                    LogLevel::Undefined => return Err(part.to_string()),
                    level => level,
                },
            };
            set |= level.bit();
        }
        Ok(set)
    }

    /// Iterate the selected levels in filter-chip order.
    pub fn levels(self) -> impl Iterator<Item = LogLevel> {
        LogLevel::ALL.into_iter().filter(move |l| self.includes(*l))
    }
}

impl FromIterator<LogLevel> for LevelSet {
    fn from_iter<I: IntoIterator<Item = LogLevel>>(iter: I) -> Self {
        iter.into_iter()
            .fold(LevelSet::empty(), |acc, level| acc | level.bit())
    }
}
