//! Severity levels and per-writer level bands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Log severity levels, ordered from most to least verbose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    /// Most verbose, detailed tracing information
    Trace = 0,
    /// Debugging information
    #[default]
    Debug = 1,
    /// General information
    Info = 2,
    /// Warning conditions
    #[serde(alias = "warn")]
    Warning = 3,
    /// Error conditions
    Error = 4,
    /// Unrecoverable conditions
    Fatal = 5,
}

impl LogLevel {
    /// All levels in ascending severity.
    pub const ALL: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Fatal,
    ];

    /// Returns the tag rendered between brackets in log lines.
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Returns the configuration name of this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this level is at least as severe as the given level.
    #[must_use]
    pub fn is_at_least(self, level: Self) -> bool {
        self >= level
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warning,
            4 => Self::Error,
            _ => Self::Fatal,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(LogError::InvalidLevel(other.to_string())),
        }
    }
}

/// Inclusive range of levels a writer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBand {
    /// Least severe accepted level.
    pub floor: LogLevel,
    /// Most severe accepted level.
    pub ceil: LogLevel,
}

impl Default for LevelBand {
    fn default() -> Self {
        Self::ALL
    }
}

impl LevelBand {
    /// A band accepting every level.
    pub const ALL: Self = Self {
        floor: LogLevel::Trace,
        ceil: LogLevel::Fatal,
    };

    /// Creates a band from `floor` to `ceil`, both inclusive.
    #[must_use]
    pub const fn new(floor: LogLevel, ceil: LogLevel) -> Self {
        Self { floor, ceil }
    }

    /// Returns true if `level` falls inside the band.
    #[must_use]
    pub fn contains(&self, level: LogLevel) -> bool {
        level >= self.floor && level <= self.ceil
    }
}
