//! Log records and their rendered line format.
//!
//! This module provides:
//! - [`Record`]: one captured log event
//! - [`Colored`]: ANSI-colored rendering of a record for terminals
//! - [`TimestampCache`]: per-second cache of the formatted timestamp

use std::fmt::{self, Write as _};
use std::panic::Location;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use crate::error::{LogError, Result};
use crate::level::LogLevel;

/// Default timestamp layout, in chrono strftime syntax.
pub const DEFAULT_TIME_LAYOUT: &str = "%Y/%m/%d %H:%M:%S";

/// One log event.
///
/// Records are recycled through [`RecordPool`](crate::pool::RecordPool);
/// every field is overwritten each time a record is handed to a producer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    timestamp: String,
    location: String,
    message: String,
    level: LogLevel,
}

impl Record {
    /// Creates a record from its parts.
    #[must_use]
    pub fn new(
        level: LogLevel,
        timestamp: impl Into<String>,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            location: location.into(),
            message: message.into(),
            level,
        }
    }

    /// Severity of the event.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Formatted wall-clock time the event was emitted at.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// `file:line` of the emitting call site.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The formatted message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a view that renders the record with ANSI colors.
    #[must_use]
    pub const fn colored(&self) -> Colored<'_> {
        Colored(self)
    }

    /// Overwrites level, location and message, reusing the string buffers.
    ///
    /// The timestamp is set separately with [`Self::set_timestamp`].
    pub(crate) fn fill(&mut self, level: LogLevel, location: &Location<'_>, args: fmt::Arguments<'_>) {
        self.level = level;

        self.location.clear();
        let _ = write!(
            self.location,
            "{}:{}",
            file_basename(location.file()),
            location.line()
        );

        self.message.clear();
        let _ = self.message.write_fmt(args);
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: &str) {
        self.timestamp.clear();
        self.timestamp.push_str(timestamp);
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{}][{}][{}] {}",
            self.level.flag(),
            self.timestamp,
            self.location,
            self.message
        )
    }
}

/// ANSI-colored rendering of a [`Record`].
///
/// Keeps the plain `[LEVEL][time][file:line] message` field order; only
/// escape codes are added around the level, time and location.
#[derive(Debug, Clone, Copy)]
pub struct Colored<'a>(&'a Record);

const RESET: &str = "\x1b[0m";
const TIME_COLOR: &str = "\x1b[36m";
const LOCATION_COLOR: &str = "\x1b[47;30m";

const fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace | LogLevel::Debug => "\x1b[34m",
        LogLevel::Info => "\x1b[32m",
        LogLevel::Warning => "\x1b[33m",
        LogLevel::Error => "\x1b[31m",
        LogLevel::Fatal => "\x1b[35m",
    }
}

impl fmt::Display for Colored<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;
        writeln!(
            f,
            "[{}{}{RESET}][{TIME_COLOR}{}{RESET}][{LOCATION_COLOR}{}{RESET}] {}",
            level_color(record.level),
            record.level.flag(),
            record.timestamp,
            record.location,
            record.message
        )
    }
}

fn file_basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Checks that `layout` only uses strftime directives chrono understands.
///
/// # Errors
///
/// Returns [`LogError::InvalidTimeLayout`] on an unsupported directive.
pub fn validate_time_layout(layout: &str) -> Result<()> {
    if StrftimeItems::new(layout).any(|item| matches!(item, Item::Error)) {
        return Err(LogError::InvalidTimeLayout(layout.to_string()));
    }
    Ok(())
}

/// Caches the formatted timestamp for the current wall-clock second.
///
/// Records emitted within the same second share one formatted string;
/// ordering inside a second comes from queue order, not from the timestamp.
#[derive(Debug, Clone)]
pub struct TimestampCache {
    layout: String,
    second: Option<i64>,
    rendered: String,
}

impl Default for TimestampCache {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_LAYOUT)
    }
}

impl TimestampCache {
    /// Creates an empty cache for `layout`.
    #[must_use]
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
            second: None,
            rendered: String::new(),
        }
    }

    /// The layout in use.
    #[must_use]
    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Replaces the layout and drops the cached string.
    pub fn set_layout(&mut self, layout: impl Into<String>) {
        self.layout = layout.into();
        self.second = None;
    }

    /// Returns the formatted timestamp for `now`, formatting at most once per second.
    pub fn stamp(&mut self, now: DateTime<Local>) -> &str {
        let second = now.timestamp();
        if self.second != Some(second) {
            self.rendered.clear();
            if write!(self.rendered, "{}", now.format(&self.layout)).is_err() {
                self.rendered.clear();
                self.rendered.push_str(&now.to_rfc3339());
            }
            self.second = Some(second);
        }
        &self.rendered
    }
}
