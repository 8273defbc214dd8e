//! Logger configuration.
//!
//! The structures deserialize from any serde format. [`setup`] turns a
//! [`LogConfig`] into registered writers on a [`Logger`]; any error it
//! returns is a configuration error and should abort startup.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::console::ConsoleWriter;
use crate::error::Result;
use crate::file::FileWriter;
use crate::level::{LevelBand, LogLevel};
use crate::logger::Logger;
use crate::record::validate_time_layout;

/// Default level name.
pub const DEFAULT_LEVEL: &str = "debug";

/// Complete logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level: trace, debug, info, warning (or warn), error, fatal.
    pub level: String,
    /// File sinks.
    pub file_writer: FileWriterConfig,
    /// Console sink.
    pub console_writer: ConsoleWriterConfig,
    /// Timestamp layout in chrono strftime syntax.
    pub time_layout: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            file_writer: FileWriterConfig::default(),
            console_writer: ConsoleWriterConfig::default(),
            time_layout: None,
        }
    }
}

/// Primary and overflow file sinks.
///
/// With an overflow path, the primary file takes TRACE..INFO and the
/// overflow file WARNING..ERROR. Without one, the primary file takes
/// TRACE..ERROR. FATAL records reach only the console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWriterConfig {
    /// Enables the file sinks.
    pub enabled: bool,
    /// Live path of the primary file.
    pub path: String,
    /// Live path of the overflow file; empty disables it.
    pub overflow_path: String,
    /// Rotation pattern of the primary file; empty disables rotation.
    pub rotate_path_pattern: String,
    /// Rotation pattern of the overflow file; empty disables rotation.
    pub overflow_rotate_path_pattern: String,
}

/// Standard output sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleWriterConfig {
    /// Enables the console sink.
    pub enabled: bool,
    /// Renders lines with ANSI colors.
    pub color: bool,
}

impl LogConfig {
    /// Parses the configured level.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidLevel`](crate::LogError::InvalidLevel) on
    /// an unknown name.
    pub fn parse_level(&self) -> Result<LogLevel> {
        self.level.parse()
    }
}

impl FileWriterConfig {
    fn primary(&self) -> Option<Result<FileWriter>> {
        if !self.enabled || self.path.is_empty() {
            return None;
        }
        let ceil = if self.overflow_path.is_empty() {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        Some(
            FileWriter::new(&self.path)
                .with_band(LevelBand::new(LogLevel::Trace, ceil))
                .with_path_pattern(&self.rotate_path_pattern),
        )
    }

    fn overflow(&self) -> Option<Result<FileWriter>> {
        if !self.enabled || self.overflow_path.is_empty() {
            return None;
        }
        Some(
            FileWriter::new(&self.overflow_path)
                .with_band(LevelBand::new(LogLevel::Warning, LogLevel::Error))
                .with_path_pattern(&self.overflow_rotate_path_pattern),
        )
    }
}

/// Applies `config` to `logger`.
///
/// Everything that can be validated up front (level, time layout, rotation
/// patterns) is validated before any writer is registered.
///
/// # Errors
///
/// Returns the first configuration error: an unknown level, an invalid
/// time layout, an invalid rotation pattern, or a writer that cannot open
/// its file.
pub fn setup(logger: &Logger, config: &LogConfig) -> Result<()> {
    let level = config.parse_level()?;
    if let Some(layout) = &config.time_layout {
        validate_time_layout(layout)?;
    }

    let primary = config.file_writer.primary().transpose()?;
    let overflow = config.file_writer.overflow().transpose()?;

    for writer in [primary, overflow].into_iter().flatten() {
        logger.register(writer)?;
    }
    if config.console_writer.enabled {
        logger.register(ConsoleWriter::new().with_color(config.console_writer.color))?;
    }

    logger.set_level(level);
    if let Some(layout) = &config.time_layout {
        logger.set_time_layout(layout)?;
    }

    info!(
        level = %level,
        file = config.file_writer.enabled,
        console = config.console_writer.enabled,
        "logger configured"
    );
    Ok(())
}
