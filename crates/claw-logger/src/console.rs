//! Console sink writing rendered records to standard output.

use std::io::{self, Write as _};

use crate::error::Result;
use crate::level::LevelBand;
use crate::record::Record;
use crate::writer::Writer;

/// Writes records to stdout, optionally with ANSI colors.
///
/// Unbuffered beyond what stdout does itself, so it declares neither
/// flush nor rotate capability.
#[derive(Debug, Clone, Default)]
pub struct ConsoleWriter {
    color: bool,
    band: LevelBand,
}

impl ConsoleWriter {
    /// Creates a plain console writer accepting every level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables ANSI colors.
    #[must_use]
    pub const fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Restricts the writer to `band`.
    #[must_use]
    pub const fn with_band(mut self, band: LevelBand) -> Self {
        self.band = band;
        self
    }

    /// Enables or disables ANSI colors.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Whether output is colored.
    #[must_use]
    pub const fn color(&self) -> bool {
        self.color
    }

    /// Renders `record` the way this writer prints it, or `None` if filtered out.
    #[must_use]
    pub fn render(&self, record: &Record) -> Option<String> {
        if !self.band.contains(record.level()) {
            return None;
        }
        Some(if self.color {
            record.colored().to_string()
        } else {
            record.to_string()
        })
    }
}

impl Writer for ConsoleWriter {
    fn name(&self) -> String {
        "console".to_string()
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        if let Some(line) = self.render(record) {
            io::stdout().lock().write_all(line.as_bytes())?;
        }
        Ok(())
    }
}
