//! Buffered file sink with time-based rotation.
//!
//! The live file always keeps its configured path. When the rotation
//! pattern's time bucket changes, the live file is renamed to the pattern
//! rendered with the previous bucket's values and a fresh file is opened
//! at the configured path.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::{LogError, Result};
use crate::level::{LevelBand, LogLevel};
use crate::pattern::PathPattern;
use crate::record::Record;
use crate::writer::{Flusher, Rotator, Writer};

/// Size of the in-memory buffer in front of the file.
pub const BUFFER_SIZE: usize = 8 * 1024;

/// A file sink accepting records inside its level band.
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    band: LevelBand,
    pattern: Option<PathPattern>,
    out: Option<BufWriter<File>>,
    initialized: bool,
}

impl FileWriter {
    /// Creates a writer for `path` accepting every level, without rotation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            band: LevelBand::ALL,
            pattern: None,
            out: None,
            initialized: false,
        }
    }

    /// Restricts the writer to `band`.
    #[must_use]
    pub const fn with_band(mut self, band: LevelBand) -> Self {
        self.band = band;
        self
    }

    /// Uses an already compiled rotation pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: PathPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Compiles `pattern` and uses it for rotation.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidPattern`] if the pattern does not compile.
    pub fn with_path_pattern(mut self, pattern: &str) -> Result<Self> {
        self.set_path_pattern(pattern)?;
        Ok(self)
    }

    /// Sets the least severe accepted level.
    pub fn set_level_floor(&mut self, floor: LogLevel) {
        self.band.floor = floor;
    }

    /// Sets the most severe accepted level.
    pub fn set_level_ceil(&mut self, ceil: LogLevel) {
        self.band.ceil = ceil;
    }

    /// Compiles and installs a rotation pattern. An empty pattern disables rotation.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidPattern`] if the pattern does not compile.
    pub fn set_path_pattern(&mut self, pattern: &str) -> Result<()> {
        self.pattern = if pattern.is_empty() {
            None
        } else {
            Some(PathPattern::compile(pattern, Local::now())?)
        };
        Ok(())
    }

    /// The live file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The accepted level band.
    #[must_use]
    pub const fn band(&self) -> LevelBand {
        self.band
    }

    /// The installed rotation pattern, if any.
    #[must_use]
    pub const fn pattern(&self) -> Option<&PathPattern> {
        self.pattern.as_ref()
    }

    /// Creates parent directories and opens the live file for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the file cannot be created.
    pub fn create_file(&mut self) -> Result<()> {
        ensure_parent(&self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.out = Some(BufWriter::with_capacity(BUFFER_SIZE, file));
        self.initialized = true;
        Ok(())
    }

    /// Rotates against the given clock reading.
    ///
    /// The pattern moves to the new bucket only once the live file has been
    /// archived, so a failed attempt is repeated with the same archive name
    /// on the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing, renaming or reopening fails. A failed
    /// rename leaves the live file open at its configured path.
    pub fn rotate_at(&mut self, now: DateTime<Local>) -> Result<()> {
        let Some(boundary) = self.pattern.as_ref().and_then(|p| p.boundary(now)) else {
            return Ok(());
        };

        if let Some(mut out) = self.out.take() {
            if let Err(err) = out.flush() {
                self.out = Some(out);
                return Err(err.into());
            }
        }

        let archive = PathBuf::from(boundary.archive());
        let renamed = ensure_parent(&archive).and_then(|()| {
            fs::rename(&self.path, &archive)?;
            Ok(())
        });
        if renamed.is_ok() {
            if let Some(pattern) = self.pattern.as_mut() {
                pattern.commit(boundary);
            }
        }
        self.create_file()?;
        renamed?;

        debug!(live = %self.path.display(), archive = %archive.display(), "rotated log file");
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

impl Writer for FileWriter {
    fn name(&self) -> String {
        format!("file({})", self.path.display())
    }

    fn init(&mut self) -> Result<()> {
        self.create_file()
    }

    fn write(&mut self, record: &Record) -> Result<()> {
        if !self.band.contains(record.level()) {
            return Ok(());
        }
        if self.out.is_none() {
            if !self.initialized {
                return Err(LogError::NoOpenFile(self.path.clone()));
            }
            // A previous reopen failed; try again now.
            self.create_file()?;
        }
        if let Some(out) = self.out.as_mut() {
            write!(out, "{record}")?;
        }
        Ok(())
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    fn as_rotator(&mut self) -> Option<&mut dyn Rotator> {
        Some(self)
    }
}

impl Flusher for FileWriter {
    fn flush(&mut self) -> Result<()> {
        if let Some(out) = self.out.as_mut() {
            out.flush()?;
        }
        Ok(())
    }
}

impl Rotator for FileWriter {
    fn rotate(&mut self) -> Result<()> {
        self.rotate_at(Local::now())
    }
}
