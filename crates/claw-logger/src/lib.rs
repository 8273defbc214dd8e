//! # claw-logger
//!
//! Asynchronous leveled logger with rotating file sinks and trace
//! correlation.
//!
//! This crate provides:
//!
//! - [`Logger`] - Dispatcher feeding a bounded queue drained by one consumer thread
//! - [`LogLevel`] - Severity levels (Trace, Debug, Info, Warning, Error, Fatal)
//! - [`Writer`] - Sink trait, with optional [`Flusher`] and [`Rotator`] capabilities
//! - [`ConsoleWriter`] - Plain or colored standard output sink
//! - [`FileWriter`] - Buffered file sink with time-based rotation
//! - [`TraceContext`] - Trace/span identifiers and tagged log lines
//! - [`LogConfig`] - Serde-friendly configuration applied by [`setup`]
//! - [`global`] - The process-wide default logger
//!
//! ## Example
//!
//! ```rust
//! use claw_logger::{info, ConsoleWriter, LogLevel, Logger};
//!
//! let logger = Logger::new();
//! logger.register(ConsoleWriter::new().with_color(false)).unwrap();
//! logger.set_level(LogLevel::Info);
//!
//! info!(logger: &logger, "server started on port {}", 8080);
//! logger.warn("disk usage above 80%");
//!
//! // Drains the queue and flushes every writer.
//! logger.close();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod console;
pub mod error;
pub mod file;
pub mod global;
pub mod level;
pub mod logger;
mod macros;
pub mod pattern;
pub mod pool;
pub mod record;
pub mod trace;
pub mod writer;

// Re-export main types
pub use config::{setup, ConsoleWriterConfig, FileWriterConfig, LogConfig};
pub use console::ConsoleWriter;
pub use error::{LogError, Result};
pub use file::FileWriter;
pub use level::{LevelBand, LogLevel};
pub use logger::{Logger, LoggerOptions};
pub use pattern::{Boundary, PathPattern};
pub use record::{Record, TimestampCache, DEFAULT_TIME_LAYOUT};
pub use trace::{parse_params, span_id, trace_id, TagFields, TraceContext};
pub use writer::{Capabilities, Flusher, Rotator, Writer};
