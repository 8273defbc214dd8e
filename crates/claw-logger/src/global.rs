//! The process-wide default logger.
//!
//! [`logger`] creates the default instance on first use and hands out
//! shared handles to it. Applications that can pass a handle through their
//! own context should do so; the free functions here exist for call sites
//! that cannot.
//!
//! [`close`] drains and forgets the default instance. A later call creates
//! a fresh, unconfigured one.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::{self, LogConfig};
use crate::error::Result;
use crate::level::LogLevel;
use crate::logger::Logger;
use crate::trace::{TagFields, TraceContext};
use crate::writer::Writer;

static DEFAULT: Lazy<Mutex<Option<Arc<Logger>>>> = Lazy::new(|| Mutex::new(None));

/// Returns the default logger, creating it if needed.
#[must_use]
pub fn logger() -> Arc<Logger> {
    let mut slot = DEFAULT.lock();
    Arc::clone(slot.get_or_insert_with(|| Arc::new(Logger::new())))
}

/// Closes the default logger and forgets it.
///
/// Blocks until every queued record has been written and flushed. Handles
/// obtained earlier keep pointing at the closed instance.
pub fn close() {
    let current = DEFAULT.lock().take();
    if let Some(logger) = current {
        logger.close();
    }
}

/// Configures the default logger.
///
/// # Errors
///
/// See [`config::setup`].
pub fn setup(config: &LogConfig) -> Result<()> {
    config::setup(&logger(), config)
}

/// Changes the default logger's minimum level.
pub fn set_level(level: LogLevel) {
    logger().set_level(level);
}

/// Changes the default logger's timestamp layout.
///
/// # Errors
///
/// See [`Logger::set_time_layout`].
pub fn set_time_layout(layout: &str) -> Result<()> {
    logger().set_time_layout(layout)
}

/// Registers a writer on the default logger.
///
/// # Errors
///
/// See [`Logger::register`].
pub fn register(writer: impl Writer + 'static) -> Result<()> {
    logger().register(writer)
}

/// Emits a record on the default logger.
#[track_caller]
pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    logger().log(level, args);
}

/// Emits `message` at TRACE on the default logger.
#[track_caller]
pub fn trace(message: impl fmt::Display) {
    logger().trace(message);
}

/// Emits `message` at DEBUG on the default logger.
#[track_caller]
pub fn debug(message: impl fmt::Display) {
    logger().debug(message);
}

/// Emits `message` at INFO on the default logger.
#[track_caller]
pub fn info(message: impl fmt::Display) {
    logger().info(message);
}

/// Emits `message` at WARNING on the default logger.
#[track_caller]
pub fn warn(message: impl fmt::Display) {
    logger().warn(message);
}

/// Emits `message` at ERROR on the default logger.
#[track_caller]
pub fn error(message: impl fmt::Display) {
    logger().error(message);
}

/// Emits `message` at FATAL on the default logger.
#[track_caller]
pub fn fatal(message: impl fmt::Display) {
    logger().fatal(message);
}

/// Tagged TRACE line on the default logger.
#[track_caller]
pub fn tag_trace(trace: &TraceContext, dl_tag: &str, fields: TagFields) {
    logger().tag_trace(trace, dl_tag, fields);
}

/// Tagged DEBUG line on the default logger.
#[track_caller]
pub fn tag_debug(trace: &TraceContext, dl_tag: &str, fields: TagFields) {
    logger().tag_debug(trace, dl_tag, fields);
}

/// Tagged INFO line on the default logger.
#[track_caller]
pub fn tag_info(trace: &TraceContext, dl_tag: &str, fields: TagFields) {
    logger().tag_info(trace, dl_tag, fields);
}

/// Tagged WARNING line on the default logger.
#[track_caller]
pub fn tag_warn(trace: &TraceContext, dl_tag: &str, fields: TagFields) {
    logger().tag_warn(trace, dl_tag, fields);
}

/// Tagged ERROR line on the default logger.
#[track_caller]
pub fn tag_error(trace: &TraceContext, dl_tag: &str, fields: TagFields) {
    logger().tag_error(trace, dl_tag, fields);
}
