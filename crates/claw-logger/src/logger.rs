//! The dispatcher: a bounded queue drained by one consumer thread.
//!
//! Producers on any thread format a [`Record`] taken from the shared
//! [`RecordPool`] and push it onto a bounded channel. A single consumer
//! thread owns every registered writer. It delivers records in queue order,
//! flushes buffering writers on a timer, and asks rotating writers to check
//! their time bucket on a second timer. Writer state is never shared, so no
//! lock guards it.

use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::error::{LogError, Result};
use crate::level::LogLevel;
use crate::pool::RecordPool;
use crate::record::{validate_time_layout, Record, TimestampCache, DEFAULT_TIME_LAYOUT};
use crate::writer::{Capabilities, Writer};

/// Tuning knobs for a [`Logger`].
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    /// Maximum number of records waiting for the consumer.
    pub queue_capacity: usize,
    /// Maximum number of idle records kept for reuse.
    pub pool_capacity: usize,
    /// Delay before the first flush.
    pub first_flush_delay: Duration,
    /// Delay between later flushes.
    pub flush_interval: Duration,
    /// Delay between rotation checks.
    pub rotate_interval: Duration,
    /// Timestamp layout in chrono strftime syntax.
    pub time_layout: String,
    /// Minimum level that is enqueued.
    pub level: LogLevel,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            pool_capacity: 1024,
            first_flush_delay: Duration::from_millis(500),
            flush_interval: Duration::from_millis(1000),
            rotate_interval: Duration::from_secs(10),
            time_layout: DEFAULT_TIME_LAYOUT.to_string(),
            level: LogLevel::Debug,
        }
    }
}

impl LoggerOptions {
    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets both flush delays.
    #[must_use]
    pub const fn with_flush_interval(mut self, first: Duration, every: Duration) -> Self {
        self.first_flush_delay = first;
        self.flush_interval = every;
        self
    }

    /// Sets the rotation check interval.
    #[must_use]
    pub const fn with_rotate_interval(mut self, every: Duration) -> Self {
        self.rotate_interval = every;
        self
    }

    /// Sets the minimum level.
    #[must_use]
    pub const fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

enum Message {
    Record(Record),
    Register(Box<dyn Writer>, Capabilities),
}

/// Asynchronous leveled logger.
///
/// Emission never reports writer failures to the caller; it only blocks
/// while the queue is full.
pub struct Logger {
    level: AtomicU8,
    timestamps: Mutex<TimestampCache>,
    pool: RecordPool,
    sender: RwLock<Option<Sender<Message>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a logger with default options and starts its consumer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(LoggerOptions::default())
    }

    /// Creates a logger and starts its consumer.
    #[must_use]
    pub fn with_options(options: LoggerOptions) -> Self {
        let (sender, receiver) = channel::bounded(options.queue_capacity);
        let pool = RecordPool::new(options.pool_capacity);

        let consumer = Consumer {
            receiver,
            pool: pool.clone(),
            sinks: Vec::new(),
            first_flush_delay: options.first_flush_delay,
            flush_interval: options.flush_interval,
            rotate_interval: options.rotate_interval,
        };
        let handle = thread::Builder::new()
            .name("claw-logger".to_string())
            .spawn(move || consumer.run());
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                // The receiver went down with the closure; emission reports `Closed`.
                error!(error = %err, "failed to spawn logger consumer thread");
                None
            }
        };

        Self {
            level: AtomicU8::new(options.level as u8),
            timestamps: Mutex::new(TimestampCache::new(options.time_layout)),
            pool,
            sender: RwLock::new(Some(sender)),
            consumer: Mutex::new(handle),
        }
    }

    /// Initializes `writer` and hands it to the consumer.
    ///
    /// Writers receive records in registration order, starting with the
    /// first record enqueued after this call.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::WriterInit`] if the writer cannot be initialized,
    /// or [`LogError::Closed`] after [`close`](Self::close).
    pub fn register(&self, writer: impl Writer + 'static) -> Result<()> {
        self.register_boxed(Box::new(writer))
    }

    /// Boxed form of [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_boxed(&self, mut writer: Box<dyn Writer>) -> Result<()> {
        if let Err(err) = writer.init() {
            return Err(match err {
                LogError::Io(source) => LogError::WriterInit {
                    writer: writer.name(),
                    source,
                },
                other => other,
            });
        }
        let caps = Capabilities::of(writer.as_mut());
        debug!(writer = %writer.name(), flush = caps.flush, rotate = caps.rotate, "registering writer");
        self.send(Message::Register(writer, caps))
    }

    /// The minimum level that is enqueued.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Changes the minimum level.
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Returns true if a record at `level` would be enqueued.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    /// The timestamp layout in use.
    #[must_use]
    pub fn time_layout(&self) -> String {
        self.timestamps.lock().layout().to_string()
    }

    /// Changes the timestamp layout (chrono strftime syntax).
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidTimeLayout`] on an unsupported directive.
    pub fn set_time_layout(&self, layout: &str) -> Result<()> {
        validate_time_layout(layout)?;
        self.timestamps.lock().set_layout(layout);
        Ok(())
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Emits a record; failures are reported through `tracing`.
    #[track_caller]
    pub fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if let Err(err) = self.emit(level, Location::caller(), args) {
            warn!(error = %err, level = %level, "dropped log record");
        }
    }

    /// Emits a record, returning [`LogError::Closed`] after [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Closed`] if the logger no longer accepts records.
    #[track_caller]
    pub fn try_log(&self, level: LogLevel, args: fmt::Arguments<'_>) -> Result<()> {
        self.emit(level, Location::caller(), args)
    }

    /// Emits `message` at TRACE.
    #[track_caller]
    pub fn trace(&self, message: impl fmt::Display) {
        self.log(LogLevel::Trace, format_args!("{message}"));
    }

    /// Emits `message` at DEBUG.
    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, format_args!("{message}"));
    }

    /// Emits `message` at INFO.
    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, format_args!("{message}"));
    }

    /// Emits `message` at WARNING.
    #[track_caller]
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warning, format_args!("{message}"));
    }

    /// Emits `message` at ERROR.
    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, format_args!("{message}"));
    }

    /// Emits `message` at FATAL. The process keeps running.
    #[track_caller]
    pub fn fatal(&self, message: impl fmt::Display) {
        self.log(LogLevel::Fatal, format_args!("{message}"));
    }

    /// Stops accepting records, waits until every queued record reached
    /// every writer, and flushes all buffering writers.
    ///
    /// Calling it again is a no-op.
    pub fn close(&self) {
        let Some(sender) = self.sender.write().take() else {
            return;
        };
        drop(sender);

        if let Some(handle) = self.consumer.lock().take() {
            if handle.join().is_err() {
                error!("logger consumer thread panicked");
            }
        }
    }

    pub(crate) fn emit(
        &self,
        level: LogLevel,
        location: &Location<'_>,
        args: fmt::Arguments<'_>,
    ) -> Result<()> {
        if !self.enabled(level) {
            return Ok(());
        }

        let mut record = self.pool.acquire();
        record.fill(level, location, args);
        {
            let mut timestamps = self.timestamps.lock();
            record.set_timestamp(timestamps.stamp(Local::now()));
        }

        self.send(Message::Record(record))
    }

    fn send(&self, message: Message) -> Result<()> {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            return Err(LogError::Closed);
        };
        sender.send(message).map_err(|_| LogError::Closed)
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lifecycle of the consumer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerState {
    Running,
    Draining,
    Stopped,
}

struct Sink {
    writer: Box<dyn Writer>,
    caps: Capabilities,
}

struct Consumer {
    receiver: Receiver<Message>,
    pool: RecordPool,
    sinks: Vec<Sink>,
    first_flush_delay: Duration,
    flush_interval: Duration,
    rotate_interval: Duration,
}

impl Consumer {
    fn run(mut self) {
        let mut state = ConsumerState::Running;
        let mut flush_at = Instant::now() + self.first_flush_delay;
        let mut rotate_at = Instant::now() + self.rotate_interval;

        loop {
            match state {
                ConsumerState::Running => {
                    let now = Instant::now();
                    if now >= flush_at {
                        self.flush_all();
                        flush_at = Instant::now() + self.flush_interval;
                    }
                    if now >= rotate_at {
                        self.rotate_all();
                        rotate_at = Instant::now() + self.rotate_interval;
                    }

                    match self.receiver.recv_deadline(flush_at.min(rotate_at)) {
                        Ok(message) => self.handle(message),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!("logger queue closed, draining");
                            state = ConsumerState::Draining;
                        }
                    }
                }
                ConsumerState::Draining => {
                    while let Ok(message) = self.receiver.try_recv() {
                        self.handle(message);
                    }
                    state = ConsumerState::Stopped;
                }
                ConsumerState::Stopped => {
                    self.flush_all();
                    debug!(writers = self.sinks.len(), "logger consumer stopped");
                    return;
                }
            }
        }
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Record(record) => {
                for sink in &mut self.sinks {
                    if let Err(err) = sink.writer.write(&record) {
                        warn!(writer = %sink.writer.name(), error = %err, "log write failed");
                    }
                }
                self.pool.release(record);
            }
            Message::Register(writer, caps) => self.sinks.push(Sink { writer, caps }),
        }
    }

    fn flush_all(&mut self) {
        for sink in self.sinks.iter_mut().filter(|s| s.caps.flush) {
            if let Some(flusher) = sink.writer.as_flusher() {
                if let Err(err) = flusher.flush() {
                    warn!(writer = %sink.writer.name(), error = %err, "log flush failed");
                }
            }
        }
    }

    fn rotate_all(&mut self) {
        for sink in self.sinks.iter_mut().filter(|s| s.caps.rotate) {
            if let Some(rotator) = sink.writer.as_rotator() {
                if let Err(err) = rotator.rotate() {
                    warn!(writer = %sink.writer.name(), error = %err, "log rotation failed");
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::writer::Flusher;
    use std::sync::Arc;

    /// What a [`CaptureWriter`] observed.
    #[derive(Debug, Default)]
    pub(crate) struct Captured {
        pub(crate) records: Vec<Record>,
        pub(crate) flushes: usize,
        pub(crate) flushed_len: usize,
    }

    /// Writer that records everything it sees into shared memory.
    pub(crate) struct CaptureWriter {
        pub(crate) seen: Arc<Mutex<Captured>>,
        pub(crate) band: crate::level::LevelBand,
    }

    impl CaptureWriter {
        pub(crate) fn new() -> (Self, Arc<Mutex<Captured>>) {
            let seen = Arc::new(Mutex::new(Captured::default()));
            (
                Self {
                    seen: Arc::clone(&seen),
                    band: crate::level::LevelBand::ALL,
                },
                seen,
            )
        }
    }

    impl Writer for CaptureWriter {
        fn name(&self) -> String {
            "capture".to_string()
        }

        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, record: &Record) -> Result<()> {
            if self.band.contains(record.level()) {
                self.seen.lock().records.push(record.clone());
            }
            Ok(())
        }

        fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
            Some(self)
        }
    }

    impl Flusher for CaptureWriter {
        fn flush(&mut self) -> Result<()> {
            let mut seen = self.seen.lock();
            seen.flushes += 1;
            seen.flushed_len = seen.records.len();
            Ok(())
        }
    }

    struct FailingWriter;

    impl Writer for FailingWriter {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn init(&mut self) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }

        fn write(&mut self, _record: &Record) -> Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Writer for BrokenWriter {
        fn name(&self) -> String {
            "broken".to_string()
        }

        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, _record: &Record) -> Result<()> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    fn messages(seen: &Arc<Mutex<Captured>>) -> Vec<String> {
        seen.lock()
            .records
            .iter()
            .map(|r| r.message().to_string())
            .collect()
    }

    // ===========================================
    // Level Filtering Tests
    // ===========================================

    #[test]
    fn default_level_is_debug() {
        let logger = Logger::new();
        assert_eq!(logger.level(), LogLevel::Debug);
        assert!(!logger.enabled(LogLevel::Trace));
        assert!(logger.enabled(LogLevel::Debug));
    }

    #[test]
    fn records_below_min_level_are_dropped() {
        let logger = Logger::new();
        let (writer, seen) = CaptureWriter::new();
        logger.register(writer).expect("register");
        logger.set_level(LogLevel::Warning);

        logger.trace("t");
        logger.debug("d");
        logger.info("i");
        logger.warn("w");
        logger.error("e");
        logger.fatal("f");
        logger.close();

        assert_eq!(messages(&seen), ["w", "e", "f"]);
    }

    // ===========================================
    // Delivery Tests
    // ===========================================

    #[test]
    fn records_carry_level_location_and_timestamp() {
        let logger = Logger::new();
        let (writer, seen) = CaptureWriter::new();
        logger.register(writer).expect("register");

        let line = line!() + 1;
        logger.log(LogLevel::Info, format_args!("user {} logged in", 42));
        logger.close();

        let seen = seen.lock();
        let record = &seen.records[0];
        assert_eq!(record.level(), LogLevel::Info);
        assert_eq!(record.message(), "user 42 logged in");
        assert_eq!(record.location(), format!("logger.rs:{line}"));
        assert!(!record.timestamp().is_empty());
    }

    #[test]
    fn close_drains_and_flushes() {
        let logger = Logger::with_options(
            LoggerOptions::default()
                .with_flush_interval(Duration::from_secs(3600), Duration::from_secs(3600)),
        );
        let (writer, seen) = CaptureWriter::new();
        logger.register(writer).expect("register");

        for i in 0..500 {
            logger.info(i);
        }
        logger.close();

        let seen = seen.lock();
        assert_eq!(seen.records.len(), 500);
        assert!(seen.flushes >= 1);
        assert_eq!(seen.flushed_len, 500);
    }

    #[test]
    fn every_writer_sees_same_order() {
        let logger = Logger::new();
        let (first, seen_first) = CaptureWriter::new();
        let (second, seen_second) = CaptureWriter::new();
        logger.register(first).expect("register");
        logger.register(second).expect("register");

        for i in 0..100 {
            logger.info(i);
        }
        logger.close();

        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(messages(&seen_first), expected);
        assert_eq!(messages(&seen_second), expected);
    }

    #[test]
    fn concurrent_producers_keep_per_thread_order() {
        let logger = Arc::new(Logger::with_options(
            LoggerOptions::default().with_queue_capacity(8),
        ));
        let (writer, seen) = CaptureWriter::new();
        logger.register(writer).expect("register");

        let producers: Vec<_> = (0..4)
            .map(|t| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    for i in 0..200 {
                        logger.log(LogLevel::Info, format_args!("{t}:{i}"));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer");
        }
        logger.close();

        let all = messages(&seen);
        assert_eq!(all.len(), 800);
        for t in 0..4 {
            let prefix = format!("{t}:");
            let ours: Vec<usize> = all
                .iter()
                .filter_map(|m| m.strip_prefix(&prefix))
                .filter_map(|n| n.parse().ok())
                .collect();
            assert_eq!(ours, (0..200).collect::<Vec<_>>());
        }
    }

    #[test]
    fn timer_flushes_without_close() {
        let logger = Logger::with_options(
            LoggerOptions::default()
                .with_flush_interval(Duration::from_millis(10), Duration::from_millis(10)),
        );
        let (writer, seen) = CaptureWriter::new();
        logger.register(writer).expect("register");
        logger.info("tick");

        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.lock().flushed_len == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(seen.lock().flushed_len, 1);
        logger.close();
    }

    #[test]
    fn broken_writer_does_not_stop_pipeline() {
        let logger = Logger::new();
        let (writer, seen) = CaptureWriter::new();
        logger.register(BrokenWriter).expect("register");
        logger.register(writer).expect("register");

        logger.info("still delivered");
        logger.close();

        assert_eq!(messages(&seen), ["still delivered"]);
    }

    // ===========================================
    // Registration / Lifecycle Tests
    // ===========================================

    #[test]
    fn failing_init_is_a_config_error() {
        let logger = Logger::new();
        let err = logger.register(FailingWriter).expect_err("init must fail");
        assert!(err.is_config_error());
        assert!(matches!(err, LogError::WriterInit { ref writer, .. } if writer == "failing"));
    }

    #[test]
    fn emit_after_close_fails_cleanly() {
        let logger = Logger::new();
        logger.close();
        assert!(logger.is_closed());

        let result = logger.try_log(LogLevel::Error, format_args!("late"));
        assert!(matches!(result, Err(LogError::Closed)));

        // The infallible path must not panic.
        logger.error("late");

        let (writer, _) = CaptureWriter::new();
        assert!(matches!(logger.register(writer), Err(LogError::Closed)));
    }

    #[test]
    fn filtered_emit_after_close_is_ok() {
        let logger = Logger::new();
        logger.close();
        assert!(logger.try_log(LogLevel::Trace, format_args!("ignored")).is_ok());
    }

    #[test]
    fn close_twice_is_noop() {
        let logger = Logger::new();
        logger.close();
        logger.close();
        assert!(logger.is_closed());
    }

    #[test]
    fn time_layout_is_validated_and_applied() {
        let logger = Logger::new();
        assert_eq!(logger.time_layout(), DEFAULT_TIME_LAYOUT);
        assert!(logger.set_time_layout("%Y-%!").is_err());

        logger.set_time_layout("%Y").expect("layout");
        let (writer, seen) = CaptureWriter::new();
        logger.register(writer).expect("register");
        logger.info("x");
        logger.close();

        let year = Local::now().format("%Y").to_string();
        assert_eq!(seen.lock().records[0].timestamp(), year);
    }

    #[test]
    fn pooled_records_are_fully_overwritten() {
        let logger = Logger::new();
        let (writer, seen) = CaptureWriter::new();
        logger.register(writer).expect("register");

        logger.fatal("a much longer first message with plenty of text");
        logger.debug("b");
        logger.close();

        let seen = seen.lock();
        assert_eq!(seen.records[1].message(), "b");
        assert_eq!(seen.records[1].level(), LogLevel::Debug);
        assert!(logger.pool.idle() >= 1);
    }
}
