//! Writer traits for log sinks.
//!
//! Every sink implements [`Writer`]. Sinks that buffer output additionally
//! implement [`Flusher`], sinks that archive their output over time implement
//! [`Rotator`]; both are exposed through [`Writer::as_flusher`] and
//! [`Writer::as_rotator`] so the logger learns a sink's [`Capabilities`] once,
//! at registration.

use crate::error::Result;
use crate::record::Record;

/// A destination for rendered records.
///
/// Writers are owned by the logger's consumer thread after registration;
/// no method is ever called concurrently.
pub trait Writer: Send {
    /// Short human-readable name used in diagnostics.
    fn name(&self) -> String;

    /// Prepares the sink. Called once, on the registering thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be used; registration fails with it.
    fn init(&mut self) -> Result<()>;

    /// Writes one record. Records outside the writer's band are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    fn write(&mut self, record: &Record) -> Result<()>;

    /// Returns the flush capability, if the writer buffers output.
    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    /// Returns the rotate capability, if the writer archives output.
    fn as_rotator(&mut self) -> Option<&mut dyn Rotator> {
        None
    }
}

/// Writers that buffer output and persist it on demand.
pub trait Flusher {
    /// Persists buffered bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer could not be written out.
    fn flush(&mut self) -> Result<()>;
}

/// Writers that archive their output when a time bucket changes.
pub trait Rotator {
    /// Archives the current output if the time bucket changed since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing, renaming or reopening fails.
    fn rotate(&mut self) -> Result<()>;
}

/// Optional capabilities of a registered writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The writer implements [`Flusher`].
    pub flush: bool,
    /// The writer implements [`Rotator`].
    pub rotate: bool,
}

impl Capabilities {
    /// Probes the capabilities a writer declares.
    pub fn of(writer: &mut dyn Writer) -> Self {
        Self {
            flush: writer.as_flusher().is_some(),
            rotate: writer.as_rotator().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;

    struct Plain(Vec<String>);

    impl Writer for Plain {
        fn name(&self) -> String {
            "plain".to_string()
        }

        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, record: &Record) -> Result<()> {
            self.0.push(record.message().to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Buffered {
        flushed: usize,
    }

    impl Writer for Buffered {
        fn name(&self) -> String {
            "buffered".to_string()
        }

        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn write(&mut self, _record: &Record) -> Result<()> {
            Ok(())
        }

        fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
            Some(self)
        }
    }

    impl Flusher for Buffered {
        fn flush(&mut self) -> Result<()> {
            self.flushed += 1;
            Ok(())
        }
    }

    #[test]
    fn plain_writer_has_no_capabilities() {
        let mut writer = Plain(Vec::new());
        assert_eq!(Capabilities::of(&mut writer), Capabilities::default());

        let record = Record::new(LogLevel::Info, "t", "a.rs:1", "hello");
        assert!(writer.write(&record).is_ok());
        assert_eq!(writer.0, ["hello"]);
    }

    #[test]
    fn declared_flusher_is_detected_and_callable() {
        let mut writer = Buffered::default();
        let caps = Capabilities::of(&mut writer);
        assert!(caps.flush);
        assert!(!caps.rotate);

        if let Some(flusher) = writer.as_flusher() {
            assert!(flusher.flush().is_ok());
        }
        assert_eq!(writer.flushed, 1);
    }
}
