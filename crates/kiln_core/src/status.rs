//! Status/diagnostics channel.
//!
//! Every message goes to the `log` facade and, when one was registered at
//! device creation, to the application's status callback.

use std::fmt;
use std::sync::Arc;

use crate::object::ObjectHandle;

/// Message severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    PerformanceWarning,
    Warning,
    Error,
    /// The only severity the runtime treats as unrecoverable for the
    /// operation that raised it. Aborting is left to the callback.
    Fatal,
}

impl Severity {
    fn log_level(self) -> log::Level {
        match self {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::PerformanceWarning | Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::Fatal => log::Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::PerformanceWarning => "performance",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Application callback: `(severity, source object, message)`.
pub type StatusCallback = Arc<dyn Fn(Severity, Option<ObjectHandle>, &str) + Send + Sync>;

/// Cheap, clonable sender for status messages.
#[derive(Clone, Default)]
pub struct StatusReporter {
    callback: Option<StatusCallback>,
}

impl StatusReporter {
    pub fn new(callback: Option<StatusCallback>) -> Self {
        Self { callback }
    }

    /// Emit a message at the given severity.
    pub fn report(&self, severity: Severity, source: Option<ObjectHandle>, message: impl AsRef<str>) {
        let message = message.as_ref();
        match source {
            Some(handle) => log::log!(severity.log_level(), "[{}] {}", handle, message),
            None => log::log!(severity.log_level(), "{}", message),
        }
        if let Some(callback) = &self.callback {
            callback(severity, source, message);
        }
    }

    pub fn debug(&self, source: ObjectHandle, message: impl AsRef<str>) {
        self.report(Severity::Debug, Some(source), message);
    }

    pub fn warning(&self, source: ObjectHandle, message: impl AsRef<str>) {
        self.report(Severity::Warning, Some(source), message);
    }

    pub fn error(&self, source: ObjectHandle, message: impl AsRef<str>) {
        self.report(Severity::Error, Some(source), message);
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
