//! The logger: routes each record to every sink whose level admits it and
//! decides what happens when a sink fails.

use crate::core::{Level, LogRecord, Sink};
use crate::error::SinkError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::panic::PanicHookInfo;
use std::sync::{Arc, Mutex, Once, Weak};
use tokio::sync::broadcast;
use tracing::{error, warn};

/// Loggers that receive uncaught panic reports.
static PANIC_LOGGERS: Lazy<Mutex<Vec<Weak<Logger>>>> = Lazy::new(|| Mutex::new(Vec::new()));

static PANIC_HOOK: Once = Once::new();

/// Capacity of the sink failure channel.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// What to do when a sink reports a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkErrorPolicy {
    /// Emit a diagnostic and keep going. The process is never terminated.
    #[default]
    LogAndContinue,
    /// Emit a diagnostic and, when `exit_on_error` is set, exit with status 1.
    Propagate,
}

/// A sink failure as seen by subscribers of `Logger::subscribe_errors`.
#[derive(Debug, Clone)]
pub struct SinkFailure {
    pub sink: String,
    pub error: Arc<SinkError>,
}

/// Hands sink failures to subscribers and applies the `SinkErrorPolicy`.
///
/// Diagnostics go to `tracing`, never back through the logger.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: broadcast::Sender<SinkFailure>,
    policy: SinkErrorPolicy,
    exit_on_error: bool,
}

impl ErrorReporter {
    pub fn new(policy: SinkErrorPolicy, exit_on_error: bool) -> Self {
        let (tx, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            tx,
            policy,
            exit_on_error,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SinkFailure> {
        self.tx.subscribe()
    }

    pub fn policy(&self) -> SinkErrorPolicy {
        self.policy
    }

    pub fn exit_on_error(&self) -> bool {
        self.exit_on_error
    }

    pub fn report(&self, sink: &str, error: SinkError) {
        let failure = SinkFailure {
            sink: sink.to_string(),
            error: Arc::new(error),
        };
        // No subscribers is fine.
        let _ = self.tx.send(failure.clone());

        match self.policy {
            SinkErrorPolicy::LogAndContinue => {
                warn!(sink = %failure.sink, error = %failure.error, "Log sink failed");
            }
            SinkErrorPolicy::Propagate => {
                error!(sink = %failure.sink, error = %failure.error, "Log sink failed");
                if self.exit_on_error {
                    std::process::exit(1);
                }
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(SinkErrorPolicy::default(), true)
    }
}

/// A leveled logger over an ordered list of sinks.
pub struct Logger {
    label: Option<String>,
    sinks: Vec<Arc<dyn Sink>>,
    exception_sink: Option<Arc<dyn Sink>>,
    reporter: ErrorReporter,
}

impl Logger {
    /// Creates a logger. Sinks are visited in the given order.
    pub fn new(sinks: Vec<Arc<dyn Sink>>, reporter: ErrorReporter) -> Self {
        Self {
            label: None,
            sinks,
            exception_sink: None,
            reporter,
        }
    }

    /// Tags every record with `label`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the sink that receives uncaught panic reports.
    pub fn with_exception_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.exception_sink = Some(sink);
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    pub fn exception_sink(&self) -> Option<&Arc<dyn Sink>> {
        self.exception_sink.as_ref()
    }

    pub fn exit_on_error(&self) -> bool {
        self.reporter.exit_on_error()
    }

    pub fn policy(&self) -> SinkErrorPolicy {
        self.reporter.policy()
    }

    /// Receives every sink failure reported after this call.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<SinkFailure> {
        self.reporter.subscribe()
    }

    /// Logs `message` at `level`.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        let record = LogRecord::new(level, message, self.label.clone());
        self.dispatch(&record);
    }

    /// Hands `record` to every sink whose level admits it.
    ///
    /// A failing sink does not stop the remaining ones.
    pub fn dispatch(&self, record: &LogRecord) {
        for sink in &self.sinks {
            if !sink.level().admits(record.level) {
                continue;
            }
            if let Err(e) = sink.log(record) {
                self.reporter.report(sink.name(), e);
            }
        }
    }

    pub fn emerg(&self, message: impl Into<String>) {
        self.log(Level::Emerg, message)
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message)
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message)
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message)
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message)
    }

    /// Waits for background work in every sink, e.g. pending notifications.
    pub async fn flush(&self) {
        for sink in self.sinks.iter().chain(self.exception_sink.iter()) {
            if let Err(e) = sink.flush().await {
                self.reporter.report(sink.name(), e);
            }
        }
    }

    /// Writes an uncaught exception report to the exception sink and to every
    /// sink that handles exceptions.
    ///
    /// # Returns
    /// * `true` if at least one regular sink handles exceptions
    pub fn report_exception(&self, report: &str) -> bool {
        let record = LogRecord::new(
            Level::Error,
            format!("uncaughtException: {}", report),
            self.label.clone(),
        );

        if let Some(sink) = &self.exception_sink {
            if let Err(e) = sink.log(&record) {
                warn!(sink = sink.name(), error = %e, "Failed to record uncaught exception");
            }
        }

        let mut handled = false;
        for sink in self.sinks.iter().filter(|s| s.handles_exceptions()) {
            handled = true;
            if let Err(e) = sink.log(&record) {
                warn!(sink = sink.name(), error = %e, "Failed to record uncaught exception");
            }
        }
        handled
    }

    /// Reports uncaught panics through this logger for as long as it lives.
    ///
    /// A single process-wide hook is installed on first use; the hook that
    /// was in place before still runs. If a sink handles exceptions and
    /// `exit_on_error` is set, the process then exits with status 1.
    pub fn capture_panics(self: &Arc<Self>) {
        {
            let mut loggers = PANIC_LOGGERS
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            loggers.retain(|logger| logger.strong_count() > 0);
            loggers.push(Arc::downgrade(self));
        }

        PANIC_HOOK.call_once(|| {
            let previous_hook = std::panic::take_hook();

            std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
                // Upgrade outside the lock so a panicking sink cannot deadlock the hook.
                let loggers: Vec<Arc<Logger>> = PANIC_LOGGERS
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .iter()
                    .filter_map(Weak::upgrade)
                    .collect();

                let report = format_panic_report(panic_info);
                let mut exit = false;
                for logger in &loggers {
                    let handled = logger.report_exception(&report);
                    exit |= handled && logger.exit_on_error();
                }

                previous_hook(panic_info);

                if exit {
                    std::process::exit(1);
                }
            }));
        });
    }
}

fn format_panic_report(panic_info: &PanicHookInfo<'_>) -> String {
    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        panic_info.to_string()
    };

    match panic_info.location() {
        Some(loc) => format!("{}\n    at {}:{}:{}", payload, loc.file(), loc.line(), loc.column()),
        None => payload,
    }
}
