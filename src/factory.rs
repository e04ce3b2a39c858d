//! Assembles loggers from per-call options and the accumulated `GlobalOptions`.
//!
//! Construction happens in two steps. `LoggerFactory::plan` merges the
//! caller's options into the store and decides which sinks to build, as a
//! list of `SinkSpec` values. `LoggerPlan::build` then constructs them.

use crate::config::{ConfigStore, Destinations, GlobalOptions};
use crate::core::{Level, Sink};
use crate::error::LoggerError;
use crate::formatting::RecordFormat;
use crate::logger::{ErrorReporter, Logger, SinkErrorPolicy};
use crate::notification::{MessageSender, TelegramClient, TelegramTransport, TransportSettings};
use crate::sinks::{ConsoleSink, FileSink, RotatingFileSink, RotationSettings};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Name of the plain file that receives uncaught exception reports.
pub const EXCEPTION_LOG: &str = "exception.log";

/// Whether the process runs as a production deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    Development,
}

impl DeploymentMode {
    /// Environment variable holding the deployment mode.
    pub const ENV_VAR: &'static str = "FANLOG_ENV";

    /// Reads `FANLOG_ENV`; only `production` selects production mode.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(Self::ENV_VAR).ok().as_deref())
    }

    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some("production") => DeploymentMode::Production,
            _ => DeploymentMode::Development,
        }
    }
}

/// Per-call logger options.
#[derive(Debug, Clone, Default)]
pub struct LoggerOptions {
    /// Tag attached to every record.
    pub label: Option<String>,
    /// Partial settings merged into the store before anything else.
    pub global: Option<GlobalOptions>,
    pub on_sink_error: SinkErrorPolicy,
}

impl LoggerOptions {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_global(mut self, global: GlobalOptions) -> Self {
        self.global = Some(global);
        self
    }

    pub fn with_sink_error_policy(mut self, policy: SinkErrorPolicy) -> Self {
        self.on_sink_error = policy;
        self
    }
}

/// One sink to build, with its validated parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkSpec {
    Notification {
        token: String,
        chats: Option<Destinations>,
        level: Level,
        format: RecordFormat,
    },
    RotatingFile {
        settings: RotationSettings,
        format: RecordFormat,
    },
    Console {
        level: Level,
        handle_exceptions: bool,
        format: RecordFormat,
    },
}

impl SinkSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkSpec::Notification { .. } => "telegram",
            SinkSpec::RotatingFile { .. } => "rotating_file",
            SinkSpec::Console { .. } => "console",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            SinkSpec::Notification { level, .. } => *level,
            SinkSpec::RotatingFile { settings, .. } => settings.level,
            SinkSpec::Console { level, .. } => *level,
        }
    }

    fn build(
        self,
        reporter: &ErrorReporter,
        sender: &Arc<dyn MessageSender>,
    ) -> Result<Arc<dyn Sink>, LoggerError> {
        let kind = self.kind();
        let sink: Arc<dyn Sink> = match self {
            SinkSpec::Notification {
                token,
                chats,
                level,
                format,
            } => {
                let settings = TransportSettings {
                    token: Some(token),
                    chats,
                    level,
                    format,
                };
                let transport = TelegramTransport::new(settings, sender.clone())?
                    .with_reporter(reporter.clone());
                Arc::new(transport)
            }
            SinkSpec::RotatingFile { settings, format } => Arc::new(
                RotatingFileSink::new(settings, format)
                    .map_err(|source| LoggerError::Sink { sink: kind, source })?,
            ),
            SinkSpec::Console {
                level,
                handle_exceptions,
                format,
            } => Arc::new(ConsoleSink::new(level, handle_exceptions, format)),
        };
        Ok(sink)
    }
}

/// Everything needed to construct a logger.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerPlan {
    pub label: Option<String>,
    /// Rendering of the exception file.
    pub format: RecordFormat,
    pub log_dir: PathBuf,
    /// Sinks in dispatch order.
    pub sinks: Vec<SinkSpec>,
    pub exception_log: PathBuf,
    pub exit_on_error: bool,
    pub on_sink_error: SinkErrorPolicy,
}

impl LoggerPlan {
    /// Constructs every planned sink, in order, and the exception sink.
    ///
    /// The returned logger already records uncaught panics to the exception
    /// sink (see `Logger::capture_panics`).
    pub fn build(self, sender: Arc<dyn MessageSender>) -> Result<Arc<Logger>, LoggerError> {
        let reporter = ErrorReporter::new(self.on_sink_error, self.exit_on_error);

        let sinks = self
            .sinks
            .into_iter()
            .map(|spec| spec.build(&reporter, &sender))
            .collect::<Result<Vec<_>, _>>()?;

        let exception_sink = FileSink::new(&self.log_dir, EXCEPTION_LOG, Level::Error, self.format)
            .map_err(|source| LoggerError::Sink {
                sink: "exception",
                source,
            })?;

        let mut logger = Logger::new(sinks, reporter).with_exception_sink(Arc::new(exception_sink));
        if let Some(label) = self.label {
            logger = logger.with_label(label);
        }

        let logger = Arc::new(logger);
        logger.capture_panics();
        Ok(logger)
    }
}

/// Builds loggers against a `ConfigStore`.
pub struct LoggerFactory<'a> {
    store: &'a ConfigStore,
    mode: DeploymentMode,
    sender: Arc<dyn MessageSender>,
}

impl<'a> LoggerFactory<'a> {
    /// A factory using the deployment mode from the environment and the
    /// public Telegram API.
    pub fn new(store: &'a ConfigStore) -> Self {
        Self {
            store,
            mode: DeploymentMode::from_env(),
            sender: Arc::new(TelegramClient::default()),
        }
    }

    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender = sender;
        self
    }

    /// Sends notifications to another Bot API host (e.g., a local mock).
    pub fn with_api_base(self, api_base: impl Into<String>) -> Self {
        self.with_sender(Arc::new(TelegramClient::new(api_base)))
    }

    /// Merges `options.global` into the store and decides which sinks to build.
    pub fn plan(&self, options: &LoggerOptions) -> LoggerPlan {
        if let Some(global) = &options.global {
            self.store.merge(global);
        }
        let config = self.store.snapshot();
        let log_dir = config.log_dir();

        let mut sinks = Vec::new();

        if let Some(token) = config.telegram_token() {
            sinks.push(SinkSpec::Notification {
                token: token.to_string(),
                chats: config.telegram_chats().cloned(),
                level: Level::Emerg,
                format: RecordFormat::Plain,
            });
        }

        sinks.push(SinkSpec::RotatingFile {
            settings: RotationSettings::new(&log_dir),
            format: RecordFormat::Plain,
        });

        if self.mode != DeploymentMode::Production {
            sinks.push(SinkSpec::Console {
                level: Level::Debug,
                handle_exceptions: true,
                format: RecordFormat::Console {
                    use_ansi: std::io::stdout().is_terminal(),
                },
            });
        }

        debug!(
            sinks = ?sinks.iter().map(SinkSpec::kind).collect::<Vec<_>>(),
            log_dir = %log_dir.display(),
            "Planned logger"
        );

        LoggerPlan {
            label: options.label.clone(),
            format: RecordFormat::Json,
            exception_log: log_dir.join(EXCEPTION_LOG),
            log_dir,
            sinks,
            exit_on_error: config.exit_on_error(),
            on_sink_error: options.on_sink_error,
        }
    }

    /// Plans and builds a logger.
    pub fn create(&self, options: LoggerOptions) -> Result<Arc<Logger>, LoggerError> {
        self.plan(&options).build(self.sender.clone())
    }
}

/// Creates a logger from the process-wide `ConfigStore`.
pub fn create_logger(options: LoggerOptions) -> Result<Arc<Logger>, LoggerError> {
    LoggerFactory::new(ConfigStore::global()).create(options)
}
