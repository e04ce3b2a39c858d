//! The Telegram sink: fans one rendered record out to every configured chat.

use crate::config::Destinations;
use crate::core::{Level, LogRecord, Sink};
use crate::error::{ConfigError, DeliveryError, SinkError};
use crate::formatting::{RecordFormat, TextFormatter};
use crate::logger::ErrorReporter;
use crate::notification::telegram::MessageSender;
use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, warn};

/// Used when a record is logged outside of any tokio runtime.
static FALLBACK_RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn runtime_handle() -> Result<Handle, SinkError> {
    if let Ok(handle) = Handle::try_current() {
        return Ok(handle);
    }
    let runtime = FALLBACK_RUNTIME
        .get_or_try_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("fanlog-notify")
                .enable_all()
                .build()
        })
        .map_err(|e| SinkError::Runtime(e.to_string()))?;
    Ok(runtime.handle().clone())
}

/// Construction parameters for `TelegramTransport`.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub token: Option<String>,
    pub chats: Option<Destinations>,
    pub level: Level,
    pub format: RecordFormat,
}

impl TransportSettings {
    pub fn new(token: Option<String>, chats: Option<Destinations>) -> Self {
        Self {
            token,
            chats,
            level: Level::Emerg,
            format: RecordFormat::Plain,
        }
    }
}

/// Delivers a message to every chat concurrently.
///
/// Waits for all attempts. The result is `Ok` when every attempt succeeded,
/// otherwise the failure of the first failing chat in list order.
pub async fn fan_out(
    sender: &dyn MessageSender,
    token: &str,
    chats: &[Value],
    message: &str,
) -> Result<(), DeliveryError> {
    if chats.is_empty() {
        return Ok(());
    }

    let text = Value::String(message.to_string());
    let outcomes = join_all(chats.iter().map(|chat| sender.send(token, chat, &text))).await;

    let mut first_failure = None;
    for (chat, outcome) in chats.iter().zip(outcomes) {
        if let Err(e) = outcome {
            warn!(chat = %chat, error = %e, "Telegram delivery failed");
            if first_failure.is_none() {
                first_failure = Some(e);
            }
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Escalates records to Telegram chats.
pub struct TelegramTransport {
    token: String,
    chats: Vec<Value>,
    level: Level,
    sender: Arc<dyn MessageSender>,
    formatter: Box<dyn TextFormatter>,
    reporter: ErrorReporter,
    tracker: TaskTracker,
}

impl TelegramTransport {
    /// Creates a new `TelegramTransport`.
    ///
    /// # Returns
    /// * `Err(ConfigError::MissingToken)` if no token was given
    pub fn new(
        settings: TransportSettings,
        sender: Arc<dyn MessageSender>,
    ) -> Result<Self, ConfigError> {
        let token = settings.token.ok_or(ConfigError::MissingToken)?;
        let chats = settings
            .chats
            .as_ref()
            .map(Destinations::to_vec)
            .unwrap_or_default();

        // A closed tracker still accepts tasks; closing only lets `wait` finish
        // once they are done, so it is never reopened.
        let tracker = TaskTracker::new();
        tracker.close();

        Ok(Self {
            token,
            chats,
            level: settings.level,
            sender,
            formatter: settings.format.formatter(),
            reporter: ErrorReporter::default(),
            tracker,
        })
    }

    /// Routes asynchronous delivery failures to `reporter`.
    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// The normalized chat list.
    pub fn chats(&self) -> &[Value] {
        &self.chats
    }

    /// Sends `message` to every configured chat and waits for the outcome.
    #[instrument(skip(self, message), fields(chats = self.chats.len()))]
    pub async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        fan_out(self.sender.as_ref(), &self.token, &self.chats, message).await
    }
}

#[async_trait]
impl Sink for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    fn level(&self) -> Level {
        self.level
    }

    /// Starts the fan-out in the background and returns immediately.
    fn log(&self, record: &LogRecord) -> Result<(), SinkError> {
        if self.chats.is_empty() {
            debug!("No Telegram chats configured, skipping escalation.");
            return Ok(());
        }

        let handle = runtime_handle()?;
        let message = self.formatter.format(record);
        let sender = self.sender.clone();
        let token = self.token.clone();
        let chats = self.chats.clone();
        let reporter = self.reporter.clone();

        self.tracker.spawn_on(
            async move {
                if let Err(e) = fan_out(sender.as_ref(), &token, &chats, &message).await {
                    reporter.report("telegram", SinkError::Delivery(e));
                }
            },
            &handle,
        );
        Ok(())
    }

    /// Waits for every delivery spawned so far. Safe to call concurrently.
    async fn flush(&self) -> Result<(), SinkError> {
        self.tracker.wait().await;
        Ok(())
    }
}
