// src/formatting.rs

use crate::core::{Level, LogRecord};
use serde_json::json;
use yansi::Paint;

/// A trait for rendering a log record into a single string.
pub trait TextFormatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

/// Which rendering a sink uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Machine-readable JSON envelope.
    Json,
    /// `timestamp [label] level: message`.
    Plain,
    /// The plain layout with a colorized level and a tab-aligned message.
    Console { use_ansi: bool },
}

impl RecordFormat {
    pub fn formatter(&self) -> Box<dyn TextFormatter> {
        match *self {
            RecordFormat::Json => Box::new(JsonFormatter),
            RecordFormat::Plain => Box::new(PlainFormatter),
            RecordFormat::Console { use_ansi } => Box::new(ConsoleFormatter { use_ansi }),
        }
    }
}

/// Renders `2024-05-01 12:00:00 [label] level: message`.
pub struct PlainFormatter;

impl TextFormatter for PlainFormatter {
    fn format(&self, record: &LogRecord) -> String {
        format!(
            "{}{}: {}",
            prefix(record),
            record.level,
            record.message
        )
    }
}

/// The plain layout for terminals: the level is colored and the message is
/// tab-aligned so messages line up regardless of the level width.
pub struct ConsoleFormatter {
    pub use_ansi: bool,
}

impl ConsoleFormatter {
    fn format_level(&self, level: Level) -> String {
        if !self.use_ansi {
            return level.to_string();
        }
        let name = level.as_str();
        match level {
            Level::Emerg | Level::Error => name.red().to_string(),
            Level::Warning => name.yellow().to_string(),
            Level::Info => name.green().to_string(),
            Level::Debug => name.bright_black().to_string(),
        }
    }
}

impl TextFormatter for ConsoleFormatter {
    fn format(&self, record: &LogRecord) -> String {
        format!(
            "{}{}: \t{}",
            prefix(record),
            self.format_level(record.level),
            record.message
        )
    }
}

/// Renders the record as a one-line JSON object.
pub struct JsonFormatter;

impl TextFormatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut envelope = json!({
            "level": record.level,
            "message": record.message,
            "timestamp": record.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        });
        if let Some(label) = &record.label {
            envelope["label"] = json!(label);
        }
        envelope.to_string()
    }
}

/// The shared `timestamp [label] ` prefix, with the timestamp cut to seconds.
fn prefix(record: &LogRecord) -> String {
    let ts = record.timestamp.format("%Y-%m-%d %H:%M:%S");
    match &record.label {
        Some(label) => format!("{} [{}] ", ts, label),
        None => format!("{} ", ts),
    }
}
