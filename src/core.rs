//! Core domain types and the sink contract for fanlog
//!
//! This module defines the severity levels, the per-call log record, and the
//! trait every log destination implements.

use crate::error::SinkError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log record. Lower numeric value means more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Emerg = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 5] = [
        Level::Emerg,
        Level::Error,
        Level::Warning,
        Level::Info,
        Level::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Emerg => "emerg",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    /// Returns true if a sink configured at `self` should receive a record at `record`.
    ///
    /// A sink receives its own level and every more severe level.
    pub fn admits(&self, record: Level) -> bool {
        record <= *self
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emerg" => Ok(Level::Emerg),
            "error" => Ok(Level::Error),
            "warning" | "warn" => Ok(Level::Warning),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// A single log event, created per log call and shared by every sink.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub label: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<String>, label: Option<String>) -> Self {
        Self {
            level,
            message: message.into(),
            label,
            timestamp: Utc::now(),
        }
    }
}

/// A destination for log records.
#[async_trait]
pub trait Sink: Send + Sync {
    /// A short name for the sink (e.g., "console", "telegram").
    /// Used in diagnostics and on the error channel.
    fn name(&self) -> &str;

    /// The least severe level this sink accepts.
    fn level(&self) -> Level;

    /// Whether uncaught panics should also be written to this sink.
    fn handles_exceptions(&self) -> bool {
        false
    }

    /// Handles a record. Called only for records the sink's level admits.
    ///
    /// # Returns
    /// * `Ok(())` if the record was written or handed off
    /// * `Err` if the sink failed synchronously
    fn log(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Waits for any work the sink started in the background.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
