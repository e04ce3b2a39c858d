//! Error types shared across the crate.

use thiserror::Error;

/// Raised while building configuration or a sink from it.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Telegram token is required")]
    MissingToken,

    #[error("Invalid configuration: {0}")]
    Figment(#[from] figment::Error),
}

/// The outcome of a single delivery attempt to one chat.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid chat id")]
    InvalidDestination,

    #[error("Invalid message")]
    InvalidMessage,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response")]
    MalformedResponse,

    #[error("{0}")]
    Provider(String),
}

impl DeliveryError {
    /// Returns true if the request timed out before the provider answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeliveryError::Transport(e) if e.is_timeout())
    }
}

/// A failure reported by a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("notification delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to initialize file appender: {0}")]
    Init(#[from] tracing_appender::rolling::InitError),

    #[error("no async runtime available: {0}")]
    Runtime(String),
}

/// Raised by the logger factory when a planned sink cannot be built.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build sink '{sink}': {source}")]
    Sink {
        sink: &'static str,
        #[source]
        source: SinkError,
    },
}
