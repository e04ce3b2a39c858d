//! fanlog - a leveled logging facade with multi-sink dispatch
//!
//! A `Logger` routes each record to every configured sink whose level admits
//! it: the console, a daily rotating error log, and a Telegram notifier that
//! fans emergencies out to several chats. `LoggerFactory` decides which sinks
//! a logger gets from the accumulated `GlobalOptions`.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod factory;
pub mod formatting;
pub mod logger;
pub mod notification;
pub mod sinks;

pub use crate::config::{ConfigStore, Destinations, GlobalOptions, TelegramOptions};
pub use crate::core::{Level, LogRecord, Sink};
pub use crate::error::{ConfigError, DeliveryError, LoggerError, SinkError};
pub use crate::factory::{create_logger, DeploymentMode, LoggerFactory, LoggerOptions};
pub use crate::logger::{Logger, SinkErrorPolicy};
