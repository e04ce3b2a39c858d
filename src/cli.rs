//! Command-Line Interface (CLI) argument parsing.
//!
//! The `fanlog` binary logs one message through a fully configured logger.
//! Its options are merged over the TOML file and `FANLOG_` environment
//! variables, so a flag always wins.

use crate::core::Level;
use crate::notification::DEFAULT_API_BASE;
use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Log a message to the console, the rotating error log and, for emergencies, Telegram.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for log files.
    #[arg(long, value_name = "DIR")]
    pub dirname: Option<PathBuf>,

    /// Telegram bot token. Enables notifications for `emerg` records.
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Telegram chat id to notify. May be repeated.
    #[arg(long = "chat", value_name = "ID")]
    pub chats: Vec<String>,

    /// Keep running after a sink failure or an uncaught panic.
    #[arg(long)]
    pub no_exit_on_error: bool,

    /// Exit with status 1 as soon as a sink fails (unless exiting is disabled).
    #[arg(long)]
    pub propagate_errors: bool,

    /// Label attached to the record.
    #[arg(short, long)]
    pub label: Option<String>,

    /// Severity of the record.
    #[arg(long, default_value = "info")]
    pub level: Level,

    /// Panic after logging the message, to check uncaught-panic capture.
    #[arg(long, hide = true)]
    pub simulate_panic: bool,

    /// Base URL of the Telegram Bot API.
    #[arg(long, value_name = "URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// The message to log.
    pub message: String,
}

/// Numeric ids are passed as numbers, anything else as a channel name.
fn chat_value(chat: &str) -> Value {
    match chat.parse::<i64>() {
        Ok(id) => Value::from(id),
        Err(_) => Value::from(chat.to_string()),
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(dirname) = &self.dirname {
            dict.insert(
                "dirname".into(),
                Value::from(dirname.to_string_lossy().into_owned()),
            );
        }

        // Only an explicit flag overrides the configured policy.
        if self.no_exit_on_error {
            dict.insert("exit_on_error".into(), Value::from(false));
        }

        let mut telegram = Dict::new();
        if let Some(token) = &self.token {
            telegram.insert("token".into(), Value::from(token.clone()));
        }
        match self.chats.as_slice() {
            [] => {}
            [chat] => {
                telegram.insert("chats".into(), chat_value(chat));
            }
            chats => {
                let values: Vec<Value> = chats.iter().map(|c| chat_value(c)).collect();
                telegram.insert("chats".into(), Value::from(values));
            }
        }
        if !telegram.is_empty() {
            dict.insert("telegram".into(), Value::from(telegram));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
