//! Configuration management for fanlog
//!
//! This module defines `GlobalOptions`, the process-wide settings that decide
//! which sinks a logger gets, and the `ConfigStore` that accumulates them
//! across repeated logger constructions. Options can be loaded with `figment`
//! from a TOML file and `FANLOG_`-prefixed environment variables.

use crate::error::ConfigError;
use arc_swap::ArcSwap;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default directory for log files.
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Prefix for environment variable overrides, e.g. `FANLOG_TELEGRAM__TOKEN`.
pub const ENV_PREFIX: &str = "FANLOG_";

/// Chat destinations, given either as a single id or as a list of ids.
///
/// Raw values are kept so that an invalid id fails its own delivery attempt
/// instead of the whole configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destinations {
    Many(Vec<Value>),
    One(Value),
}

impl Destinations {
    pub fn one(id: impl Into<Value>) -> Self {
        Destinations::One(id.into())
    }

    pub fn many<I, V>(ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Destinations::Many(ids.into_iter().map(Into::into).collect())
    }

    /// Normalizes to an ordered list; a single id becomes a one-element list.
    pub fn to_vec(&self) -> Vec<Value> {
        match self {
            Destinations::Many(ids) => ids.clone(),
            Destinations::One(id) => vec![id.clone()],
        }
    }
}

/// Telegram credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramOptions {
    /// The bot token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Chats that receive escalated records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chats: Option<Destinations>,
}

/// Process-wide logger settings.
///
/// Every field is optional: the same type describes both the accumulated
/// configuration and an incoming partial update. Defaults are applied only
/// when a value is resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalOptions {
    /// Credentials for escalating `emerg` records to Telegram.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramOptions>,
    /// Directory for the rotating and exception log files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirname: Option<PathBuf>,
    /// Whether a propagated failure terminates the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_on_error: Option<bool>,
}

impl GlobalOptions {
    /// Returns a copy of `self` with every field present in `partial` overridden.
    ///
    /// Fields absent from `partial` are kept. The telegram section is merged
    /// field by field, so a token and a chat list may arrive in separate calls.
    pub fn merge(&self, partial: &GlobalOptions) -> GlobalOptions {
        let mut merged = self.clone();

        if let Some(incoming) = &partial.telegram {
            let telegram = merged.telegram.get_or_insert_with(TelegramOptions::default);
            if let Some(token) = &incoming.token {
                telegram.token = Some(token.clone());
            }
            if let Some(chats) = &incoming.chats {
                telegram.chats = Some(chats.clone());
            }
        }

        if let Some(dirname) = &partial.dirname {
            merged.dirname = Some(dirname.clone());
        }

        if let Some(exit_on_error) = partial.exit_on_error {
            merged.exit_on_error = Some(exit_on_error);
        }

        merged
    }

    /// The log directory, falling back to `./logs`.
    pub fn log_dir(&self) -> PathBuf {
        self.dirname
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
    }

    /// The exit policy, falling back to `true`.
    pub fn exit_on_error(&self) -> bool {
        self.exit_on_error.unwrap_or(true)
    }

    /// The telegram token, if one has been configured.
    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram.as_ref().and_then(|t| t.token.as_deref())
    }

    /// The configured chats, if any.
    pub fn telegram_chats(&self) -> Option<&Destinations> {
        self.telegram.as_ref().and_then(|t| t.chats.as_ref())
    }

    /// Extracts options from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// Builds the standard provider stack: an optional TOML file, then the
    /// environment (e.g., `FANLOG_DIRNAME=/var/log/app`).
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["env"]))
    }

    /// Loads options from the given TOML file (if any) and the environment.
    ///
    /// # Arguments
    /// * `config_path` - The path to the TOML configuration file.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(config_path))
    }
}

static GLOBAL_STORE: Lazy<ConfigStore> = Lazy::new(ConfigStore::new);

/// Accumulates `GlobalOptions` across logger constructions.
///
/// Merges are applied atomically, so concurrent merges never lose fields.
/// There is no removal: a value persists until a later merge overrides it.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: ArcSwap<GlobalOptions>,
}

impl ConfigStore {
    /// Creates an empty, independent store.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(GlobalOptions::default()),
        }
    }

    /// The process-wide store, created on first use and never destroyed.
    pub fn global() -> &'static ConfigStore {
        &GLOBAL_STORE
    }

    /// Merges `partial` into the stored options.
    pub fn merge(&self, partial: &GlobalOptions) {
        self.current.rcu(|current| Arc::new(current.merge(partial)));
    }

    /// Returns the options as of now.
    pub fn snapshot(&self) -> Arc<GlobalOptions> {
        self.current.load_full()
    }
}
