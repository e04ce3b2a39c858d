//! A client for sending text messages through the Telegram Bot API.

use crate::error::DeliveryError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// The public Bot API host.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Upper bound on a single `sendMessage` call.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// A validated chat destination.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatId {
    Numeric(serde_json::Number),
    Name(String),
}

impl ChatId {
    /// Accepts numbers (including floats) and strings.
    pub fn from_value(value: &Value) -> Result<Self, DeliveryError> {
        match value {
            Value::Number(n) => Ok(ChatId::Numeric(n.clone())),
            Value::String(s) => Ok(ChatId::Name(s.clone())),
            _ => Err(DeliveryError::InvalidDestination),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            ChatId::Numeric(n) => Value::Number(n.clone()),
            ChatId::Name(s) => Value::String(s.clone()),
        }
    }
}

/// Accepts a string or number as message text; numbers are sent as their text.
fn message_text(message: &Value) -> Result<String, DeliveryError> {
    match message {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(DeliveryError::InvalidMessage),
    }
}

/// Mirrors JavaScript-style truthiness for the envelope's `ok` field.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Interprets the provider's `{ok, description}` response envelope.
pub fn interpret_response(body: &Value) -> Result<(), DeliveryError> {
    let envelope = body.as_object().ok_or(DeliveryError::MalformedResponse)?;

    if !is_truthy(envelope.get("ok")) {
        let description = envelope
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .unwrap_or("Unknown error");
        return Err(DeliveryError::Provider(description.to_string()));
    }

    Ok(())
}

/// A trait for clients that deliver one message to one chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `message` to `chat` using the bot `token`.
    async fn send(&self, token: &str, chat: &Value, message: &Value) -> Result<(), DeliveryError>;
}

/// Sends messages with `POST {api_base}/bot{token}/sendMessage`.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    timeout: Duration,
}

impl TelegramClient {
    /// Creates a new `TelegramClient` against `api_base` (see `DEFAULT_API_BASE`).
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_timeout(api_base, SEND_TIMEOUT)
    }

    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn endpoint(&self, token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, token)
    }
}

impl Default for TelegramClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    #[instrument(skip(self, token, message), fields(chat = %chat))]
    async fn send(&self, token: &str, chat: &Value, message: &Value) -> Result<(), DeliveryError> {
        let chat_id = ChatId::from_value(chat)?;
        let text = message_text(message)?;

        let payload = json!({
            "chat_id": chat_id.to_value(),
            "text": text,
            "disable_notification": false,
        });

        let response = self
            .http
            .post(self.endpoint(token))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "HTTP request to Telegram failed");
                DeliveryError::Transport(e)
            })?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let body: Value = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(_) => {
                warn!(status = %status, "Telegram returned a non-JSON body");
                return Err(DeliveryError::MalformedResponse);
            }
        };

        interpret_response(&body)?;
        debug!("Message delivered to Telegram.");
        Ok(())
    }
}
