//! Escalation of the most severe records to chat destinations.
//!
//! `telegram` delivers one message to one chat and interprets the provider's
//! response envelope. `transport` implements the sink that fans a rendered
//! record out to every configured chat concurrently and reports the
//! aggregate outcome back to the logger.
pub mod telegram;
pub mod transport;

pub use telegram::{ChatId, MessageSender, TelegramClient, DEFAULT_API_BASE};
pub use transport::{fan_out, TelegramTransport, TransportSettings};
