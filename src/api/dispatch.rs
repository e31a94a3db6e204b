//! Outbound message delivery abstraction for one-time codes.
//!
//! Handlers build a [`Message`] (email or SMS body) and hand it to a
//! [`MessageSender`]. The sender decides how to deliver and returns
//! `Ok`/`Err`; a failure surfaces to the caller so the login attempt can
//! report it instead of silently dropping the code.
//!
//! The default sender for local dev is `LogMessageSender`, which logs the
//! payload and returns `Ok(())`. Production deployments implement the trait
//! over their email/SMS provider.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct Message {
    /// Email address or phone number, depending on the channel.
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery abstraction for one-time codes.
pub trait MessageSender: Send + Sync {
    /// Deliver a message or return an error to fail the request.
    fn send(&self, message: &Message) -> Result<()>;
}

/// Local dev sender that logs the payload instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogMessageSender;

impl MessageSender for LogMessageSender {
    fn send(&self, message: &Message) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "message delivery stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogMessageSender;
        let message = Message {
            to: "a@example.com".to_string(),
            subject: "Your verification code".to_string(),
            body: "123456".to_string(),
        };
        assert!(sender.send(&message).is_ok());
    }
}
