//! services/bot/src/adapters/dispatcher.rs
//!
//! Outbound delivery adapters implementing the `MessageDispatcher` port.
//! The channel transport itself lives behind a gateway; this side only pushes
//! payloads to it.

use async_trait::async_trait;
use lead_bot_core::domain::OutboundMessage;
use lead_bot_core::ports::{MessageDispatcher, PortError, PortResult};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

/// The JSON body posted to the channel gateway.
#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayPayload<'a> {
    Text {
        chat_id: &'a str,
        text: &'a str,
    },
    LoginLink {
        chat_id: &'a str,
        caption: &'a str,
        url: &'a str,
        warning: &'a str,
    },
}

impl<'a> GatewayPayload<'a> {
    pub fn new(chat_id: &'a str, message: &'a OutboundMessage) -> Self {
        match message {
            OutboundMessage::Text(text) => Self::Text { chat_id, text },
            OutboundMessage::LoginLink {
                caption,
                url,
                warning,
            } => Self::LoginLink {
                chat_id,
                caption,
                url,
                warning,
            },
        }
    }
}

//=========================================================================================
// Webhook Dispatcher
//=========================================================================================

/// Pushes every outbound message to the channel gateway over HTTP.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl MessageDispatcher for WebhookDispatcher {
    async fn send(&self, correspondent_id: &str, message: &OutboundMessage) -> PortResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&GatewayPayload::new(correspondent_id, message))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("gateway unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(correspondent = %correspondent_id, status = %status, "Gateway refused message");
            return Err(PortError::Unexpected(format!("gateway answered {}", status)));
        }
        Ok(())
    }
}

//=========================================================================================
// Log Dispatcher
//=========================================================================================

/// Used when no gateway is configured: replies are only written to the log.
#[derive(Clone, Default)]
pub struct LogDispatcher;

#[async_trait]
impl MessageDispatcher for LogDispatcher {
    async fn send(&self, correspondent_id: &str, message: &OutboundMessage) -> PortResult<()> {
        info!(correspondent = %correspondent_id, text = %message.to_plain_text(), "Outbound message");
        Ok(())
    }
}
