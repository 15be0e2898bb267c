//! services/bot/src/web/inbound.rs
//!
//! The webhook the channel gateway calls for every message it receives.

use crate::web::rest::ErrorResponse;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use lead_bot_core::domain::{InboundMessage, OutboundMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

//=========================================================================================
// Payload Structs
//=========================================================================================

/// A message as delivered by the channel gateway.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InboundPayload {
    /// Channel identifier of the sender, e.g. `391234@c.us`.
    pub from: String,
    pub body: String,
    /// Profile name shown by the channel, if any. `display_name` is still accepted.
    #[serde(default, alias = "display_name")]
    pub display_name: Option<String>,
}

/// One reply produced by the dialogue.
#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct ReplyView {
    /// `text` or `login_link`.
    pub kind: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&OutboundMessage> for ReplyView {
    fn from(message: &OutboundMessage) -> Self {
        match message {
            OutboundMessage::Text(text) => Self {
                kind: "text".to_string(),
                text: text.clone(),
                url: None,
            },
            OutboundMessage::LoginLink { url, .. } => Self {
                kind: "login_link".to_string(),
                text: message.to_plain_text(),
                url: Some(url.clone()),
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct InboundResponse {
    pub state: String,
    pub replies: Vec<ReplyView>,
}

//=========================================================================================
// Handler
//=========================================================================================

/// Feed one inbound message to the dialogue.
///
/// The replies are also pushed through the configured dispatcher; they are
/// returned here for gateways that prefer to deliver them inline.
#[utoipa::path(
    post,
    path = "/webhook/messages",
    request_body = InboundPayload,
    responses(
        (status = 200, description = "Message processed", body = InboundResponse),
        (status = 202, description = "Message ignored"),
        (status = 503, description = "Session storage unavailable", body = ErrorResponse)
    )
)]
pub async fn inbound_message_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<InboundPayload>,
) -> Response {
    let inbound = InboundMessage {
        from: payload.from,
        body: payload.body,
        display_name: payload.display_name,
    };
    debug!(correspondent = %inbound.from, "Inbound message");

    match app_state.engine.handle(&inbound).await {
        Ok(Some(turn)) => Json(InboundResponse {
            state: turn.session.state.to_string(),
            replies: turn.replies.iter().map(ReplyView::from).collect(),
        })
        .into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            error!(correspondent = %inbound.from, error = %e, "Failed to process inbound message");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Session storage unavailable")),
            )
                .into_response()
        }
    }
}
