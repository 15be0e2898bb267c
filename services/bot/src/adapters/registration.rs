//! services/bot/src/adapters/registration.rs
//!
//! The adapter for the trading platform's quick-register endpoint.
//! It implements the `RegistrationService` port from the `core` crate.

use async_trait::async_trait;
use lead_bot_core::domain::RegistrationGrant;
use lead_bot_core::ports::{RegistrationError, RegistrationService};
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize)]
struct RegisterRequest<'a> {
    full_name: &'a str,
    email: &'a str,
}

#[derive(Deserialize, Debug)]
struct RegisterResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    auto_login_url: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Registers leads by POSTing JSON to the platform.
#[derive(Clone)]
pub struct HttpRegistrationClient {
    client: Client,
    url: String,
    success_message: String,
}

impl HttpRegistrationClient {
    /// `success_message` becomes the confirmation text of every grant.
    pub fn new(client: Client, url: impl Into<String>, success_message: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            success_message: success_message.into(),
        }
    }
}

/// Classifies a non-success HTTP status.
fn classify_status(status: StatusCode) -> RegistrationError {
    match status {
        StatusCode::BAD_REQUEST => RegistrationError::InvalidRequest,
        StatusCode::CONFLICT => RegistrationError::AlreadyRegistered,
        other => RegistrationError::Unavailable(format!("unexpected status {}", other)),
    }
}

fn grant_from(body: RegisterResponse, success_message: &str) -> Result<RegistrationGrant, RegistrationError> {
    if !body.success {
        return Err(RegistrationError::Declined);
    }
    Ok(RegistrationGrant {
        login_url: body.auto_login_url.filter(|url| !url.is_empty()),
        confirmation_text: success_message.to_string(),
    })
}

//=========================================================================================
// `RegistrationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl RegistrationService for HttpRegistrationClient {
    async fn register(&self, full_name: &str, email: &str) -> Result<RegistrationGrant, RegistrationError> {
        debug!(url = %self.url, "Sending registration request");
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .json(&RegisterRequest { full_name, email })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Registration request failed");
                RegistrationError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Registration endpoint returned an error status");
            return Err(classify_status(status));
        }

        let body = response
            .json::<RegisterResponse>()
            .await
            .map_err(|e| RegistrationError::Unavailable(format!("undecodable response: {}", e)))?;
        debug!(success = body.success, "Registration endpoint answered");
        grant_from(body, &self.success_message)
    }
}
