//! crates/lead_bot_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the dialogue core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the storage backend, the registration API and the channel.

use crate::domain::{ConversationState, OutboundMessage, RegistrationGrant, Session, SessionPatch, SessionStats};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// Errors raised by the session store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Classified failures of the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The endpoint rejected the payload (HTTP 400).
    #[error("Registration request was malformed")]
    InvalidRequest,
    /// An account already exists for this email (HTTP 409).
    #[error("An account already exists for this email")]
    AlreadyRegistered,
    /// The endpoint answered but reported `success: false`.
    #[error("Registration was declined")]
    Declined,
    /// Anything else, including transport failures and timeouts.
    #[error("Registration service unavailable: {0}")]
    Unavailable(String),
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Per-correspondent conversation state, keyed by correspondent identifier.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Which backend is in use, for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    async fn get(&self, correspondent_id: &str) -> PortResult<Option<Session>>;

    /// Fails with `AlreadyExists` if the identifier is taken.
    async fn create(&self, correspondent_id: &str, display_name: Option<&str>) -> PortResult<Session>;

    /// Merges `patch` and bumps `updated_at`/`last_activity_at`.
    /// Fails with `NotFound` if no session exists.
    async fn update(&self, correspondent_id: &str, patch: SessionPatch) -> PortResult<Session>;

    async fn set_state(&self, correspondent_id: &str, state: ConversationState) -> PortResult<()> {
        self.update(correspondent_id, SessionPatch::state(state)).await?;
        Ok(())
    }

    /// All sessions, most recently active first.
    async fn list_all(&self) -> PortResult<Vec<Session>>;

    /// Sessions in `state`, most recently active first.
    async fn list_by_state(&self, state: ConversationState) -> PortResult<Vec<Session>>;

    /// Completed registrations, newest first by creation time.
    async fn list_completed(&self) -> PortResult<Vec<Session>>;

    /// Returns `true` if a session was removed.
    async fn delete(&self, correspondent_id: &str) -> PortResult<bool>;

    async fn stats(&self) -> PortResult<SessionStats>;
}

#[async_trait]
pub trait RegistrationService: Send + Sync {
    /// Creates an account and returns a one-time login link.
    async fn register(&self, full_name: &str, email: &str) -> Result<RegistrationGrant, RegistrationError>;
}

/// Best-effort outbound delivery. Implementations log their own failures.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn send(&self, correspondent_id: &str, message: &OutboundMessage) -> PortResult<()>;
}
