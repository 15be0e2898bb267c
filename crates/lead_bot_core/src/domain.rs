//! crates/lead_bot_core/src/domain.rs
//!
//! Defines the pure, core data structures for the registration dialogue.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Pseudo-correspondent the channel uses for status broadcasts.
pub const STATUS_BROADCAST: &str = "status@broadcast";

//=========================================================================================
// Conversation State
//=========================================================================================

/// Which input the dialogue expects next from a correspondent.
///
/// Variants are declared in transition order, so `Ord` follows the happy path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConversationState {
    Welcome,
    AwaitingConfirmation,
    AwaitingName,
    AwaitingEmail,
    Completed,
}

impl ConversationState {
    pub const ALL: [ConversationState; 5] = [
        Self::Welcome,
        Self::AwaitingConfirmation,
        Self::AwaitingName,
        Self::AwaitingEmail,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingEmail => "awaiting_email",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown conversation state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for ConversationState {
    type Err = UnknownState;

    /// Accepts the canonical names plus the legacy `waiting_for_*` spellings
    /// still present in older rows.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "welcome" => Ok(Self::Welcome),
            "awaiting_confirmation" | "waiting_for_yes" => Ok(Self::AwaitingConfirmation),
            "awaiting_name" | "waiting_for_name" => Ok(Self::AwaitingName),
            "awaiting_email" | "waiting_for_email" => Ok(Self::AwaitingEmail),
            "completed" => Ok(Self::Completed),
            _ => Err(UnknownState(s.to_string())),
        }
    }
}

//=========================================================================================
// Session
//=========================================================================================

/// The durable record of one correspondent's conversation progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub correspondent_id: String,
    /// Channel profile name, captured once at creation.
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub state: ConversationState,
    pub registration_complete: bool,
    /// One-time login link. Single use is a messaging convention only.
    pub login_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session in the `Welcome` state.
    pub fn new(correspondent_id: impl Into<String>, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            correspondent_id: correspondent_id.into(),
            display_name,
            full_name: None,
            email: None,
            state: ConversationState::Welcome,
            registration_complete: false,
            login_url: None,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        }
    }

    /// Returns the session as it looks after "start new registration".
    ///
    /// Identity, display name and creation time survive; everything captured
    /// by the dialogue is cleared.
    pub fn reset(&self) -> Session {
        Session {
            full_name: None,
            email: None,
            state: ConversationState::Welcome,
            registration_complete: false,
            login_url: None,
            ..self.clone()
        }
    }

    /// The correspondent identifier without the channel suffix (e.g. `@c.us`).
    pub fn short_id<'a>(&'a self, suffix: &str) -> &'a str {
        self.correspondent_id
            .strip_suffix(suffix)
            .unwrap_or(&self.correspondent_id)
    }
}

//=========================================================================================
// Partial Updates
//=========================================================================================

/// A set of field changes for `SessionStore::update`.
///
/// `None` leaves a field untouched; for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub full_name: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub state: Option<ConversationState>,
    pub registration_complete: Option<bool>,
    pub login_url: Option<Option<String>>,
}

impl SessionPatch {
    pub fn state(state: ConversationState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// The patch that turns `old` into `new`, covering only the fields that differ.
    pub fn between(old: &Session, new: &Session) -> Self {
        fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
            (old != new).then(|| new.clone())
        }
        Self {
            full_name: changed(&old.full_name, &new.full_name),
            email: changed(&old.email, &new.email),
            state: changed(&old.state, &new.state),
            registration_complete: changed(&old.registration_complete, &new.registration_complete),
            login_url: changed(&old.login_url, &new.login_url),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Produces the updated session, bumping the activity timestamps to `now`.
    pub fn apply(&self, session: &Session, now: DateTime<Utc>) -> Session {
        let mut next = session.clone();
        if let Some(full_name) = &self.full_name {
            next.full_name = full_name.clone();
        }
        if let Some(email) = &self.email {
            next.email = email.clone();
        }
        if let Some(state) = self.state {
            next.state = state;
        }
        if let Some(complete) = self.registration_complete {
            next.registration_complete = complete;
        }
        if let Some(login_url) = &self.login_url {
            next.login_url = login_url.clone();
        }
        next.updated_at = now;
        next.last_activity_at = now;
        next
    }
}

//=========================================================================================
// Aggregates and Messages
//=========================================================================================

/// Aggregate counts over all sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub by_state: BTreeMap<ConversationState, u64>,
}

impl SessionStats {
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut stats = Self::default();
        for session in sessions {
            stats.total += 1;
            if session.registration_complete {
                stats.completed += 1;
            } else {
                stats.pending += 1;
            }
            *stats.by_state.entry(session.state).or_insert(0) += 1;
        }
        stats
    }
}

/// A successful answer from the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationGrant {
    pub login_url: Option<String>,
    pub confirmation_text: String,
}

/// A message received from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: String,
    pub body: String,
    pub display_name: Option<String>,
}

/// A payload the dialogue asks the channel to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    /// A rich login button; channels without buttons render it as text.
    LoginLink {
        caption: String,
        url: String,
        warning: String,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    /// Plain-text rendering for channels without rich payloads.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Text(body) => body.clone(),
            Self::LoginLink {
                caption,
                url,
                warning,
            } => format!("{caption}: {url}\n{warning}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parses_canonical_and_legacy_names() {
        for state in ConversationState::ALL {
            assert_eq!(state.as_str().parse::<ConversationState>(), Ok(state));
        }
        assert_eq!(
            "waiting_for_yes".parse::<ConversationState>(),
            Ok(ConversationState::AwaitingConfirmation)
        );
        assert!("sleeping".parse::<ConversationState>().is_err());
    }

    #[test]
    fn reset_keeps_identity_and_clears_progress() {
        let mut session = Session::new("391234@c.us", Some("Maria".into()));
        session.full_name = Some("Maria Rossi".into());
        session.email = Some("maria@example.com".into());
        session.state = ConversationState::Completed;
        session.registration_complete = true;
        session.login_url = Some("https://x/y".into());

        let reset = session.reset();
        assert_eq!(reset.correspondent_id, session.correspondent_id);
        assert_eq!(reset.display_name.as_deref(), Some("Maria"));
        assert_eq!(reset.created_at, session.created_at);
        assert_eq!(reset.state, ConversationState::Welcome);
        assert!(reset.full_name.is_none());
        assert!(reset.email.is_none());
        assert!(reset.login_url.is_none());
        assert!(!reset.registration_complete);
    }

    #[test]
    fn patch_between_only_carries_changed_fields() {
        let old = Session::new("a@c.us", None);
        let mut new = old.clone();
        new.full_name = Some("Al".into());
        new.state = ConversationState::AwaitingEmail;

        let patch = SessionPatch::between(&old, &new);
        assert_eq!(patch.full_name, Some(Some("Al".into())));
        assert_eq!(patch.state, Some(ConversationState::AwaitingEmail));
        assert!(patch.email.is_none());
        assert!(patch.login_url.is_none());
        assert!(SessionPatch::between(&old, &old).is_empty());
    }

    #[test]
    fn patch_apply_clears_nullable_fields_and_bumps_activity() {
        let mut session = Session::new("a@c.us", None);
        session.email = Some("a@b.c".into());
        let later = session.updated_at + chrono::Duration::seconds(5);

        let patch = SessionPatch {
            email: Some(None),
            ..SessionPatch::default()
        };
        let next = patch.apply(&session, later);
        assert!(next.email.is_none());
        assert_eq!(next.updated_at, later);
        assert_eq!(next.last_activity_at, later);
        assert_eq!(next.created_at, session.created_at);
    }

    #[test]
    fn stats_count_completed_and_pending() {
        let mut done = Session::new("1@c.us", None);
        done.state = ConversationState::Completed;
        done.registration_complete = true;
        let waiting = Session::new("2@c.us", None);

        let stats = SessionStats::from_sessions([&done, &waiting]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.by_state.get(&ConversationState::Welcome), Some(&1));
    }

    #[test]
    fn short_id_strips_channel_suffix() {
        let session = Session::new("391234@c.us", None);
        assert_eq!(session.short_id("@c.us"), "391234");
        assert_eq!(session.short_id("@g.us"), "391234@c.us");
    }
}
