//! crates/lead_bot_core/src/dialogue.rs
//!
//! The registration dialogue: a linear state machine over one `Session`.
//!
//! `decide` and `conclude_registration` are pure. `DialogueEngine` wraps them in a
//! per-correspondent critical section that loads the session, calls the
//! registration endpoint when needed, persists the result and dispatches replies.

use crate::domain::{
    ConversationState, InboundMessage, OutboundMessage, RegistrationGrant, Session, SessionPatch,
    STATUS_BROADCAST,
};
use crate::locks::KeyedLocks;
use crate::messages::{DialogueMessages, Keyword};
use crate::ports::{MessageDispatcher, PortError, RegistrationError, RegistrationService, SessionStore};
use crate::validation::{validate_email, validate_full_name};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

//=========================================================================================
// Errors and Results
//=========================================================================================

/// The failures that escape a transition. Input and registration
/// problems are answered with a re-prompt instead.
#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error("Session store error: {0}")]
    Store(#[from] PortError),
    /// The task running the transition panicked or was aborted.
    #[error("Dialogue task failed: {0}")]
    Task(String),
}

/// The persisted session and the replies produced by one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub session: Session,
    pub replies: Vec<OutboundMessage>,
}

//=========================================================================================
// Pure Decision Logic
//=========================================================================================

/// What the machine wants to do with one input.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Move to `next` (possibly identical to the current session) and send `replies`.
    Reply {
        next: Session,
        replies: Vec<OutboundMessage>,
    },
    /// A valid email arrived; the registration endpoint must be called.
    Register { full_name: String, email: String },
}

fn reply(next: Session, text: &str) -> Decision {
    Decision::Reply {
        next,
        replies: vec![OutboundMessage::text(text)],
    }
}

fn with_state(session: &Session, state: ConversationState) -> Session {
    Session {
        state,
        ..session.clone()
    }
}

/// Decides the next session and replies for `body`, given the current session.
pub fn decide(messages: &DialogueMessages, session: &Session, body: &str) -> Decision {
    match messages.keyword(body) {
        Some(Keyword::Restart) => {
            let fresh = session.reset();
            return reply(with_state(&fresh, ConversationState::AwaitingConfirmation), &messages.welcome);
        }
        Some(Keyword::Exit) => return reply(session.clone(), &messages.farewell),
        Some(Keyword::Help) => return reply(session.clone(), &messages.help),
        None => {}
    }

    match session.state {
        ConversationState::Welcome => reply(
            with_state(session, ConversationState::AwaitingConfirmation),
            &messages.welcome,
        ),
        ConversationState::AwaitingConfirmation => {
            if messages.is_affirmative(body) {
                reply(with_state(session, ConversationState::AwaitingName), &messages.name_request)
            } else {
                reply(session.clone(), &messages.confirmation_reprompt)
            }
        }
        ConversationState::AwaitingName => match validate_full_name(body) {
            Ok(full_name) => reply(
                Session {
                    full_name: Some(full_name),
                    state: ConversationState::AwaitingEmail,
                    ..session.clone()
                },
                &messages.email_request,
            ),
            Err(_) => reply(session.clone(), &messages.invalid_name),
        },
        ConversationState::AwaitingEmail => {
            let Some(full_name) = session.full_name.clone() else {
                // A name is required before registering; ask for it again.
                return reply(with_state(session, ConversationState::AwaitingName), &messages.name_request);
            };
            match validate_email(body) {
                Ok(email) => Decision::Register { full_name, email },
                Err(_) => reply(session.clone(), &messages.invalid_email),
            }
        }
        ConversationState::Completed => reply(session.clone(), &messages.already_registered),
    }
}

/// Folds the registration outcome into the session.
///
/// The email is only kept when the account was actually created.
pub fn conclude_registration(
    messages: &DialogueMessages,
    session: &Session,
    email: String,
    outcome: Result<RegistrationGrant, RegistrationError>,
) -> (Session, Vec<OutboundMessage>) {
    match outcome {
        Ok(grant) => {
            let mut replies = vec![OutboundMessage::Text(grant.confirmation_text)];
            if let Some(url) = &grant.login_url {
                replies.push(OutboundMessage::LoginLink {
                    caption: messages.login_caption.clone(),
                    url: url.clone(),
                    warning: messages.login_warning.clone(),
                });
            }
            let next = Session {
                email: Some(email),
                state: ConversationState::Completed,
                registration_complete: true,
                login_url: grant.login_url,
                ..session.clone()
            };
            (next, replies)
        }
        Err(e) => (
            session.clone(),
            vec![OutboundMessage::text(messages.registration_failure(&e))],
        ),
    }
}

//=========================================================================================
// The Engine
//=========================================================================================

pub struct DialogueEngine {
    store: Arc<dyn SessionStore>,
    registration: Arc<dyn RegistrationService>,
    dispatcher: Arc<dyn MessageDispatcher>,
    messages: DialogueMessages,
    locks: KeyedLocks,
    registration_timeout: Option<Duration>,
}

impl DialogueEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        registration: Arc<dyn RegistrationService>,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> Self {
        Self {
            store,
            registration,
            dispatcher,
            messages: DialogueMessages::default(),
            locks: KeyedLocks::new(),
            registration_timeout: None,
        }
    }

    pub fn with_messages(mut self, messages: DialogueMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Bounds each registration call; elapsing counts as `Unavailable`.
    pub fn with_registration_timeout(mut self, timeout: Duration) -> Self {
        self.registration_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn messages(&self) -> &DialogueMessages {
        &self.messages
    }

    /// Processes one inbound message.
    ///
    /// Returns `Ok(None)` for messages the dialogue ignores. Messages for the same
    /// correspondent are handled one at a time, in arrival order.
    ///
    /// The transition runs on its own task, so dropping the returned future does
    /// not abandon a registration between the endpoint call and the store write.
    pub async fn handle(self: &Arc<Self>, inbound: &InboundMessage) -> Result<Option<Turn>, DialogueError> {
        if inbound.from == STATUS_BROADCAST {
            debug!("Ignoring status broadcast");
            return Ok(None);
        }
        let engine = Arc::clone(self);
        let inbound = inbound.clone();
        tokio::spawn(async move { engine.run_locked(&inbound).await.map(Some) })
            .await
            .map_err(|e| DialogueError::Task(e.to_string()))?
    }

    async fn run_locked(&self, inbound: &InboundMessage) -> Result<Turn, DialogueError> {
        let correspondent = inbound.from.as_str();
        let _guard = self.locks.acquire(correspondent).await;

        match self.transition(inbound).await {
            Ok(turn) => {
                self.dispatch(correspondent, &turn.replies).await;
                Ok(turn)
            }
            Err(e) => {
                error!(correspondent = %correspondent, error = %e, "Transition failed");
                self.dispatch(correspondent, &[OutboundMessage::text(&self.messages.technical_error)])
                    .await;
                Err(e)
            }
        }
    }

    async fn transition(&self, inbound: &InboundMessage) -> Result<Turn, DialogueError> {
        let correspondent = inbound.from.as_str();
        let session = self
            .load_or_create(correspondent, inbound.display_name.as_deref())
            .await?;
        debug!(correspondent = %correspondent, state = %session.state, "Loaded session");

        let (next, replies) = match decide(&self.messages, &session, &inbound.body) {
            Decision::Reply { next, replies } => (next, replies),
            Decision::Register { full_name, email } => {
                let outcome = self.register(&full_name, &email).await;
                match &outcome {
                    Ok(_) => info!(correspondent = %correspondent, "Registration succeeded"),
                    Err(e) => warn!(correspondent = %correspondent, error = %e, "Registration failed"),
                }
                conclude_registration(&self.messages, &session, email, outcome)
            }
        };

        // Always written so that `last_activity_at` tracks every message.
        let patch = SessionPatch::between(&session, &next);
        let persisted = self.store.update(correspondent, patch).await?;
        if persisted.state != session.state {
            info!(
                correspondent = %correspondent,
                from = %session.state,
                to = %persisted.state,
                "State transition"
            );
        }
        Ok(Turn {
            session: persisted,
            replies,
        })
    }

    async fn load_or_create(
        &self,
        correspondent: &str,
        display_name: Option<&str>,
    ) -> Result<Session, PortError> {
        if let Some(session) = self.store.get(correspondent).await? {
            return Ok(session);
        }
        match self.store.create(correspondent, display_name).await {
            Ok(session) => {
                info!(correspondent = %correspondent, "Started new conversation");
                Ok(session)
            }
            Err(PortError::AlreadyExists(_)) => self
                .store
                .get(correspondent)
                .await?
                .ok_or_else(|| PortError::NotFound(format!("Session {} vanished", correspondent))),
            Err(e) => Err(e),
        }
    }

    async fn register(&self, full_name: &str, email: &str) -> Result<RegistrationGrant, RegistrationError> {
        let call = self.registration.register(full_name, email);
        match self.registration_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(RegistrationError::Unavailable(format!(
                    "no answer within {}s",
                    limit.as_secs_f32()
                )))
            }),
            None => call.await,
        }
    }

    async fn dispatch(&self, correspondent: &str, replies: &[OutboundMessage]) {
        for message in replies {
            if let Err(e) = self.dispatcher.send(correspondent, message).await {
                warn!(correspondent = %correspondent, error = %e, "Failed to deliver reply");
            }
        }
    }
}
