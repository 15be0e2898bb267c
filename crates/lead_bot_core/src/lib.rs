pub mod dialogue;
pub mod domain;
pub mod locks;
pub mod memory;
pub mod messages;
pub mod ports;
pub mod validation;

pub use dialogue::{DialogueEngine, DialogueError, Turn};
pub use domain::{
    ConversationState, InboundMessage, OutboundMessage, RegistrationGrant, Session, SessionPatch,
    SessionStats,
};
pub use memory::MemorySessionStore;
pub use messages::DialogueMessages;
pub use ports::{
    MessageDispatcher, PortError, PortResult, RegistrationError, RegistrationService, SessionStore,
};
