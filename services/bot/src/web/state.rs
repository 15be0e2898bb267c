//! services/bot/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use lead_bot_core::dialogue::DialogueEngine;
use lead_bot_core::ports::SessionStore;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DialogueEngine>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(engine: Arc<DialogueEngine>, config: Arc<Config>) -> Self {
        Self { engine, config }
    }

    /// The store behind the engine; admin handlers read and write it directly.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        self.engine.store()
    }
}
