//! services/bot/src/lib.rs
//!
//! The channel-facing service: storage and HTTP adapters for the dialogue
//! core, plus the webhook and admin web surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
