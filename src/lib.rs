//! Router Chat - a terminal chat client for OpenRouter.
//!
//! This library exposes the core modules for testing and reuse.

pub mod auth;
pub mod chat;
pub mod config;
pub mod llm;
pub mod message;
pub mod terminal;
