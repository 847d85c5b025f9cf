//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the response-bot:
//! - Chat services (e.g., Slack)
//! - Response storage (e.g., SurrealDB)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod db;
