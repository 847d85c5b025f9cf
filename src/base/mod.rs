//! Core components, types, and utilities for the response-bot.
//!
//! This module contains the building blocks that do no I/O:
//! - Configuration handling and environment variables.
//! - Membership lists and per-message response sets.
//! - Prompt types, their validation, and their buttons.
//! - Common types, the core error taxonomy, and result handling.

pub mod config;
pub mod membership;
pub mod prompt;
pub mod types;
