//! Event handling and user interactions for response-bot.
//!
//! This module provides functionality for handling chat events:
//! - Posting prompts and creating their response records
//! - Applying button presses to a message's groups
//! - Serializing concurrent presses on the same message

pub mod locks;
pub mod prompt;
pub mod toggle;
