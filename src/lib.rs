//! Library root for `response-bot`.
//!
//! Response-bot posts interactive prompts to Slack and tracks who pressed which
//! button:
//! - Each prompt message hosts two or more mutually exclusive groups
//!   (e.g. `UP`/`DOWN` for a stock quiz, `Going`/`Flaking` for an event)
//! - A user belongs to at most one group per message; pressing another button moves them
//! - Membership is persisted per message and survives restarts
//! - Concurrent presses on the same message are applied one at a time
//!
//! The bot integrates with Slack for chat and SurrealDB for storage. The
//! architecture is built around traits that allow for different implementations
//! of each service.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the response-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with the store, controller, and chat client
/// - Starts the main event loop for processing commands and button presses
pub async fn start(config: Config) -> Void {
    info!("Starting response-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider().install_default().map_err(|_| anyhow::anyhow!("Failed to install the crypto provider."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
