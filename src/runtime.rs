//! Runtime services and shared state for the response-bot.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::toggle::ResponseController,
    service::{chat::ChatClient, db::ResponseStore},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the response store, the controller that applies button
/// presses, the chat client, and the configuration. It is designed to be
/// trivially cloneable, allowing it to be passed around without the need for
/// `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The response store instance.
    pub store: ResponseStore,
    /// The controller applying button presses.
    pub controller: ResponseController,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Validate the prompt types.
        let prompts = config.prompt_registry()?;

        // Initialize the response store.
        let store = ResponseStore::surreal(&config).await?;

        // Initialize the controller.
        let controller = ResponseController::new(store.clone(), prompts);

        // Initialize the slack client.
        let chat = ChatClient::slack(&config, controller.clone()).await?;

        Ok(Self { config, store, controller, chat })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }
}
