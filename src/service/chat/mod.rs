pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::base::{
    prompt::PromptMessage,
    types::{RenderedGroup, Res, Void},
};

// Types.

/// Where a prompt message lives, and what it currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageContext {
    /// Opaque identifier the response store is keyed by.
    pub message_id: String,
    /// Channel the message was posted to.
    pub channel_id: String,
    /// Platform timestamp (or id) of the message inside the channel.
    pub message_ts: String,
    /// The message's currently rendered content in the platform's own format.
    ///
    /// Only used to keep content the bot did not generate when re-rendering.
    pub current: Option<Value>,
}

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like Slack. Implementing this trait allows different chat services to be used
/// with the response-bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Start the chat client listener.
    ///
    /// This sets up event listeners for the chat platform and begins processing
    /// prompt commands and button presses.
    async fn start(&self) -> Void;

    /// Post a prompt message with one button per group.
    ///
    /// Returns the context of the posted message, whose `message_id` keys the
    /// response record.
    async fn post_prompt(&self, channel_id: &str, prompt: &PromptMessage) -> Res<MessageContext>;

    /// Render the current groups into a posted prompt message.
    ///
    /// Only the fields that show the groups are replaced; everything else in the
    /// message is kept as it is.
    async fn render_responses(&self, context: &MessageContext, groups: &[RenderedGroup]) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
