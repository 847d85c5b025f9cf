//! Chat service integration for response-bot.
//!
//! This module provides the Slack implementation of [`GenericChatClient`]:
//! - Receiving prompt commands and button presses over socket mode
//! - Posting prompt messages with one button per group
//! - Re-rendering the groups of a posted prompt in place
//!
//! Messages are built as Block Kit JSON and handed to `slack-morphism` as typed
//! blocks, which keeps the rendering rules testable without a workspace.

use crate::{
    base::{
        config::Config,
        prompt::PromptMessage,
        types::{RenderedGroup, Res, ToggleEvent, Void},
    },
    interaction::{
        prompt::{handle_prompt_command, resolve_prompt_command},
        toggle::{ResponseController, handle_toggle_event},
    },
};
use anyhow::anyhow;
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use serde::Deserialize;
use serde_json::{Value, json};
use slack_morphism::prelude::*;
use tracing::{info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient, MessageContext};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

/// Block id of the section that shows the groups.
pub const RESPONSES_BLOCK_ID: &str = "response-set";

/// Block id of the actions block holding the group buttons.
pub const ACTIONS_BLOCK_ID: &str = "response-actions";

/// Heading used when a message has no responses section yet.
const DEFAULT_RESPONSES_TITLE: &str = "Responses";

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, controller: ResponseController) -> Res<Self> {
        let client = SlackChatClient::new(config, controller).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    controller: ResponseController,
    chat: ChatClient,
}

/// Slack client implementation.
#[derive(Clone)]
pub struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub client: Arc<FullClient>,
    pub controller: ResponseController,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, controller: ResponseController) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Check the bot token before listening.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;

        info!("Slack bot user ID: {}", bot_user.user_id.0);

        Ok(Self {
            app_token,
            bot_token,
            client,
            controller,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_interaction_events(handle_interaction_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            controller: self.controller.clone(),
            chat: ChatClient::from(self.clone()),
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self, prompt))]
    async fn post_prompt(&self, channel_id: &str, prompt: &PromptMessage) -> Res<MessageContext> {
        let json_blocks = prompt_blocks(prompt);
        let blocks: Vec<SlackBlock> = serde_json::from_value(Value::Array(json_blocks.clone()))?;

        let content = SlackMessageContent::new().with_text(prompt.title.clone()).with_blocks(blocks);
        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), content);

        let session = self.client.open_session(&self.bot_token);

        let response = session.chat_post_message(&request).await.map_err(|e| anyhow!("Failed to post prompt: {}", e))?;

        let channel_id = response.channel.0;
        let message_ts = response.ts.0;

        Ok(MessageContext {
            message_id: slack_message_id(&channel_id, &message_ts),
            channel_id,
            message_ts,
            current: Some(Value::Array(json_blocks)),
        })
    }

    #[instrument(skip(self, context, groups), fields(message_id = %context.message_id))]
    async fn render_responses(&self, context: &MessageContext, groups: &[RenderedGroup]) -> Void {
        // Without the current blocks an update would wipe the prompt and its buttons.
        let current = context.current.as_ref().ok_or(anyhow!("The current content of `{}` is unknown.", context.message_id))?;

        let merged = merge_response_blocks(current, groups)?;
        let blocks: Vec<SlackBlock> = serde_json::from_value(Value::Array(merged))?;

        let request = SlackApiChatUpdateRequest::new(
            SlackChannelId(context.channel_id.clone()),
            SlackMessageContent::new().with_blocks(blocks),
            SlackTs(context.message_ts.clone()),
        );

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_update(&request).await.map_err(|e| anyhow!("Failed to update message: {}", e))?;

        Ok(())
    }
}

// Block Kit rendering.

/// The message identifier used as the response store key.
///
/// A Slack message is only unique within its channel.
pub fn slack_message_id(channel_id: &str, message_ts: &str) -> String {
    format!("{channel_id}:{message_ts}")
}

/// Formats the members of a group for a section field.
fn format_members(members: &[String]) -> String {
    if members.is_empty() {
        return "_none_".to_string();
    }

    members.iter().map(|m| format!("<@{m}>")).collect::<Vec<_>>().join(", ")
}

/// The section showing every group, under `text` (a Block Kit text object).
fn responses_block(text: Value, groups: &[RenderedGroup]) -> Value {
    let fields = groups
        .iter()
        .map(|g| {
            json!({
                "type": "mrkdwn",
                "text": format!("*{}*\n{}", g.name, format_members(&g.members)),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "type": "section",
        "block_id": RESPONSES_BLOCK_ID,
        "text": text,
        "fields": fields,
    })
}

fn is_responses_block(block: &Value) -> bool {
    block.get("block_id").and_then(Value::as_str) == Some(RESPONSES_BLOCK_ID)
}

fn is_actions_block(block: &Value) -> bool {
    block.get("type").and_then(Value::as_str) == Some("actions")
}

/// The blocks of a freshly posted prompt: heading, description, empty groups, buttons.
pub fn prompt_blocks(prompt: &PromptMessage) -> Vec<Value> {
    let empty = prompt
        .groups
        .iter()
        .map(|name| RenderedGroup {
            name: name.clone(),
            members: Vec::new(),
        })
        .collect::<Vec<_>>();

    let buttons = prompt
        .actions
        .iter()
        .enumerate()
        .map(|(index, action)| {
            let mut button = json!({
                "type": "button",
                "action_id": action.action_id,
                "value": action.label,
                "text": { "type": "plain_text", "text": action.label },
            });

            // Mirror a yes/no pair: the first choice is primary, the second is danger.
            match index {
                0 => button["style"] = json!("primary"),
                1 => button["style"] = json!("danger"),
                _ => {}
            }

            button
        })
        .collect::<Vec<_>>();

    vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": prompt.title },
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": prompt.description },
        }),
        responses_block(json!({ "type": "mrkdwn", "text": format!("*{}*", prompt.responses_title) }), &empty),
        json!({
            "type": "actions",
            "block_id": ACTIONS_BLOCK_ID,
            "elements": buttons,
        }),
    ]
}

/// Replaces the responses section inside `current` (a blocks array) with `groups`.
///
/// Every other block is kept in place. The section's heading is kept too; when the
/// section is missing it is inserted before the buttons.
pub fn merge_response_blocks(current: &Value, groups: &[RenderedGroup]) -> Res<Vec<Value>> {
    let mut blocks = current.as_array().cloned().ok_or(anyhow!("Message content is not a list of blocks."))?;

    let text = blocks
        .iter()
        .find(|b| is_responses_block(b))
        .and_then(|b| b.get("text"))
        .cloned()
        .unwrap_or_else(|| json!({ "type": "mrkdwn", "text": format!("*{DEFAULT_RESPONSES_TITLE}*") }));

    let rendered = responses_block(text, groups);

    if let Some(index) = blocks.iter().position(is_responses_block) {
        blocks[index] = rendered;
    } else if let Some(index) = blocks.iter().position(is_actions_block) {
        blocks.insert(index, rendered);
    } else {
        blocks.push(rendered);
    }

    Ok(blocks)
}

// Interaction payloads.

#[derive(Debug, Deserialize)]
struct PayloadUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PayloadChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PayloadContainer {
    message_ts: Option<String>,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayloadMessage {
    blocks: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PayloadAction {
    action_id: String,
}

#[derive(Debug, Deserialize)]
struct BlockActionsPayload {
    user: Option<PayloadUser>,
    container: PayloadContainer,
    channel: Option<PayloadChannel>,
    message: Option<PayloadMessage>,
    #[serde(default)]
    actions: Vec<PayloadAction>,
}

/// Turns a serialized `block_actions` interaction into toggle events.
///
/// Presses that are not on a channel message (e.g. in a modal) yield nothing.
pub fn parse_block_actions(payload: &Value) -> Res<Vec<(ToggleEvent, MessageContext)>> {
    let payload: BlockActionsPayload = serde_json::from_value(payload.clone())?;

    let Some(message_ts) = payload.container.message_ts else {
        return Ok(Vec::new());
    };

    let channel_id = payload
        .container
        .channel_id
        .or(payload.channel.map(|c| c.id))
        .ok_or(anyhow!("Button press on `{}` has no channel.", message_ts))?;

    let user_id = payload.user.map(|u| u.id).ok_or(anyhow!("Button press on `{}` has no user.", message_ts))?;

    let message_id = slack_message_id(&channel_id, &message_ts);

    let context = MessageContext {
        message_id: message_id.clone(),
        channel_id,
        message_ts,
        current: payload.message.and_then(|m| m.blocks),
    };

    Ok(payload
        .actions
        .into_iter()
        .map(|action| (ToggleEvent::new(message_id.clone(), user_id.clone(), action.action_id), context.clone()))
        .collect())
}

// Socket mode listener callbacks for Slack.

/// Handles command events from Slack.
///
/// Prompt commands are acknowledged right away; the prompt is posted by a spawned task.
#[instrument(skip_all)]
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow!("Failed to get user state"))?;

    info!("Received command `{}` from `{}` ...", event.command.0, event.user_id.0);

    let reply = match resolve_prompt_command(user_state.controller.prompts(), &event.command.0, event.text.as_deref()) {
        Ok((template, subject)) => {
            handle_prompt_command(
                template.clone(),
                subject,
                event.channel_id.0.clone(),
                user_state.controller.store().clone(),
                user_state.chat.clone(),
            );

            format!("Posting a new {} ...", template.name())
        }
        Err(reply) => reply,
    };

    Ok(SlackCommandEventResponse::new(SlackMessageContent::new().with_text(reply)))
}

/// Handles interaction events from Slack.
///
/// Every button press becomes a toggle event handled on its own task.
#[instrument(skip_all)]
async fn handle_interaction_event(event: SlackInteractionEvent, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let SlackInteractionEvent::BlockActions(block_actions) = event else {
        warn!("Received unhandled interaction event.");
        return Ok(());
    };

    let presses = parse_block_actions(&serde_json::to_value(&block_actions)?)?;

    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow!("Failed to get user state"))?;

    for (event, context) in presses {
        handle_toggle_event(event, context, user_state.controller.clone(), user_state.chat.clone());
    }

    Ok(())
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::prompt::{PromptConfig, PromptFactory};

    fn quiz_message() -> PromptMessage {
        PromptFactory::build(&PromptConfig::quiz()).unwrap().message("AAPL")
    }

    fn groups(up: &[&str], down: &[&str]) -> Vec<RenderedGroup> {
        vec![
            RenderedGroup {
                name: "UP".to_string(),
                members: up.iter().map(|m| m.to_string()).collect(),
            },
            RenderedGroup {
                name: "DOWN".to_string(),
                members: down.iter().map(|m| m.to_string()).collect(),
            },
        ]
    }

    #[test]
    fn test_prompt_blocks_layout() {
        let blocks = prompt_blocks(&quiz_message());

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0]["text"]["text"], "Stock Quiz");
        assert_eq!(blocks[1]["text"]["text"], "Guess the stock direction of AAPL");
        assert_eq!(blocks[2]["block_id"], RESPONSES_BLOCK_ID);
        assert_eq!(blocks[2]["fields"][0]["text"], "*UP*\n_none_");

        let buttons = blocks[3]["elements"].as_array().unwrap();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0]["action_id"], "up");
        assert_eq!(buttons[0]["style"], "primary");
        assert_eq!(buttons[1]["action_id"], "down");
        assert_eq!(buttons[1]["style"], "danger");
    }

    #[test]
    fn test_prompt_blocks_are_valid_slack_blocks() {
        let blocks: Result<Vec<SlackBlock>, _> = serde_json::from_value(Value::Array(prompt_blocks(&quiz_message())));

        assert!(blocks.is_ok());
    }

    #[test]
    fn test_merge_replaces_only_the_responses_section() {
        let current = Value::Array(prompt_blocks(&quiz_message()));

        let merged = merge_response_blocks(&current, &groups(&["U1", "U2"], &["U3"])).unwrap();

        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0], current[0]);
        assert_eq!(merged[1], current[1]);
        assert_eq!(merged[3], current[3]);
        assert_eq!(merged[2]["text"]["text"], "*Responses*");
        assert_eq!(merged[2]["fields"][0]["text"], "*UP*\n<@U1>, <@U2>");
        assert_eq!(merged[2]["fields"][1]["text"], "*DOWN*\n<@U3>");
    }

    #[test]
    fn test_merge_inserts_missing_section_before_buttons() {
        let current = json!([
            { "type": "section", "text": { "type": "mrkdwn", "text": "Lunch on Friday" } },
            { "type": "actions", "elements": [] },
        ]);

        let merged = merge_response_blocks(&current, &groups(&[], &["U1"])).unwrap();

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1]["block_id"], RESPONSES_BLOCK_ID);
        assert_eq!(merged[2]["type"], "actions");
    }

    #[test]
    fn test_merge_rejects_non_block_content() {
        assert!(merge_response_blocks(&json!({ "text": "hi" }), &groups(&[], &[])).is_err());
    }

    #[test]
    fn test_parse_block_actions() {
        let payload = json!({
            "type": "block_actions",
            "user": { "id": "U123", "username": "alice" },
            "container": { "type": "message", "message_ts": "1700000000.000100", "channel_id": "C42", "is_ephemeral": false },
            "message": { "ts": "1700000000.000100", "blocks": [{ "type": "actions", "elements": [] }] },
            "actions": [{ "type": "button", "action_id": "down", "block_id": ACTIONS_BLOCK_ID, "action_ts": "1700000001.000200" }],
        });

        let presses = parse_block_actions(&payload).unwrap();

        assert_eq!(presses.len(), 1);
        let (event, context) = &presses[0];
        assert_eq!(event, &ToggleEvent::new("C42:1700000000.000100", "U123", "down"));
        assert_eq!(context.channel_id, "C42");
        assert_eq!(context.message_ts, "1700000000.000100");
        assert_eq!(context.current, Some(json!([{ "type": "actions", "elements": [] }])));
    }

    #[test]
    fn test_parse_block_actions_outside_messages() {
        let payload = json!({
            "type": "block_actions",
            "user": { "id": "U123" },
            "container": { "type": "view", "view_id": "V1" },
            "actions": [{ "action_id": "up" }],
        });

        assert!(parse_block_actions(&payload).unwrap().is_empty());
    }
}
