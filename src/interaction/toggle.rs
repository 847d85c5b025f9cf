//! The toggle protocol: moving a user between the groups of one message.

use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::{
    base::{
        membership::ResponseSet,
        prompt::PromptRegistry,
        types::{ResponseError, ResponseResult, ToggleEvent},
    },
    service::{
        chat::{ChatClient, MessageContext},
        db::ResponseStore,
    },
};

use super::locks::MessageLocks;

/// Result of a toggle that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The set changed and was persisted.
    Changed(ResponseSet),
    /// The press had no effect; nothing was written.
    Unchanged(ResponseSet),
}

impl ToggleOutcome {
    pub fn set(&self) -> &ResponseSet {
        match self {
            Self::Changed(set) | Self::Unchanged(set) => set,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Applies a press of `user_id` on group `target` to `set`.
///
/// Joining a group removes the user from every other group. Pressing the group the
/// user is already in leaves it when `allow_leave` is set and does nothing otherwise.
/// Returns `true` if the set changed; a `target` outside the set changes nothing.
pub(crate) fn apply_toggle(set: &mut ResponseSet, target: usize, user_id: &str, allow_leave: bool) -> bool {
    let groups = set.groups_mut();

    let Some(current) = groups.get_mut(target) else {
        return false;
    };

    if current.contains(user_id) {
        return allow_leave && current.remove(user_id);
    }

    for (index, group) in groups.iter_mut().enumerate() {
        if index != target {
            group.remove(user_id);
        }
    }

    groups[target].add(user_id)
}

/// Orchestrates button presses against the response store.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ResponseController {
    store: ResponseStore,
    prompts: PromptRegistry,
    locks: MessageLocks,
}

impl ResponseController {
    pub fn new(store: ResponseStore, prompts: PromptRegistry) -> Self {
        Self {
            store,
            prompts,
            locks: MessageLocks::new(),
        }
    }

    pub fn store(&self) -> &ResponseStore {
        &self.store
    }

    pub fn prompts(&self) -> &PromptRegistry {
        &self.prompts
    }

    /// Handles one press.
    ///
    /// The load-modify-save sequence runs under the message's lock, so concurrent
    /// presses on one message are applied one after another and none is lost.
    #[instrument(skip(self), fields(message_id = %event.message_id, user_id = %event.user_id, action_id = %event.action_id))]
    pub async fn toggle(&self, event: &ToggleEvent) -> ResponseResult<ToggleOutcome> {
        let _guard = self.locks.lock(&event.message_id).await;

        self.toggle_locked(event).await
    }

    /// Handles one press and renders the message when the set changed.
    ///
    /// The render happens before the message's lock is released, so renders reach
    /// the platform in the same order as the writes and the last one shows the
    /// stored state. Render failures are logged, not returned.
    #[instrument(skip(self, context, chat), fields(message_id = %event.message_id, user_id = %event.user_id, action_id = %event.action_id))]
    pub async fn toggle_and_render(&self, event: &ToggleEvent, context: &MessageContext, chat: &ChatClient) -> ResponseResult<ToggleOutcome> {
        let _guard = self.locks.lock(&event.message_id).await;

        let outcome = self.toggle_locked(event).await?;

        if outcome.is_changed() {
            info!("Recorded press of `{}` by `{}` on `{}`.", event.action_id, event.user_id, event.message_id);

            if let Err(err) = chat.render_responses(context, &outcome.set().rendered()).await {
                warn!("Failed to render responses for `{}`: {}", event.message_id, err);
            }
        }

        Ok(outcome)
    }

    /// Load, apply and save. Callers hold the message's lock.
    async fn toggle_locked(&self, event: &ToggleEvent) -> ResponseResult<ToggleOutcome> {
        let mut set = self.store.load_groups(&event.message_id).await?;

        let target = set.group_for_action(&event.action_id).ok_or_else(|| ResponseError::UnknownAction {
            message_id: event.message_id.clone(),
            action_id: event.action_id.clone(),
        })?;

        let allow_leave = self.allow_leave(set.prompt());

        if !apply_toggle(&mut set, target, &event.user_id, allow_leave) {
            debug!("Press had no effect.");
            return Ok(ToggleOutcome::Unchanged(set));
        }

        self.store.save_groups(&event.message_id, &set).await?;

        Ok(ToggleOutcome::Changed(set))
    }

    fn allow_leave(&self, prompt: &str) -> bool {
        match self.prompts.by_name(prompt) {
            Some(template) => template.allow_leave(),
            None => {
                warn!("Prompt `{}` is no longer configured; treating it as join-only.", prompt);
                false
            }
        }
    }
}

/// Handles a button press event.
///
/// Spawns a task that applies the press and, when the set changed, re-renders the
/// message. Failures stop at this boundary: they are logged with the message and
/// user, and the displayed message is left as it was. The user gets no feedback,
/// and a failed press has to be repeated.
#[instrument(skip_all)]
pub fn handle_toggle_event(event: ToggleEvent, context: MessageContext, controller: ResponseController, chat: ChatClient) {
    tokio::spawn(async move {
        // Process the event.
        let result = handle_toggle_event_internal(&event, &context, &controller, &chat).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while handling press of `{}` by `{}` on `{}`: {}", event.action_id, event.user_id, event.message_id, err);
        }
    });
}

/// Applies the press, then renders on change.
///
/// Render failures are logged but not returned: the stored state is authoritative
/// and the next successful press renders it again.
#[instrument(skip_all)]
pub async fn handle_toggle_event_internal(event: &ToggleEvent, context: &MessageContext, controller: &ResponseController, chat: &ChatClient) -> ResponseResult<ToggleOutcome> {
    controller.toggle_and_render(event, context, chat).await
}

// Tests.
