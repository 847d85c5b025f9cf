//! Posting new prompts and creating their response records.

use tracing::{Instrument, error, info, instrument};

use crate::{
    base::{
        prompt::{PromptRegistry, PromptTemplate},
        types::Res,
    },
    service::{
        chat::{ChatClient, MessageContext},
        db::ResponseStore,
    },
};

/// Resolves a slash command into the prompt to post and its subject.
///
/// On `Err`, the string is the text to send back to the user instead.
pub fn resolve_prompt_command<'a>(prompts: &'a PromptRegistry, command: &str, text: Option<&str>) -> Result<(&'a PromptTemplate, String), String> {
    let Some(template) = prompts.by_command(command) else {
        return Err(format!("The `{command}` command is not supported."));
    };

    let subject = text.map(str::trim).unwrap_or_default();
    if subject.is_empty() {
        return Err(template.usage().to_string());
    }

    Ok((template, subject.to_string()))
}

/// Handles a prompt command.
///
/// Spawns a task that posts the prompt message to `channel_id` and creates its empty
/// response record. Failures are logged.
#[instrument(skip_all)]
pub fn handle_prompt_command(template: PromptTemplate, subject: String, channel_id: String, store: ResponseStore, chat: ChatClient) {
    tokio::spawn(async move {
        // Process the command.
        let result = handle_prompt_command_internal(&template, &subject, &channel_id, &store, &chat).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while posting prompt `{}` to `{}`: {}", template.name(), channel_id, err);
        }
    });
}

/// Posts the prompt, then creates its record.
///
/// The record can only be keyed once the platform has assigned the message an
/// identifier. If creating it fails, presses on the posted message report a
/// missing record.
#[instrument(skip_all, fields(prompt = %template.name(), channel_id = %channel_id))]
pub async fn handle_prompt_command_internal(template: &PromptTemplate, subject: &str, channel_id: &str, store: &ResponseStore, chat: &ChatClient) -> Res<MessageContext> {
    let context = chat.post_prompt(channel_id, &template.message(subject)).await?;

    store.create_record(&context.message_id, &template.initial_set()).await?;

    info!("Posted prompt `{}` as `{}`.", template.name(), context.message_id);

    Ok(context)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::prompt::PromptConfig;

    fn registry() -> PromptRegistry {
        PromptRegistry::from_configs(&[PromptConfig::quiz(), PromptConfig::event()]).unwrap()
    }

    #[test]
    fn test_resolve_known_command() {
        let prompts = registry();

        let (template, subject) = resolve_prompt_command(&prompts, "/prompt-quiz", Some("  AAPL ")).unwrap();

        assert_eq!(template.name(), "quiz");
        assert_eq!(subject, "AAPL");
    }

    #[test]
    fn test_resolve_missing_subject_is_usage() {
        let prompts = registry();

        assert_eq!(resolve_prompt_command(&prompts, "/prompt-quiz", None).unwrap_err(), "Please place a ticker as the first argument");
        assert_eq!(resolve_prompt_command(&prompts, "/prompt-quiz", Some("   ")).unwrap_err(), "Please place a ticker as the first argument");
    }

    #[test]
    fn test_resolve_unknown_command() {
        let prompts = registry();

        let reply = resolve_prompt_command(&prompts, "/prompt-poll", Some("lunch")).unwrap_err();

        assert!(reply.contains("/prompt-poll"));
    }
}
