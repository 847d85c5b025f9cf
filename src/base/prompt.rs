//! Prompt types: validated group sets, their buttons, and the message that hosts them.

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;

use crate::base::{
    membership::{MEMBER_DELIMITER, MembershipSet, ResponseSet},
    types::{ResponseError, ResponseResult},
};

/// Placeholder in a prompt description that is replaced by the command argument.
pub const SUBJECT_PLACEHOLDER: &str = "{subject}";

fn default_responses_title() -> String {
    "Responses".to_string()
}

fn default_usage() -> String {
    "Please provide a subject as the first argument.".to_string()
}

/// Configuration of one prompt type.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PromptConfig {
    /// Name stored with every record created by this prompt (e.g. `quiz`).
    pub name: String,
    /// Slash command that posts this prompt (e.g. `/prompt-quiz`).
    pub command: String,
    /// Title of the posted message.
    pub title: String,
    /// Description of the posted message; `{subject}` is replaced by the command argument.
    pub description: String,
    /// Heading above the rendered groups.
    #[serde(default = "default_responses_title")]
    pub responses_title: String,
    /// Text sent back when the command is used without a subject.
    #[serde(default = "default_usage")]
    pub usage: String,
    /// Mutually exclusive groups, in display order.
    pub groups: Vec<String>,
    /// Whether pressing the button of your current group leaves it.
    #[serde(default)]
    pub allow_leave: bool,
}

impl PromptConfig {
    /// The stock direction quiz: `UP` or `DOWN`.
    pub fn quiz() -> Self {
        Self {
            name: "quiz".to_string(),
            command: "/prompt-quiz".to_string(),
            title: "Stock Quiz".to_string(),
            description: "Guess the stock direction of {subject}".to_string(),
            responses_title: "Responses".to_string(),
            usage: "Please place a ticker as the first argument".to_string(),
            groups: vec!["UP".to_string(), "DOWN".to_string()],
            allow_leave: false,
        }
    }

    /// An event RSVP: `Going` or `Flaking`.
    pub fn event() -> Self {
        Self {
            name: "event".to_string(),
            command: "/prompt-event".to_string(),
            title: "Event".to_string(),
            description: "{subject}".to_string(),
            responses_title: "Attendees".to_string(),
            usage: "Please describe the event as the first argument".to_string(),
            groups: vec!["Going".to_string(), "Flaking".to_string()],
            allow_leave: false,
        }
    }
}

/// A selectable button of a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAction {
    /// Identifier the platform sends back when the button is pressed.
    pub action_id: String,
    /// Button label, which is the group name.
    pub label: String,
}

/// Everything the chat client needs to post a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub title: String,
    pub description: String,
    pub responses_title: String,
    pub groups: Vec<String>,
    pub actions: Vec<PromptAction>,
}

/// A validated prompt type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    config: PromptConfig,
    actions: Vec<PromptAction>,
}

impl PromptTemplate {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn command(&self) -> &str {
        &self.config.command
    }

    pub fn usage(&self) -> &str {
        &self.config.usage
    }

    pub fn allow_leave(&self) -> bool {
        self.config.allow_leave
    }

    pub fn actions(&self) -> &[PromptAction] {
        &self.actions
    }

    /// The empty response set a new record starts from.
    pub fn initial_set(&self) -> ResponseSet {
        let groups = self.config.groups.iter().map(MembershipSet::new).collect();
        ResponseSet::new(self.config.name.clone(), groups)
    }

    /// The message to post for `subject`.
    pub fn message(&self, subject: &str) -> PromptMessage {
        PromptMessage {
            title: self.config.title.clone(),
            description: self.config.description.replace(SUBJECT_PLACEHOLDER, subject),
            responses_title: self.config.responses_title.clone(),
            groups: self.config.groups.clone(),
            actions: self.actions.clone(),
        }
    }
}

/// Builds validated prompt templates from configuration.
pub struct PromptFactory;

impl PromptFactory {
    /// Validate `config` and derive its buttons.
    ///
    /// A prompt needs at least two groups, each with a non-blank name that does not
    /// contain the member delimiter. Names must be unique ignoring case, since the
    /// lowercased name is the button's action identifier.
    pub fn build(config: &PromptConfig) -> ResponseResult<PromptTemplate> {
        let invalid = |reason: String| ResponseError::InvalidConfiguration(format!("prompt `{}`: {}", config.name, reason));

        if config.name.trim().is_empty() {
            return Err(invalid("the prompt name is blank".to_string()));
        }

        if config.groups.len() < 2 {
            return Err(invalid(format!("at least 2 groups are required, found {}", config.groups.len())));
        }

        let mut actions: Vec<PromptAction> = Vec::with_capacity(config.groups.len());

        for group in &config.groups {
            if group.trim().is_empty() {
                return Err(invalid("group names must not be blank".to_string()));
            }

            if group.contains(MEMBER_DELIMITER) {
                return Err(invalid(format!("group `{}` contains a reserved character", group.escape_debug())));
            }

            let action_id = group.to_lowercase();
            if actions.iter().any(|a| a.action_id == action_id) {
                return Err(invalid(format!("group `{group}` is not unique")));
            }

            actions.push(PromptAction { action_id, label: group.clone() });
        }

        Ok(PromptTemplate { config: config.clone(), actions })
    }
}

/// All configured prompt types.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Debug, Clone, Default)]
pub struct PromptRegistry {
    inner: Arc<HashMap<String, PromptTemplate>>,
}

impl PromptRegistry {
    /// Build every prompt, rejecting invalid ones and duplicate names or commands.
    pub fn from_configs(configs: &[PromptConfig]) -> ResponseResult<Self> {
        let mut prompts = HashMap::with_capacity(configs.len());

        for config in configs {
            let template = PromptFactory::build(config)?;

            if prompts.contains_key(template.name()) {
                return Err(ResponseError::InvalidConfiguration(format!("prompt `{}` is defined twice", template.name())));
            }

            if prompts.values().any(|p: &PromptTemplate| p.command() == template.command()) {
                return Err(ResponseError::InvalidConfiguration(format!("command `{}` is used by more than one prompt", template.command())));
            }

            prompts.insert(template.name().to_string(), template);
        }

        Ok(Self { inner: Arc::new(prompts) })
    }

    pub fn by_name(&self, name: &str) -> Option<&PromptTemplate> {
        self.inner.get(name)
    }

    pub fn by_command(&self, command: &str) -> Option<&PromptTemplate> {
        self.inner.values().find(|p| p.command() == command)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_groups(groups: &[&str]) -> PromptConfig {
        PromptConfig {
            groups: groups.iter().map(|g| g.to_string()).collect(),
            ..PromptConfig::quiz()
        }
    }

    #[test]
    fn test_build_quiz() {
        let template = PromptFactory::build(&PromptConfig::quiz()).unwrap();

        let action_ids: Vec<_> = template.actions().iter().map(|a| a.action_id.as_str()).collect();
        assert_eq!(action_ids, vec!["up", "down"]);
        assert_eq!(template.actions()[0].label, "UP");

        let initial = template.initial_set();
        assert_eq!(initial.prompt(), "quiz");
        assert_eq!(initial.groups().len(), 2);
        assert!(initial.groups().iter().all(MembershipSet::is_empty));
    }

    #[test]
    fn test_build_rejects_single_group() {
        let err = PromptFactory::build(&config_with_groups(&["GOING"])).unwrap_err();

        assert!(matches!(err, ResponseError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_build_rejects_duplicate_groups() {
        assert!(matches!(PromptFactory::build(&config_with_groups(&["UP", "UP"])), Err(ResponseError::InvalidConfiguration(_))));
        assert!(matches!(PromptFactory::build(&config_with_groups(&["Up", "UP"])), Err(ResponseError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_build_rejects_blank_or_reserved_names() {
        assert!(PromptFactory::build(&config_with_groups(&["UP", " "])).is_err());
        assert!(PromptFactory::build(&config_with_groups(&["UP", "DO\u{1f}WN"])).is_err());
    }

    #[test]
    fn test_three_groups_are_allowed() {
        let template = PromptFactory::build(&config_with_groups(&["Yes", "No", "Maybe"])).unwrap();

        assert_eq!(template.actions().len(), 3);
    }

    #[test]
    fn test_message_substitutes_subject() {
        let template = PromptFactory::build(&PromptConfig::quiz()).unwrap();

        let message = template.message("AAPL");

        assert_eq!(message.title, "Stock Quiz");
        assert_eq!(message.description, "Guess the stock direction of AAPL");
        assert_eq!(message.groups, vec!["UP", "DOWN"]);
        assert_eq!(message.actions.len(), 2);
    }

    #[test]
    fn test_registry_lookups() {
        let registry = PromptRegistry::from_configs(&[PromptConfig::quiz(), PromptConfig::event()]).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.by_command("/prompt-event").map(PromptTemplate::name), Some("event"));
        assert!(registry.by_name("quiz").is_some());
        assert!(registry.by_command("/prompt-poll").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let same_name = PromptRegistry::from_configs(&[PromptConfig::quiz(), PromptConfig::quiz()]);
        assert!(matches!(same_name, Err(ResponseError::InvalidConfiguration(_))));

        let same_command = PromptRegistry::from_configs(&[
            PromptConfig::quiz(),
            PromptConfig {
                name: "quiz2".to_string(),
                ..PromptConfig::quiz()
            },
        ]);
        assert!(matches!(same_command, Err(ResponseError::InvalidConfiguration(_))));
    }
}
