//! Prompt formatting
//!
//! Turns a [`ConversationContext`] into a role-tagged system/user message
//! pair:
//!
//! ```text
//! context → validate fields → substitute {placeholders} → system + user messages
//! ```
//!
//! Substitution is a single pass, so a value that happens to contain
//! `{user_name}` is emitted literally rather than expanded again.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::{debug, instrument};

use crate::completion::{ChatMessage, Role};
use crate::context::ConversationContext;

/// System instruction used when no custom template is supplied
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are a helpful AI assistant. \
The user's name is {user_name}. \
They previously discussed {previous_topic}. \
They prefer {user_preference}.";

/// User message used when no custom template is supplied
pub const DEFAULT_USER_TEMPLATE: &str = "{user_input}";

/// Errors that can occur while formatting a prompt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    /// A field referenced by the template has no value
    #[error("Missing required prompt field: {0}")]
    MissingField(String),

    /// The template references a field the context does not define
    #[error("Unknown template placeholder: {{{0}}}")]
    UnknownPlaceholder(String),
}

#[allow(clippy::expect_used)]
fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// A two-message chat template with `{placeholder}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTemplate {
    /// Template for the system instruction
    pub system: String,
    /// Template for the user message
    pub user: String,
}

/// Rendered system and user segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPrompt {
    /// Rendered system instruction
    pub system: String,
    /// Rendered user message
    pub user: String,
}

impl FormattedPrompt {
    /// Messages in the order they are sent: system first, then user
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(Role::System, self.system.clone()),
            ChatMessage::new(Role::User, self.user.clone()),
        ]
    }
}

impl Default for ChatTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_TEMPLATE, DEFAULT_USER_TEMPLATE)
    }
}

impl ChatTemplate {
    /// Create a template from its system and user parts
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Placeholder names referenced by the template, in order of appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for text in [&self.system, &self.user] {
            for cap in placeholder_regex().captures_iter(text) {
                let name = cap[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Render both messages from a context
    ///
    /// This is a pure function of the template and the context.
    ///
    /// # Errors
    ///
    /// - [`PromptError::UnknownPlaceholder`] if the template names a field the
    ///   context does not have
    /// - [`PromptError::MissingField`] if a referenced field is blank
    #[instrument(skip_all)]
    pub fn format(&self, ctx: &ConversationContext) -> Result<FormattedPrompt, PromptError> {
        for name in self.placeholders() {
            match ctx.get(&name) {
                None => return Err(PromptError::UnknownPlaceholder(name)),
                Some(value) if value.trim().is_empty() => {
                    return Err(PromptError::MissingField(name))
                }
                Some(_) => {}
            }
        }

        let prompt = FormattedPrompt {
            system: substitute(&self.system, ctx),
            user: substitute(&self.user, ctx),
        };

        debug!(
            system_len = prompt.system.len(),
            user_len = prompt.user.len(),
            "Formatted prompt"
        );

        Ok(prompt)
    }
}

/// Replace every known placeholder in one pass; callers validate first
fn substitute(template: &str, ctx: &ConversationContext) -> String {
    placeholder_regex()
        .replace_all(template, |cap: &Captures<'_>| {
            ctx.get(&cap[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}
