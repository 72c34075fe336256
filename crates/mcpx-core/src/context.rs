//! Conversation context
//!
//! The context is a fixed record of four strings that the prompt template
//! interpolates. It is built once per run and never mutated after the
//! prompt is formatted.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::prompt::PromptError;

/// Placeholder names understood by [`ConversationContext::get`]
pub const CONTEXT_FIELDS: [&str; 4] = [
    "user_name",
    "previous_topic",
    "user_preference",
    "user_input",
];

const DEMO_USER_NAME: &str = "Alice";
const DEMO_PREVIOUS_TOPIC: &str = "artificial intelligence and machine learning";
const DEMO_USER_PREFERENCE: &str = "technical explanations with practical examples";
const DEMO_USER_INPUT: &str = "Can you explain how context is used in language models?";

/// Values interpolated into the chat prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationContext {
    /// Name the assistant should address
    pub user_name: String,
    /// Topic of the previous conversation
    pub previous_topic: String,
    /// How the user likes answers to be written
    pub user_preference: String,
    /// The question for this turn
    #[serde(default = "demo_user_input")]
    pub user_input: String,
}

fn demo_user_input() -> String {
    DEMO_USER_INPUT.to_string()
}

/// Errors raised while reading a context file
#[derive(Debug, thiserror::Error)]
pub enum ContextFileError {
    /// File could not be read
    #[error("failed to read context file {path}: {source}")]
    Io {
        /// Path that was requested
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid context document
    #[error("invalid context file {path}: {source}")]
    Parse {
        /// Path that was requested
        path: String,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },
}

impl ConversationContext {
    /// Create a context from its four values
    pub fn new(
        user_name: impl Into<String>,
        previous_topic: impl Into<String>,
        user_preference: impl Into<String>,
        user_input: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            previous_topic: previous_topic.into(),
            user_preference: user_preference.into(),
            user_input: user_input.into(),
        }
    }

    /// The built-in demonstration context
    pub fn demo() -> Self {
        Self::new(
            DEMO_USER_NAME,
            DEMO_PREVIOUS_TOPIC,
            DEMO_USER_PREFERENCE,
            DEMO_USER_INPUT,
        )
    }

    /// Replace the user input
    pub fn with_user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = input.into();
        self
    }

    /// Look up a field by its placeholder name
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "user_name" => Some(&self.user_name),
            "previous_topic" => Some(&self.previous_topic),
            "user_preference" => Some(&self.user_preference),
            "user_input" => Some(&self.user_input),
            _ => None,
        }
    }

    /// Check that every field carries a value
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::MissingField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), PromptError> {
        for field in CONTEXT_FIELDS {
            let blank = self.get(field).map_or(true, |v| v.trim().is_empty());
            if blank {
                return Err(PromptError::MissingField(field.to_string()));
            }
        }
        Ok(())
    }

    /// Parse a context from TOML
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load a context from a TOML file
    pub fn load(path: &Path) -> Result<Self, ContextFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ContextFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ctx = Self::from_toml_str(&content).map_err(|source| ContextFileError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), user = %ctx.user_name, "Loaded context file");
        Ok(ctx)
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::demo()
    }
}
