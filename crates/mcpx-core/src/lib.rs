//! mcpx Core - context, prompt formatting, configuration and runner
//!
//! This crate holds everything the demo needs except the HTTP transport.
//!
//! # Modules
//!
//! - [`context`] - The conversation context interpolated into the prompt
//! - [`prompt`] - Role-tagged prompt templates and the formatter
//! - [`config`] - Environment and `.env` backed settings
//! - [`completion`] - Chat message types and the completion client capability
//! - [`runner`] - The linear load → format → submit → print sequence

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod completion;
pub mod config;
pub mod context;
pub mod prompt;
pub mod runner;

pub use completion::*;
pub use config::*;
pub use context::*;
pub use prompt::*;
pub use runner::*;

use thiserror::Error;

/// Core error type for mcpx
///
/// Every failure the runner can report is one of these, so the top-level
/// handler only has to deal with a single type.
#[derive(Error, Debug)]
pub enum McpxError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Prompt could not be formatted
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Completion endpoint call failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result type alias using [`McpxError`]
pub type Result<T> = std::result::Result<T, McpxError>;
