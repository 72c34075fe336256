//! Runner
//!
//! Sequences one demo run and reports progress to an output sink:
//!
//! ```text
//! load settings → format prompt → print context → connect → submit → print response
//! ```
//!
//! Any failure along the way is caught here, printed with remediation hints,
//! and returned as [`RunOutcome::Failed`]. Nothing is retried.

use std::fmt;
use std::io::Write;

use console::style;
use tracing::{debug, error, info, instrument};

use crate::completion::{ApiError, CompletionClient};
use crate::config::{EnvSource, Settings, SettingsOverrides};
use crate::context::ConversationContext;
use crate::prompt::ChatTemplate;
use crate::McpxError;

/// Hints printed after every failure
pub const REMEDIATION_HINTS: [&str; 2] = [
    "Created a .env file with your OPENAI_API_KEY",
    "Network access to the completion endpoint and an API key with available quota",
];

/// Which stage of the run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Settings could not be loaded
    Config,
    /// Prompt could not be formatted
    Prompt,
    /// Completion call failed
    Api,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Config => write!(f, "configuration"),
            FailureKind::Prompt => write!(f, "prompt"),
            FailureKind::Api => write!(f, "api"),
        }
    }
}

impl From<&McpxError> for FailureKind {
    fn from(err: &McpxError) -> Self {
        match err {
            McpxError::Config(_) => FailureKind::Config,
            McpxError::Prompt(_) => FailureKind::Prompt,
            McpxError::Api(_) => FailureKind::Api,
        }
    }
}

/// Result of a run; failures are data, not errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The endpoint answered
    Completed {
        /// Generated text
        response: String,
    },
    /// A stage failed and was reported
    Failed {
        /// Stage that failed
        kind: FailureKind,
        /// Message that was printed
        message: String,
    },
}

impl RunOutcome {
    /// Whether the run produced a response
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    /// The generated text, if any
    pub fn response(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { response } => Some(response),
            RunOutcome::Failed { .. } => None,
        }
    }

    /// Process exit status for this outcome
    ///
    /// Handled failures exit 0 unless `strict` is set.
    pub fn exit_code(&self, strict: bool) -> u8 {
        match self {
            RunOutcome::Completed { .. } => 0,
            RunOutcome::Failed { .. } if strict => 1,
            RunOutcome::Failed { .. } => 0,
        }
    }
}

/// Drives one run against an output sink
#[derive(Debug)]
pub struct Runner<W: Write> {
    out: W,
    context: ConversationContext,
    template: ChatTemplate,
    overrides: SettingsOverrides,
}

impl<W: Write> Runner<W> {
    /// Runner with the demo context and default template
    pub fn new(out: W) -> Self {
        Self {
            out,
            context: ConversationContext::demo(),
            template: ChatTemplate::default(),
            overrides: SettingsOverrides::default(),
        }
    }

    /// Use a different context
    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = context;
        self
    }

    /// Use a different template
    pub fn with_template(mut self, template: ChatTemplate) -> Self {
        self.template = template;
        self
    }

    /// Apply command-line overrides on top of the environment
    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Give back the output sink
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Execute the run
    ///
    /// `connect` builds the completion client from the loaded settings. It is
    /// not called when settings or the prompt fail.
    #[instrument(skip_all)]
    pub async fn run<C, F>(&mut self, env: &dyn EnvSource, connect: F) -> RunOutcome
    where
        C: CompletionClient,
        F: FnOnce(&Settings) -> Result<C, ApiError>,
    {
        match self.execute(env, connect).await {
            Ok(response) => {
                info!(response_len = response.len(), "Run completed");
                RunOutcome::Completed { response }
            }
            Err(err) => self.fail(FailureKind::from(&err), err),
        }
    }

    /// Report a failure that happened outside [`Runner::run`]
    ///
    /// Prints the same diagnostic and hints as a failed run.
    pub fn fail(&mut self, kind: FailureKind, err: impl fmt::Display) -> RunOutcome {
        let message = err.to_string();
        error!(%kind, "Run failed: {}", message);
        self.report_failure(&message);
        RunOutcome::Failed { kind, message }
    }

    async fn execute<C, F>(
        &mut self,
        env: &dyn EnvSource,
        connect: F,
    ) -> Result<String, McpxError>
    where
        C: CompletionClient,
        F: FnOnce(&Settings) -> Result<C, ApiError>,
    {
        let settings = Settings::from_env(env)?.apply(&self.overrides)?;

        let banner = format!("Initializing context-aware chat with {}...", settings.model);
        say(&mut self.out, format_args!("{}\n", style(banner).bold()));

        self.context.validate()?;
        let prompt = self.template.format(&self.context)?;

        let ctx = &self.context;
        let out = &mut self.out;
        say(out, format_args!("{}", style("Context Information:").bold()));
        say(out, format_args!("  - User: {}", ctx.user_name));
        say(out, format_args!("  - Previous Topic: {}", ctx.previous_topic));
        say(out, format_args!("  - Preference: {}", ctx.user_preference));
        say(out, format_args!("\nUser Input: {}\n", ctx.user_input));

        let client = connect(&settings)?;
        let params = settings.params();
        debug!(model = %params.model, temperature = params.temperature, "Submitting prompt");

        let response = client.submit(&prompt.messages(), &params).await?;

        let out = &mut self.out;
        say(out, format_args!("{}", style("AI Response:").bold().green()));
        say(out, format_args!("{}\n", response));
        say(
            out,
            format_args!("{}", style("Context-aware chat completed successfully!").green()),
        );

        Ok(response)
    }

    fn report_failure(&mut self, message: &str) {
        let out = &mut self.out;
        say(out, format_args!("{}", style(format!("Error: {}", message)).red()));
        say(out, format_args!("\nMake sure you have:"));
        for (i, hint) in REMEDIATION_HINTS.iter().enumerate() {
            say(out, format_args!("{}. {}", i + 1, hint));
        }
    }
}

fn say<W: Write>(out: &mut W, line: fmt::Arguments<'_>) {
    if let Err(e) = writeln!(out, "{}", line) {
        debug!("Failed to write output: {}", e);
    }
}
