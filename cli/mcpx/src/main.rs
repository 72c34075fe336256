//! mcpx CLI

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::builder::FalseyValueParser;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mcpx_core::{
    load_env_file, ApiError, ChatMessage, CompletionClient, CompletionParams, ConversationContext,
    FailureKind, ProcessEnv, RunOutcome, Runner, SettingsOverrides,
};
use mcpx_openai::OpenAIClient;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mcpx")]
#[command(about = "Context-aware chat completion demo")]
#[command(version)]
struct Cli {
    /// Env file to load instead of searching for .env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// TOML file with user_name, previous_topic, user_preference and optional user_input
    #[arg(short, long, value_name = "PATH")]
    context: Option<PathBuf>,

    /// Question to ask instead of the built-in one
    #[arg(short, long)]
    input: Option<String>,

    /// Model to use (overrides OPENAI_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature (overrides OPENAI_TEMPERATURE)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Exit with status 1 when the run fails
    #[arg(long, env = "MCPX_STRICT", value_parser = FalseyValueParser::new())]
    strict: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }
}

/// Shows a spinner on stderr while the wrapped client is waiting
struct SpinnerClient<C> {
    inner: C,
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for SpinnerClient<C> {
    async fn submit(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<String, ApiError> {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")
        {
            pb.set_style(spinner_style);
        }
        pb.set_message(format!("Waiting for {}...", params.model));
        pb.enable_steady_tick(Duration::from_millis(100));

        let result = self.inner.submit(messages, params).await;

        pb.finish_and_clear();
        result
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = std::io::stdout();
    let outcome = run(&cli, stdout.lock()).await;

    ExitCode::from(outcome.exit_code(cli.strict))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run<W: Write>(cli: &Cli, out: W) -> RunOutcome {
    let mut runner = Runner::new(out).with_overrides(cli.overrides());

    let context = match prepare(cli) {
        Ok(ctx) => ctx,
        Err(e) => return runner.fail(FailureKind::Config, format!("{:#}", e)),
    };

    debug!(user = %context.user_name, strict = cli.strict, "Starting run");
    let mut runner = runner.with_context(context);
    runner
        .run(&ProcessEnv, |settings| {
            OpenAIClient::from_settings(settings).map(|inner| SpinnerClient { inner })
        })
        .await
}

/// Load the env file and the context before the run starts
fn prepare(cli: &Cli) -> anyhow::Result<ConversationContext> {
    load_env_file(cli.env_file.as_deref())?;

    let mut context = match &cli.context {
        Some(path) => ConversationContext::load(path)
            .with_context(|| format!("Could not use context file {}", path.display()))?,
        None => ConversationContext::demo(),
    };

    if let Some(input) = &cli.input {
        context = context.with_user_input(input.clone());
    }

    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    #[serial]
    fn test_parse_overrides() {
        let cli = Cli::try_parse_from([
            "mcpx",
            "--model",
            "gpt-4o-mini",
            "--temperature",
            "0.3",
            "--input",
            "What is attention?",
            "--strict",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(overrides.temperature, Some(0.3));
        assert_eq!(cli.input.as_deref(), Some("What is attention?"));
        assert!(cli.strict);
    }

    #[test]
    #[serial]
    fn test_strict_from_environment() {
        let cases = [
            ("1", true),
            ("yes", true),
            ("true", true),
            ("0", false),
            ("off", false),
        ];
        for (value, expected) in cases {
            std::env::set_var("MCPX_STRICT", value);
            let cli = Cli::try_parse_from(["mcpx"]).unwrap();
            assert_eq!(cli.strict, expected, "MCPX_STRICT={}", value);
        }
        std::env::remove_var("MCPX_STRICT");

        let cli = Cli::try_parse_from(["mcpx"]).unwrap();
        assert!(!cli.strict);
    }

    #[test]
    fn test_prepare_applies_input() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join("test.env");
        std::fs::write(&env_file, "MCPX_CLI_TEST_MARKER=1\n").unwrap();

        let cli = Cli::try_parse_from([
            "mcpx",
            "--env-file",
            env_file.to_str().unwrap(),
            "--input",
            "Why?",
        ])
        .unwrap();

        let ctx = prepare(&cli).unwrap();
        assert_eq!(ctx.user_input, "Why?");
        assert_eq!(ctx.user_name, "Alice");
    }

    #[test]
    fn test_prepare_reports_missing_context_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join("test.env");
        std::fs::write(&env_file, "").unwrap();
        let missing = dir.path().join("ctx.toml");

        let cli = Cli::try_parse_from([
            "mcpx",
            "--env-file",
            env_file.to_str().unwrap(),
            "--context",
            missing.to_str().unwrap(),
        ])
        .unwrap();

        let err = prepare(&cli).unwrap_err();
        assert!(format!("{:#}", err).contains("ctx.toml"));
    }

    #[tokio::test]
    async fn test_bad_env_file_fails_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "mcpx",
            "--env-file",
            dir.path().join("absent.env").to_str().unwrap(),
        ])
        .unwrap();

        let mut out = Vec::new();
        let outcome = run(&cli, &mut out).await;

        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                kind: FailureKind::Config,
                ..
            }
        ));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("absent.env"));
        assert!(printed.contains("Make sure you have:"));
    }
}
