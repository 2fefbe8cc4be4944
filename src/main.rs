mod config;
mod pipeline;
mod pr;
mod report;
mod review;

use clap::Parser;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use config::{ConfigPolicy, Settings};
use pr::GhCli;
use review::OpenAiReviewer;

/// pr_review_cli — fetches a GitHub Pull Request diff with `gh` and asks an
/// LLM for a Markdown review ending in an `Approved: true/false` verdict.
#[derive(Parser, Debug)]
#[command(name = "pr_review_cli", version, about)]
struct Cli {
    /// GitHub Pull Request URL (e.g., https://github.com/org/repo/pull/42)
    #[arg(long = "pr", value_name = "PR_URL")]
    pr: Option<String>,

    /// Config file to read instead of ~/.config/openai/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Abort when the config file cannot be loaded instead of continuing without it
    #[arg(long)]
    strict_config: bool,

    /// Use `[prompt] custom` from the config file instead of the built-in instruction
    #[arg(long)]
    custom_prompt: bool,

    /// Chat completion model
    #[arg(long, default_value = config::DEFAULT_MODEL)]
    model: String,

    /// Chat completions endpoint
    #[arg(long, default_value = config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// `gh` executable used to fetch the diff
    #[arg(long, value_name = "PATH", default_value = config::DEFAULT_DIFF_PROGRAM)]
    gh: String,

    /// Optional output file path for the markdown review
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Exit with status 1 when the run fails
    #[arg(long)]
    exit_code: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    let settings = Settings {
        endpoint: cli.endpoint.clone(),
        model: cli.model.clone(),
        temperature: config::DEFAULT_TEMPERATURE,
        config_path: cli.config.clone(),
        diff_program: cli.gh.clone(),
    };
    let request = pipeline::Request {
        pr_url: cli.pr.as_deref(),
        config_policy: if cli.strict_config {
            ConfigPolicy::Strict
        } else {
            ConfigPolicy::Lenient
        },
        use_custom_prompt: cli.custom_prompt,
        output_path: cli.output.as_deref(),
    };
    let diffs = GhCli::new(settings.diff_program.clone());
    let mut stdout = std::io::stdout().lock();

    let span = info_span!("pr_review", pr_url = cli.pr.as_deref().unwrap_or_default());
    let result = pipeline::run(
        &request,
        &settings,
        &diffs,
        |settings, instruction| OpenAiReviewer::new(settings, instruction),
        &mut stdout,
    )
    .instrument(span)
    .await;

    match result {
        Ok(outcome) => {
            info!(?outcome, "finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            writeln!(stdout, "{err}")?;
            if cli.exit_code {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Accept the single-dash `-pr` spelling alongside clap's `--pr`.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-pr") => OsString::from("--pr"),
            Some(s) if s.starts_with("-pr=") => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}
