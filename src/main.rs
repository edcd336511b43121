mod comment;
mod config;
mod diff;
mod gate;
mod generate;
mod github;
mod pipeline;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use generate::{CompletionGenerator, Strategy, ThreadGenerator};
use pipeline::RunOutcome;

/// PR Reviewer — generates an AI review for a GitHub Pull Request and
/// keeps exactly one review comment on the PR, replacing any prior one.
#[derive(Parser, Debug)]
#[command(name = "pr-reviewer", version, about)]
struct Cli {
    /// GitHub Pull Request URL (e.g., https://github.com/org/repo/pull/42)
    pr_url: String,

    /// Optional file path to also save the generated review text to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file path (defaults to .pr-reviewer.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("parsing PR URL");
    let pr = github::parse_pr_url(&cli.pr_url)?;
    debug!(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number, "parsed PR URL");

    info!("loading configuration");
    let config = match cli.config.as_deref() {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    let github_token = config
        .github_token()
        .ok_or("GitHub token not found: set [github] token or the GITHUB_TOKEN env var")?;
    let backend_key = config
        .backend_key()
        .ok_or("Backend API key not found: set [backend] api_key or the OPENAI_API_KEY env var")?;

    let host = github::GithubClient::new(&config.github.api_url, github_token);

    let outcome = match config.backend.strategy {
        Strategy::Completion => {
            info!(model = %config.backend.model, "using synchronous completion strategy");
            let generator = CompletionGenerator::new(
                &config.backend.api_url,
                backend_key,
                &config.backend.model,
            );
            pipeline::run(&host, &generator, &pr, &config.review).await?
        }
        Strategy::Thread => {
            let assistant_id = config.backend.assistant_id.as_deref().ok_or(
                "[backend] assistant_id is required when strategy = \"thread\"",
            )?;
            info!(assistant = %assistant_id, "using job-thread strategy");
            let generator = ThreadGenerator::new(
                &config.backend.api_url,
                backend_key,
                assistant_id,
                Duration::from_secs(config.backend.poll_interval_secs),
                config.backend.max_poll_attempts,
            );
            pipeline::run(&host, &generator, &pr, &config.review).await?
        }
    };

    match outcome {
        RunOutcome::NothingToReview => {
            println!("{}", "No applicable diffs found to review.".yellow());
        }
        RunOutcome::SkippedBelowThreshold {
            size_metric,
            threshold,
            notice_posted,
        } => {
            println!(
                "{}",
                format!(
                    "Change size ({}) below threshold ({}); AI review skipped{}.",
                    size_metric,
                    threshold,
                    if notice_posted { ", notice posted" } else { "" }
                )
                .yellow()
            );
        }
        RunOutcome::Posted { review } => {
            if let Some(path) = cli.output.as_deref() {
                std::fs::write(path, &review)?;
                info!(path = %path.display(), "saved review text");
            }
            println!("{}", "Review comment posted.".green());
            println!();
            println!("{}", review);
        }
    }

    Ok(())
}
