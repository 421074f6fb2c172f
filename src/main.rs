use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use env_logger::Builder;
use log::{debug, LevelFilter};
use std::process::ExitCode;
use std::sync::Arc;

use gitlab_push::push::PushOutcome;
use gitlab_push::server::{self, LiveRunner};
use gitlab_push::{error_handling, ui, workflow, Config};

#[derive(Parser)]
#[command(name = "gitlab-push")]
#[command(about = "Ensure a GitLab project exists for a local repository and push to it over SSH")]
#[command(version)]
#[command(
    long_about = "Ensure a GitLab project exists for a local repository and push to it over SSH.\n\n\
    Settings come from GITLAB_ADDRESS, GITLAB_GROUP, GITLAB_USER_NAME, GITLAB_EMAIL, \
    GITLAB_TOKEN and BASE_REPO_DIR, plus the optional GITLAB_SSH_PORT and SSH_KEY_PATH. \
    With --listen, the same settings are taken from the JSON body of each POST /push."
)]
struct Cli {
    /// Repository to publish, looked up as BASE_REPO_DIR/<name>.git
    #[arg(required_unless_present = "listen", conflicts_with = "listen")]
    repo_name: Option<String>,

    /// Serve POST /push on this port instead of running once
    #[arg(long, value_name = "PORT")]
    listen: Option<u16>,

    /// Verbose output (repeat for more verbosity)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = initialize_logging(&cli).and_then(|()| match (cli.listen, cli.repo_name.as_deref()) {
        (Some(port), _) => listen(port),
        (None, Some(repo_name)) => publish(repo_name),
        (None, None) => Err(anyhow::anyhow!("Usage: gitlab-push <repo_name>")),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error_handling::report(&e);
            ExitCode::FAILURE
        }
    }
}

fn publish(repo_name: &str) -> Result<()> {
    let config = Config::from_env(repo_name);
    debug!("{config:#?}");

    let report = workflow::run(config)?;

    match report.outcome {
        PushOutcome::UpToDate => ui::print_info("No changes to push"),
        PushOutcome::Pushed { .. } => ui::print_success("Push successful"),
    }

    Ok(())
}

fn listen(port: u16) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Unable to start the async runtime")?;

    runtime.block_on(server::serve(port, Arc::new(LiveRunner)))
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let mut builder = Builder::new();

    let level = match cli.verbose {
        0 if cli.listen.is_some() => LevelFilter::Info,
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    builder.filter(Some("gitlab_push"), level);

    if let Ok(filter) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }

    builder.try_init()?;

    Ok(())
}
