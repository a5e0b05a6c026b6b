//! buildrules - inspect and change build id rules of task queues.
//!
//! Commands:
//! - `get-build-id-rules`    - print assignment and redirect rules
//! - `update-build-id-rules` - apply one rule change, confirming first unless `--yes`

use std::path::PathBuf;
use std::process::ExitCode;

use buildrules_core::app::RulesClient;
use buildrules_core::config::{ClientConfig, ConfigError};
use buildrules_core::domain::{ErrorKind, OutputMode, RulesError};
use buildrules_core::impls::FileRuleStore;
use clap::{Parser, Subcommand};

mod commands;
mod prompt;
mod render;

use commands::update::UpdateCommand;

const EXIT_CONFIG: u8 = 8;

#[derive(Parser)]
#[command(
    name = "buildrules",
    about = "Manage build id assignment and redirect rules of task queues",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table or json
    #[arg(short, long, global = true)]
    output: Option<OutputMode>,

    /// Rules state file (overrides the config file)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true, env = "BUILDRULES_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the assignment and redirect rules of a task queue
    GetBuildIdRules {
        #[arg(short = 't', long)]
        task_queue: String,
    },

    /// Change the rules of a task queue
    UpdateBuildIdRules {
        #[command(subcommand)]
        command: UpdateCommand,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stderr keeps JSON on stdout parseable
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    tracing::debug!(state_file = %config.state_file.display(), output = %config.output, "config loaded");

    let client = RulesClient::new(FileRuleStore::new(
        config.state_file.clone(),
        config.limits,
        config.lock,
    ));
    let result = match &cli.command {
        Commands::GetBuildIdRules { task_queue } => {
            commands::get::run(&client, task_queue, config.output).await
        }
        Commands::UpdateBuildIdRules { command } => {
            commands::update::run(&client, command, config.output).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(exit_code(e.kind()))
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(state_file) = &cli.state_file {
        config.state_file = state_file.clone();
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    Ok(config)
}

fn report(e: &RulesError) {
    eprintln!("Error: {e}");
    if let Some(hint) = e.hint() {
        eprintln!("hint: {hint}");
    }
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => 3,
        ErrorKind::Concurrency => 4,
        ErrorKind::Policy => 5,
        ErrorKind::Ux => 6,
        ErrorKind::Transport => 7,
    }
}
