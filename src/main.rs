// ABOUTME: Entry point for the switchyard CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use switchyard::error::Result;
use switchyard::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    if let Err(e) = run(cli.command, &mut output).await {
        output.error(&e.to_string());
        if e.needs_manual_intervention() {
            eprintln!("Production traffic may be split between slots; inspect the listeners before retrying.");
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: &mut Output) -> Result<()> {
    match command {
        Commands::Init { application, force } => {
            commands::init(application.as_deref(), force, output)
        }
        Commands::Provision => commands::provision(output).await,
        Commands::Register => commands::register(output).await,
        Commands::Deregister => commands::deregister(output),
        Commands::Hook {
            hook,
            deployment_id,
            request,
        } => commands::hook(hook, deployment_id, request.as_deref(), output).await,
        Commands::Deploy { deployment_id } => commands::deploy(deployment_id, output).await,
        Commands::Rollback => commands::rollback(output).await,
        Commands::Alarm { name, state } => commands::alarm(&name, state, output),
        Commands::Status => commands::status(output).await,
    }
}
