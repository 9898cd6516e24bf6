// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use switchyard::alarms::AlarmState;
use switchyard::hooks::HookName;

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Blue/green cutover orchestration for load-balanced container services")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new switchyard.yml configuration file
    Init {
        /// Application name
        #[arg(short, long)]
        application: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Create the local load balancer, target groups and alarms from the config
    Provision,

    /// Register or update the deployment group
    Register,

    /// Remove the deployment group
    Deregister,

    /// Run one lifecycle hook and print its status
    Hook {
        /// Hook to run
        #[arg(value_parser = parse_hook)]
        hook: HookName,

        /// Deployment the hook belongs to
        #[arg(short, long)]
        deployment_id: Option<String>,

        /// JSON hook request; built from the config when omitted
        #[arg(short, long)]
        request: Option<PathBuf>,
    },

    /// Deploy to the standby slot and shift production traffic to it
    Deploy {
        /// Deployment identifier; generated when omitted
        #[arg(short, long)]
        deployment_id: Option<String>,
    },

    /// Point production back at the standby slot
    Rollback,

    /// Set the state of a local alarm
    Alarm {
        /// Alarm name
        name: String,

        /// New state (ok, alarm or insufficient-data)
        #[arg(value_parser = parse_alarm_state)]
        state: AlarmState,
    },

    /// Show the deployment group, slot roles and alarm states
    Status,
}

fn parse_hook(s: &str) -> Result<HookName, String> {
    s.parse()
}

fn parse_alarm_state(s: &str) -> Result<AlarmState, String> {
    s.parse()
}
