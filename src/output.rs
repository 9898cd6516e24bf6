// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::{CutoverReporter, Stage, StepReport};
use crate::diagnostics::{Diagnostics, Warning};
use crate::types::DeploymentId;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print the outcome of one lifecycle stage.
    pub fn stage(&self, deployment: &DeploymentId, stage: Stage, outcome: &str) {
        match self.mode {
            OutputMode::Normal => println!("  → {stage:<22} {outcome}"),
            OutputMode::Quiet => {}
            OutputMode::Json => emit(&StageEvent {
                event: "stage",
                deployment_id: deployment.as_str(),
                stage: stage.as_str(),
                outcome,
            }),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a structured value: pretty JSON in normal mode, one line otherwise.
    pub fn value<T: Serialize>(&self, value: &T) -> serde_json::Result<()> {
        let json = match self.mode {
            OutputMode::Normal => serde_json::to_string_pretty(value)?,
            OutputMode::Quiet | OutputMode::Json => serde_json::to_string(value)?,
        };
        println!("{json}");
        Ok(())
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StageEvent<'a> {
    event: &'a str,
    deployment_id: &'a str,
    stage: &'a str,
    outcome: &'a str,
}

#[derive(Serialize)]
struct StepEvent<'a> {
    event: &'a str,
    deployment_id: &'a str,
    percent: u8,
    status: String,
}

/// Prints cutover progress and collects warnings about alarms without data.
pub struct ProgressReporter<'a> {
    output: &'a Output,
    diag: &'a mut Diagnostics,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(output: &'a Output, diag: &'a mut Diagnostics) -> Self {
        Self { output, diag }
    }
}

impl CutoverReporter for ProgressReporter<'_> {
    fn stage(&mut self, deployment: &DeploymentId, stage: Stage, outcome: &str) {
        self.output.stage(deployment, stage, outcome);
    }

    fn step(&mut self, deployment: &DeploymentId, step: &StepReport) {
        match self.output.mode {
            OutputMode::Normal => println!("    {:>3}% {}", step.percent, step.status),
            OutputMode::Quiet => {}
            OutputMode::Json => emit(&StepEvent {
                event: "step",
                deployment_id: deployment.as_str(),
                percent: step.percent,
                status: step.status.to_string(),
            }),
        }
        if !step.unknown.is_empty() {
            let names: Vec<&str> = step.unknown.iter().map(|a| a.as_str()).collect();
            self.diag.warn(Warning::alarm_unknown(format!(
                "no alarm data at {}%: {}",
                step.percent,
                names.join(", ")
            )));
        }
    }
}
