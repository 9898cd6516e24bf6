// ABOUTME: Init command implementation.
// ABOUTME: Writes a starter switchyard.yml into the working directory.

use std::env;

use switchyard::config::{self, CONFIG_FILENAME};
use switchyard::error::Result;
use switchyard::output::Output;

pub fn init(application: Option<&str>, force: bool, output: &Output) -> Result<()> {
    let cwd = env::current_dir()?;
    config::init_config(&cwd, application, force)?;
    output.success(&format!("Created {CONFIG_FILENAME}"));
    Ok(())
}
