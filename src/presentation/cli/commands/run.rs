use anyhow::Result;
use colored::Colorize;

use crate::common::context::AppContext;
use crate::infrastructure::process::process_runner::CommandRunner;

/// Run one command through the process runner
pub struct RunCommand {
    pub command: Vec<String>,
    pub timeout: Option<f64>,
    pub quiet: bool,
    pub no_capture: bool,
}

impl RunCommand {
    pub fn new(command: Vec<String>, timeout: Option<f64>, quiet: bool, no_capture: bool) -> Self {
        Self {
            command,
            timeout,
            quiet,
            no_capture,
        }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let mut spec = context
            .command(&self.command)
            .with_echo(!self.quiet)
            .with_capture_output(!self.no_capture);
        if let Some(seconds) = self.timeout {
            spec = spec.with_timeout_secs(seconds)?;
        }

        let result = context.runner().run(&spec).await?;

        if self.quiet && !result.output.is_empty() {
            println!("{}", result.output);
        }

        if result.timed_out {
            return Err(anyhow::anyhow!(
                "Command timed out after {:?}: {}",
                spec.timeout(),
                spec.command_line()
            ));
        }
        if result.exit_code != 0 {
            return Err(anyhow::anyhow!(
                "Command exited with code {}: {}",
                result.exit_code,
                spec.command_line()
            ));
        }

        if !self.quiet {
            println!("{} exit code {}", "✓".green(), result.exit_code);
        }
        Ok(())
    }
}
