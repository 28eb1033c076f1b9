use anyhow::Result;
use colored::Colorize;

use crate::common::context::AppContext;

/// Run a command on a remote host
pub struct RemoteRunCommand {
    pub host: String,
    pub command: String,
}

impl RemoteRunCommand {
    pub fn new(host: String, command: String) -> Self {
        Self { host, command }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let result = context
            .system_commands()
            .with_echo(false)
            .run_remote_command(&self.host, &self.command)
            .await?;
        if !result.output.is_empty() {
            println!("{}", result.output);
        }
        Ok(())
    }
}

/// Read or set an environment variable on a remote host
pub struct RemoteEnvCommand {
    pub host: String,
    pub name: String,
    pub value: Option<String>,
    pub env_file: Option<String>,
}

impl RemoteEnvCommand {
    pub fn new(host: String, name: String, value: Option<String>, env_file: Option<String>) -> Self {
        Self {
            host,
            name,
            value,
            env_file,
        }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let system = context.system_commands().with_echo(false);
        match (&self.value, &self.env_file) {
            (Some(value), Some(env_file)) => {
                system
                    .set_remote_environment_variable(&self.host, &self.name, value, env_file)
                    .await?;
                println!(
                    "{} Set {} on {} in {}",
                    "✓".green(),
                    self.name.bold(),
                    self.host.cyan(),
                    env_file
                );
            }
            (Some(_), None) => {
                return Err(anyhow::anyhow!("--env-file is required with --set"));
            }
            (None, _) => {
                let value = system
                    .remote_environment_variable(&self.host, &self.name)
                    .await?;
                println!("{}", value);
            }
        }
        Ok(())
    }
}

/// Check or create a marker file on a remote host
pub struct RemoteMarkerCommand {
    pub host: String,
    pub path: String,
    pub create: bool,
}

impl RemoteMarkerCommand {
    pub fn new(host: String, path: String, create: bool) -> Self {
        Self { host, path, create }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let system = context.system_commands().with_echo(false);
        if self.create {
            system.create_remote_marker_file(&self.host, &self.path).await?;
            println!("{} Created {} on {}", "✓".green(), self.path, self.host.cyan());
            return Ok(());
        }

        if system.check_remote_marker_file(&self.host, &self.path).await? {
            println!("{} {} exists on {}", "✓".green(), self.path, self.host.cyan());
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Marker file {} not found on {}",
                self.path,
                self.host
            ))
        }
    }
}
