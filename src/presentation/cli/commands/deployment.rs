use anyhow::Result;
use colored::Colorize;

use crate::application::services::deployment_service::{DeploymentLoader, DeploymentSources};
use crate::common::context::AppContext;

/// Show deployment facts
pub struct DeploymentInfoCommand;

impl Default for DeploymentInfoCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentInfoCommand {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let system = context.system_commands().with_echo(false);
        let deployment = DeploymentLoader::new()
            .load(&DeploymentSources::from_env(), &system)
            .await?;

        for (name, value) in deployment.facts().resolve_all() {
            let value = if value.is_empty() {
                "-".dimmed().to_string()
            } else {
                value
            };
            println!("{:<22} {}", name.bold(), value);
        }
        Ok(())
    }
}
