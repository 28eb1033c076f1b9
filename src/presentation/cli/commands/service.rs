use anyhow::Result;
use colored::Colorize;

use crate::common::context::AppContext;
use crate::infrastructure::process::system_commands::ServiceAction;

/// Manage a system service
pub struct ServiceCommand {
    pub name: String,
    pub action: String,
    /// `None` detects the init system
    pub systemd: Option<bool>,
}

impl ServiceCommand {
    pub fn new(name: String, action: String, systemd: Option<bool>) -> Self {
        Self {
            name,
            action,
            systemd,
        }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let action: ServiceAction = self.action.parse()?;
        context
            .system_commands()
            .manage_service(&self.name, action, self.systemd)
            .await?;
        println!("{} {} {}", "✓".green(), action, self.name.bold());
        Ok(())
    }
}
