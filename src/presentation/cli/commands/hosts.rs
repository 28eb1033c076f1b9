use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::infrastructure::filesystem::hosts_file::{update_hosts_file, HostsUpdate};

/// Add or replace a hosts file entry
pub struct HostsSetCommand {
    pub ip: String,
    pub entry: String,
    pub file: PathBuf,
}

impl HostsSetCommand {
    pub fn new(ip: String, entry: String, file: PathBuf) -> Self {
        Self { ip, entry, file }
    }

    pub async fn execute(&self) -> Result<()> {
        let update = update_hosts_file(&self.file, &self.ip, &self.entry).await?;
        let verb = match update {
            HostsUpdate::Replaced => "Replaced",
            HostsUpdate::Appended => "Added",
        };
        println!(
            "{} {} {} {} in {}",
            "✓".green(),
            verb,
            self.ip.cyan(),
            self.entry.trim(),
            self.file.display()
        );
        Ok(())
    }
}
