use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::common::context::AppContext;
use crate::infrastructure::filesystem::network_config::set_ntp_server;

/// Show network addresses
pub struct IpCommand {
    pub mac_device_index: Option<u32>,
}

impl IpCommand {
    pub fn new(mac_device_index: Option<u32>) -> Self {
        Self { mac_device_index }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let system = context.system_commands().with_echo(false);

        if let Some(index) = self.mac_device_index {
            return match system.mac_address(index).await {
                Some(mac) => {
                    println!("{}", mac);
                    Ok(())
                }
                None => Err(anyhow::anyhow!("No MAC address found for eth{}", index)),
            };
        }

        let addresses = system.ip_addresses().await?;
        if addresses.is_empty() {
            println!("{}", "No eth/eno devices with an IPv4 address".yellow());
        }
        for (device, ip) in addresses {
            println!("{:<10} {}", device.bold(), ip);
        }
        Ok(())
    }
}

/// Install packages with yum
pub struct YumInstallCommand {
    pub packages: Vec<String>,
    pub download_dir: Option<PathBuf>,
}

impl YumInstallCommand {
    pub fn new(packages: Vec<String>, download_dir: Option<PathBuf>) -> Self {
        Self {
            packages,
            download_dir,
        }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let exit_code = context
            .system_commands()
            .yum_install(&self.packages, self.download_dir.as_deref())
            .await?;
        if exit_code != 0 {
            return Err(anyhow::anyhow!("yum exited with code {}", exit_code));
        }
        println!("{} Installed {}", "✓".green(), self.packages.join(" "));
        Ok(())
    }
}

/// Set the hostname
pub struct HostnameCommand {
    pub name: String,
    pub pretty: Option<String>,
}

impl HostnameCommand {
    pub fn new(name: String, pretty: Option<String>) -> Self {
        Self { name, pretty }
    }

    pub async fn execute(&self, context: &AppContext) -> Result<()> {
        let exit_code = context
            .system_commands()
            .set_hostname(&self.name, self.pretty.as_deref(), None)
            .await?;
        if exit_code != 0 {
            return Err(anyhow::anyhow!("hostname exited with code {}", exit_code));
        }
        println!("{} Hostname set to {}", "✓".green(), self.name.bold());
        Ok(())
    }
}

/// Replace the NTP servers in ntp.conf
pub struct NtpCommand {
    pub server: String,
    pub conf: PathBuf,
}

impl NtpCommand {
    pub fn new(server: String, conf: PathBuf) -> Self {
        Self { server, conf }
    }

    pub async fn execute(&self) -> Result<()> {
        set_ntp_server(&self.conf, &self.server).await?;
        println!("{} NTP server set to {} in {}", "✓".green(), self.server.bold(), self.conf.display());
        Ok(())
    }
}
