use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, ResultExt};
use crate::infrastructure::filesystem::text_edit::replace_in_file;

pub const DEFAULT_NTP_CONF: &str = "/etc/ntp.conf";
pub const DEFAULT_NETWORK_SCRIPTS_DIR: &str = "/etc/sysconfig/network-scripts";
pub const ALIAS_NETMASK: &str = "255.255.255.0";

/// Files touched when the hostname changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameFiles {
    /// sysv network settings, updated only when present.
    pub network: PathBuf,
    pub hostname: PathBuf,
    pub machine_info: PathBuf,
}

impl Default for HostnameFiles {
    fn default() -> Self {
        Self {
            network: PathBuf::from("/etc/sysconfig/network"),
            hostname: PathBuf::from("/etc/hostname"),
            machine_info: PathBuf::from("/etc/machine-info"),
        }
    }
}

impl HostnameFiles {
    /// The same layout under `root`, for staging or tests.
    pub fn under(root: &Path) -> Self {
        let defaults = Self::default();
        let rebase = |path: &Path| root.join(path.strip_prefix("/").unwrap_or(path));
        Self {
            network: rebase(&defaults.network),
            hostname: rebase(&defaults.hostname),
            machine_info: rebase(&defaults.machine_info),
        }
    }

    /// Sets `HOSTNAME=` in the network file. Returns `false` when the file
    /// does not exist.
    pub async fn update_network_file(&self, hostname: &str) -> Cons3rtResult<bool> {
        if !tokio::fs::try_exists(&self.network).await.unwrap_or(false) {
            info!("Network file not found, will not be updated: {}", self.network.display());
            return Ok(false);
        }
        info!("Updating {} with the new hostname: {}", self.network.display(), hostname);
        replace_in_file(&self.network, "^HOSTNAME=.*", &format!("HOSTNAME={hostname}"), 0).await?;
        Ok(true)
    }

    /// Replaces the systemd hostname and pretty hostname files.
    pub async fn write_systemd_files(&self, hostname: &str, pretty_hostname: &str) -> Cons3rtResult<()> {
        info!(
            "Updating files {} and {}",
            self.hostname.display(),
            self.machine_info.display()
        );
        tokio::fs::write(&self.hostname, hostname)
            .await
            .with_filesystem_error("Unable to write hostname file", Some(self.hostname.clone()))?;
        tokio::fs::write(&self.machine_info, format!("PRETTY_HOSTNAME={pretty_hostname}"))
            .await
            .with_filesystem_error("Unable to write machine info file", Some(self.machine_info.clone()))?;
        Ok(())
    }
}

/// Replaces every `server` line of an ntp.conf with `server <server>`.
pub async fn set_ntp_server(ntp_conf: &Path, server: &str) -> Cons3rtResult<()> {
    let server = server.trim();
    if server.is_empty() || server.contains(char::is_whitespace) {
        return Err(Cons3rtError::validation_error(
            "ntp_server",
            "expected a single hostname or IP address",
            Some(server.to_string()),
        ));
    }

    info!("Clearing out existing server entries from {}", ntp_conf.display());
    replace_in_file(ntp_conf, "^server.*", "", 0).await?;

    let content = tokio::fs::read_to_string(ntp_conf)
        .await
        .with_filesystem_error("Unable to read file", Some(ntp_conf.to_path_buf()))?;
    let separator = if content.is_empty() || content.ends_with('\n') { "" } else { "\n" };
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(ntp_conf)
        .await
        .with_filesystem_error("Unable to open file", Some(ntp_conf.to_path_buf()))?;
    file.write_all(format!("{separator}server {server}\n").as_bytes())
        .await
        .with_filesystem_error("Unable to append to file", Some(ntp_conf.to_path_buf()))?;
    info!("Set NTP server {} in {}", server, ntp_conf.display());
    Ok(())
}

/// Writes `ifcfg-eth<interface>:0` from the device's existing config with the
/// alias address, netmask and device name substituted.
///
/// # Errors
///
/// Returns `FileSystemError` if `ifcfg-eth<interface>` is missing.
pub async fn write_alias_ifcfg(scripts_dir: &Path, interface: u32, ip: Ipv4Addr) -> Cons3rtResult<PathBuf> {
    let base = scripts_dir.join(format!("ifcfg-eth{interface}"));
    let alias = scripts_dir.join(format!("ifcfg-eth{interface}:0"));

    let content = tokio::fs::read_to_string(&base).await.map_err(|e| {
        Cons3rtError::filesystem_error_with_source(
            format!("Required interface config file not found: {}", base.display()),
            Some(base.clone()),
            e,
        )
    })?;

    let mut entries = parse_ifcfg(&content);
    let device = format!("eth{interface}:0");
    entries.insert("IPADDR".into(), ip.to_string());
    entries.insert("NETMASK".into(), ALIAS_NETMASK.into());
    entries.insert("DEVICE".into(), device.clone());
    entries.insert("NAME".into(), device);

    let rendered: String = entries
        .iter()
        .map(|(key, value)| format!("{key}=\"{value}\"\n"))
        .collect();
    info!("Creating alias interface file: {}", alias.display());
    tokio::fs::write(&alias, rendered)
        .await
        .with_filesystem_error("Unable to write alias interface file", Some(alias.clone()))?;
    Ok(alias)
}

/// `KEY=VALUE` pairs with double quotes stripped; lines with more than one
/// `=` are skipped.
pub fn parse_ifcfg(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('=');
            let (key, value) = (parts.next()?, parts.next()?);
            if parts.next().is_some() {
                return None;
            }
            Some((key.trim().to_string(), value.replace('"', "").trim().to_string()))
        })
        .collect()
}
