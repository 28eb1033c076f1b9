use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{debug, info};

use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, ResultExt};

pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

/// Whether an update replaced an existing line or appended a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostsUpdate {
    Replaced,
    Appended,
}

/// Sets the hosts entry for `ip`.
///
/// Every line whose first field is exactly `ip` is replaced with
/// `"<ip> <entry>"`. Without such a line the entry is appended.
pub async fn update_hosts_file(path: &Path, ip: &str, entry: &str) -> Cons3rtResult<HostsUpdate> {
    let ip = ip.trim();
    ip.parse::<Ipv4Addr>().map_err(|_| {
        Cons3rtError::validation_error("ip", "not a valid IPv4 address", Some(ip.to_string()))
    })?;
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(Cons3rtError::validation_error("entry", "must not be empty", None));
    }

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(Cons3rtError::filesystem_error(
            format!("Hosts file not found: {}", path.display()),
            Some(path.to_path_buf()),
        ));
    }

    info!("Updating hosts file {} with IP {} and entry: {}", path.display(), ip, entry);
    let content = tokio::fs::read_to_string(path)
        .await
        .with_filesystem_error("Unable to read hosts file", Some(path.to_path_buf()))?;

    let (updated, outcome) = apply_entry(&content, ip, entry);
    create_backup(path).await?;
    tokio::fs::write(path, updated)
        .await
        .with_filesystem_error("Unable to write hosts file", Some(path.to_path_buf()))?;
    Ok(outcome)
}

/// Copies `path` to `<name>.bak_<UTC timestamp>` next to it.
async fn create_backup(path: &Path) -> Cons3rtResult<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "hosts".to_string());
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let backup = path.with_file_name(format!("{name}.bak_{timestamp}"));
    tokio::fs::copy(path, &backup)
        .await
        .with_filesystem_error("Unable to back up hosts file", Some(backup.clone()))?;
    debug!("Backed up {} to {}", path.display(), backup.display());
    Ok(())
}

fn apply_entry(content: &str, ip: &str, entry: &str) -> (String, HostsUpdate) {
    let full_entry = format!("{ip} {entry}");
    let mut outcome = HostsUpdate::Appended;
    let mut lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.split_whitespace().next() == Some(ip) {
            debug!("Replacing hosts line: {}", line);
            lines.push(&full_entry);
            outcome = HostsUpdate::Replaced;
        } else {
            lines.push(line);
        }
    }
    if outcome == HostsUpdate::Appended {
        debug!("Appending hosts line: {}", full_entry);
        lines.push(&full_entry);
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    (updated, outcome)
}
