use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::application::services::deployment_service::IpAddressSource;
use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, ResultExt};
use crate::domain::value_objects::command::{CommandResult, CommandSpec};
use crate::infrastructure::filesystem::network_config::{
    write_alias_ifcfg, HostnameFiles, DEFAULT_NETWORK_SCRIPTS_DIR,
};
use crate::infrastructure::process::process_runner::{ensure_success, CommandRunner};

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SERVICE_PAUSE: Duration = Duration::from_secs(3);
pub const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

/// Service management verbs accepted by both systemd and sysv.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Reload,
    Restart,
    Status,
    Enable,
    Disable,
}

impl ServiceAction {
    pub const ALL: [ServiceAction; 7] = [
        Self::Start,
        Self::Stop,
        Self::Reload,
        Self::Restart,
        Self::Status,
        Self::Enable,
        Self::Disable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reload => "reload",
            Self::Restart => "restart",
            Self::Status => "status",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = Cons3rtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|a| a.as_str()).collect();
                Cons3rtError::validation_error(
                    "service_action",
                    format!("valid actions are: {}", valid.join(",")),
                    Some(s.to_string()),
                )
            })
    }
}

/// Host-level shell commands used by deployment assets.
pub struct SystemCommands {
    runner: Arc<dyn CommandRunner>,
    remote_timeout: Duration,
    service_timeout: Duration,
    service_pause: Duration,
    echo: bool,
    hostname_files: HostnameFiles,
    network_scripts_dir: PathBuf,
}

impl SystemCommands {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            service_pause: DEFAULT_SERVICE_PAUSE,
            echo: true,
            hostname_files: HostnameFiles::default(),
            network_scripts_dir: PathBuf::from(DEFAULT_NETWORK_SCRIPTS_DIR),
        }
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }

    pub fn with_service_pause(mut self, pause: Duration) -> Self {
        self.service_pause = pause;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_hostname_files(mut self, files: HostnameFiles) -> Self {
        self.hostname_files = files;
        self
    }

    pub fn with_network_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.network_scripts_dir = dir.into();
        self
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    fn spec<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        CommandSpec::new(args).with_echo(self.echo)
    }

    /// IPv4 address per `eth*`/`eno*` device, read from `ifconfig`.
    pub async fn ip_addresses(&self) -> Cons3rtResult<BTreeMap<String, String>> {
        let result = self.runner.run(&self.spec(["/sbin/ifconfig"])).await?;
        let devices = parse_ifconfig(&result.output);
        for (device, ip) in &devices {
            info!("Found IP address {} on device {}", ip, device);
        }
        Ok(devices)
    }

    /// MAC address of `eth<device_index>`, if the device exists.
    pub async fn mac_address(&self, device_index: u32) -> Option<String> {
        let device = format!("eth{device_index}");
        info!("Attempting to find a mac address at device index: {}", device_index);
        let spec = self.spec(["ip", "addr", "show", device.as_str()]);
        let result = match self.runner.run(&spec).await {
            Ok(result) => result,
            Err(e) => {
                error!("Unable to determine mac address of {}: {}", device, e);
                return None;
            }
        };
        let mac = parse_mac_address(&result.output);
        match &mac {
            Some(mac) => info!("Found mac address: {}", mac),
            None => info!("Mac address not found for device {}", device),
        }
        mac
    }

    /// First IPv4 address of `eth<interface>` from `ip addr show`.
    pub async fn ip_address(&self, interface: u32) -> Option<String> {
        let device = format!("eth{interface}");
        let spec = self.spec(["ip", "addr", "show", device.as_str()]);
        match self.runner.run(&spec).await {
            Ok(result) if result.is_success() => {
                let ip = parse_inet_address(&result.output);
                info!("IP address of {}: {:?}", device, ip);
                ip
            }
            Ok(result) => {
                error!("Unable to read {} (exit code {})", device, result.exit_code);
                None
            }
            Err(e) => {
                error!("Unable to determine IP address of {}: {}", device, e);
                None
            }
        }
    }

    /// Adds `ip` as alias `eth<interface>:0`.
    ///
    /// Brings the alias up with `ifconfig`, writes its network script from the
    /// device's own, restarts networking and checks that `ifconfig` lists it.
    pub async fn alias_ip_address(&self, ip: &str, interface: u32) -> Cons3rtResult<()> {
        let ip: Ipv4Addr = ip.trim().parse().map_err(|_| {
            Cons3rtError::validation_error("ip_address", "not a valid IPv4 address", Some(ip.to_string()))
        })?;
        let alias = format!("eth{interface}:0");
        let address = ip.to_string();

        self.runner
            .run_checked(&self.spec(["ifconfig", alias.as_str(), address.as_str(), "up"]))
            .await?;
        write_alias_ifcfg(&self.network_scripts_dir, interface, ip).await?;
        info!("Restarting networking to apply alias {}", alias);
        self.manage_service("network", ServiceAction::Restart, None).await?;

        let result = self.runner.run_checked(&self.spec(["/sbin/ifconfig"])).await?;
        if !result.output.contains(&alias) {
            return Err(Cons3rtError::command_failure_with_output(
                format!("The alias was not created: {alias}"),
                "/sbin/ifconfig",
                result.exit_code,
                result.output,
            ));
        }
        info!("Alias {} created with IP {}", alias, ip);
        Ok(())
    }

    /// Sets the hostname.
    ///
    /// The sysv network file is updated when present. With systemd the
    /// hostname and pretty hostname files are rewritten and `0` is returned;
    /// otherwise `/bin/hostname` runs and its exit code is returned.
    ///
    /// # Arguments
    ///
    /// * `hostname` - New hostname, without whitespace
    /// * `pretty_hostname` - Defaults to `hostname`
    /// * `systemd` - Detected from [`SYSTEMD_RUNTIME_DIR`] when `None`
    pub async fn set_hostname(
        &self,
        hostname: &str,
        pretty_hostname: Option<&str>,
        systemd: Option<bool>,
    ) -> Cons3rtResult<i32> {
        let hostname = hostname.trim();
        require_non_empty("hostname", hostname)?;
        if hostname.contains(char::is_whitespace) {
            return Err(Cons3rtError::validation_error(
                "hostname",
                "must not contain whitespace",
                Some(hostname.to_string()),
            ));
        }

        self.hostname_files.update_network_file(hostname).await?;

        if systemd.unwrap_or_else(is_systemd) {
            let pretty = pretty_hostname.map(str::trim).filter(|p| !p.is_empty()).unwrap_or(hostname);
            self.hostname_files.write_systemd_files(hostname, pretty).await?;
            info!("Set hostname {} (pretty: {})", hostname, pretty);
            return Ok(0);
        }

        let result = self.runner.run(&self.spec(["/bin/hostname", hostname])).await?;
        info!("hostname exited with code: {}", result.exit_code);
        Ok(result.exit_code)
    }

    /// Applies yum updates, or only downloads them when `download_dir` is
    /// given. Returns yum's exit code.
    pub async fn yum_update(&self, download_dir: Option<&Path>) -> Cons3rtResult<i32> {
        let mut args: Vec<String> = vec!["yum".into(), "-y".into(), "update".into()];
        if let Some(dir) = download_dir {
            info!("Creating download directory: {}", dir.display());
            tokio::fs::create_dir_all(dir)
                .await
                .with_filesystem_error("Unable to create download directory", Some(dir.to_path_buf()))?;
            args.push("--downloadonly".into());
            args.push(format!("--downloaddir={}", dir.display()));
            info!("Downloading updates from yum to {}...", dir.display());
        } else {
            info!("Installing yum updates...");
        }

        let result = self.runner.run(&self.spec(args)).await?;
        info!("yum update exited with code: {}", result.exit_code);
        Ok(result.exit_code)
    }

    /// Installs every `*.rpm` in `dir` with `rpm -iv --force`. Returns rpm's
    /// exit code.
    pub async fn rpm_install(&self, dir: &Path) -> Cons3rtResult<i32> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_filesystem_error("Unable to read RPM directory", Some(dir.to_path_buf()))?;
        let mut packages: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_filesystem_error("Unable to read RPM directory", Some(dir.to_path_buf()))?
        {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "rpm") {
                packages.push(path);
            }
        }
        if packages.is_empty() {
            return Err(Cons3rtError::not_found("RPM files", dir.display().to_string()));
        }
        packages.sort();

        let mut args: Vec<String> = vec!["rpm".into(), "-iv".into(), "--force".into()];
        args.extend(packages.iter().map(|p| p.display().to_string()));
        info!("Installing {} RPMs from {}", packages.len(), dir.display());
        let result = self.runner.run(&self.spec(args)).await?;
        info!("rpm exited with code: {}", result.exit_code);
        Ok(result.exit_code)
    }

    /// Installs packages with yum, or only downloads them when
    /// `download_dir` is given. Returns yum's exit code.
    pub async fn yum_install(
        &self,
        packages: &[String],
        download_dir: Option<&Path>,
    ) -> Cons3rtResult<i32> {
        if packages.is_empty() || packages.iter().any(|p| p.trim().is_empty()) {
            return Err(Cons3rtError::validation_error(
                "packages",
                "at least one non-empty package name is required",
                None,
            ));
        }

        let mut args: Vec<String> = vec!["yum".into(), "-y".into(), "install".into()];
        args.extend(packages.iter().cloned());

        if let Some(dir) = download_dir {
            info!("Creating download directory: {}", dir.display());
            tokio::fs::create_dir_all(dir)
                .await
                .with_filesystem_error("Unable to create download directory", Some(dir.to_path_buf()))?;
            args.push("--downloadonly".into());
            args.push(format!("--downloaddir={}", dir.display()));
            info!("Downloading packages from yum to {}...", dir.display());
        } else {
            info!("Installing yum packages: {}", packages.join(" "));
        }

        let result = self.runner.run(&self.spec(args)).await?;
        info!("yum install exited with code: {}", result.exit_code);
        Ok(result.exit_code)
    }

    /// Runs a systemd or sysv service command.
    ///
    /// With `systemd` unset the init system is detected from the presence of
    /// [`SYSTEMD_RUNTIME_DIR`].
    pub async fn manage_service(
        &self,
        service_name: &str,
        action: ServiceAction,
        systemd: Option<bool>,
    ) -> Cons3rtResult<()> {
        let service_name = service_name.trim();
        require_non_empty("service_name", service_name)?;

        let systemd = systemd.unwrap_or_else(is_systemd);
        info!(
            "Attempting to [{}] service {} with {}",
            action,
            service_name,
            if systemd { "systemd" } else { "sysv" }
        );

        for args in service_commands(service_name, action, systemd) {
            let spec = self.spec(args).with_timeout(self.service_timeout);
            let result = self.runner.run(&spec).await?;
            ensure_success(&spec, result)?;
            debug!("Waiting {:?} after [{}]", self.service_pause, spec);
            tokio::time::sleep(self.service_pause).await;
        }
        Ok(())
    }

    /// Runs `command` on `host` over SSH; a non-zero exit is an error.
    pub async fn run_remote_command(&self, host: &str, command: &str) -> Cons3rtResult<CommandResult> {
        require_non_empty("host", host)?;
        require_non_empty("command", command)?;
        let spec = self.ssh(host, command);
        let result = self.runner.run(&spec).await?;
        let mut result = ensure_success(&spec, result)?;
        result.output = result.output.trim().to_string();
        Ok(result)
    }

    pub async fn remote_environment_variable(&self, host: &str, name: &str) -> Cons3rtResult<String> {
        require_non_empty("environment_variable", name)?;
        let result = self.run_remote_command(host, &format!("echo ${name}")).await?;
        info!("Found {}={} on host {}", name, result.output, host);
        Ok(result.output)
    }

    /// Appends `export NAME="value"` to `env_file` on the remote host.
    pub async fn set_remote_environment_variable(
        &self,
        host: &str,
        name: &str,
        value: &str,
        env_file: &str,
    ) -> Cons3rtResult<()> {
        require_non_empty("variable_name", name)?;
        require_non_empty("env_file", env_file)?;
        self.run_remote_command(host, &format!("touch {env_file}")).await?;
        self.run_remote_command(host, &format!("chmod +x {env_file}")).await?;
        self.run_remote_command(
            host,
            &format!("echo \"export {name}=\\\"{value}\\\"\" >> {env_file}"),
        )
        .await?;
        info!("Set {} in {} on host {}", name, env_file, host);
        Ok(())
    }

    pub async fn check_remote_marker_file(&self, host: &str, path: &str) -> Cons3rtResult<bool> {
        require_non_empty("host", host)?;
        require_non_empty("file_path", path)?;
        let spec = self.ssh(host, &format!("if [ -f {path} ] ; then exit 0 ; else exit 1 ; fi"));
        let result = self.runner.run(&spec).await?;
        match (result.exit_code, result.output.is_empty(), result.timed_out) {
            (0, _, false) => Ok(true),
            (1, true, false) => Ok(false),
            _ => Err(Cons3rtError::command_failure_with_output(
                format!("Unable to check marker file {path} on remote host {host}"),
                spec.command_line(),
                result.exit_code,
                result.output,
            )),
        }
    }

    pub async fn create_remote_marker_file(&self, host: &str, path: &str) -> Cons3rtResult<()> {
        require_non_empty("file_path", path)?;
        self.run_remote_command(host, &format!("touch {path}")).await?;
        info!("Created marker file {} on host {}", path, host);
        Ok(())
    }

    fn ssh(&self, host: &str, command: &str) -> CommandSpec {
        self.spec(["ssh", host, command])
            .with_timeout(self.remote_timeout)
    }
}

#[async_trait]
impl IpAddressSource for SystemCommands {
    async fn ip_addresses(&self) -> Cons3rtResult<BTreeMap<String, String>> {
        SystemCommands::ip_addresses(self).await
    }
}

pub fn is_systemd() -> bool {
    Path::new(SYSTEMD_RUNTIME_DIR).is_dir()
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Cons3rtResult<()> {
    if value.trim().is_empty() {
        return Err(Cons3rtError::validation_error(field, "must not be empty", None));
    }
    Ok(())
}

fn service_commands(name: &str, action: ServiceAction, systemd: bool) -> Vec<Vec<String>> {
    if systemd {
        let unit = if name.ends_with(".service") {
            name.to_string()
        } else {
            format!("{name}.service")
        };
        return vec![vec!["/usr/bin/systemctl".into(), action.to_string(), unit]];
    }
    match action {
        ServiceAction::Enable => vec![
            vec!["/sbin/chkconfig".into(), "--add".into(), name.into()],
            vec!["/sbin/chkconfig".into(), name.into(), "on".into()],
        ],
        ServiceAction::Disable => vec![vec!["/sbin/chkconfig".into(), name.into(), "off".into()]],
        other => vec![vec!["/sbin/service".into(), name.into(), other.to_string()]],
    }
}

/// Parses both the net-tools (`inet addr:10.0.0.5`) and the newer
/// (`inet 10.0.0.5`) ifconfig layouts.
pub fn parse_ifconfig(output: &str) -> BTreeMap<String, String> {
    let mut devices = BTreeMap::new();
    let mut device: Option<String> = None;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            device = line
                .split_whitespace()
                .next()
                .map(|name| name.trim_end_matches(':').to_string())
                .filter(|name| name.contains("eth") || name.contains("eno"));
        }
        let Some(name) = device.as_ref() else {
            continue;
        };
        if devices.contains_key(name) {
            continue;
        }
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            if token != "inet" {
                continue;
            }
            let candidate = tokens.next().unwrap_or_default();
            let candidate = candidate.strip_prefix("addr:").unwrap_or(candidate);
            if let Ok(ip) = candidate.parse::<Ipv4Addr>() {
                devices.insert(name.clone(), ip.to_string());
                break;
            }
        }
    }
    devices
}

/// Address part of the first `inet a.b.c.d/nn` token of `ip addr show`.
pub fn parse_inet_address(output: &str) -> Option<String> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token != "inet" {
            continue;
        }
        let address = tokens.next()?.split('/').next()?;
        if let Ok(ip) = address.parse::<Ipv4Addr>() {
            return Some(ip.to_string());
        }
    }
    None
}

/// The token following the first `link/...` token of `ip addr show`.
pub fn parse_mac_address(output: &str) -> Option<String> {
    let mut tokens = output.split_whitespace();
    tokens.find(|token| token.contains("link"))?;
    tokens.next().map(str::to_string)
}
